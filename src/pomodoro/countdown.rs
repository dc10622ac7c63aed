use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Remaining(Duration),
    Done,
}

/// Counts an interval down towards zero while running.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: Duration,
    running: bool,
}

impl Countdown {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            remaining: Duration::from_millis(duration_ms),
            running: false,
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining.as_millis() as u64
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Flips between running and paused, returning the new running state.
    pub fn start_stop(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    /// Loads a fresh interval and stops.
    pub fn reset(&mut self, duration_ms: u64) {
        self.remaining = Duration::from_millis(duration_ms);
        self.running = false;
    }

    /// Returns `None` while stopped.
    pub fn advance(&mut self, elapsed: Duration) -> Option<CountdownTick> {
        if !self.running {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            Some(CountdownTick::Done)
        } else {
            Some(CountdownTick::Remaining(self.remaining))
        }
    }
}
