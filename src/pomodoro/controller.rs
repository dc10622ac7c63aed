use super::countdown::{Countdown, CountdownTick};
use super::pomodoro::{CycleState, PomodoroMode, format_label, progress};
use crate::config::Settings;
use std::time::Duration;

/// What the controller tells its display surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// Percentage of the active interval elapsed.
    Progress(f64),
    /// Tray label. Empty means blank.
    Title(String),
    Ended(IntervalEnd),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalEnd {
    pub finished: PomodoroMode,
    pub next: PomodoroMode,
    pub next_duration_ms: u64,
    pub completed: u64,
}

pub trait TimerListener: Send {
    fn on_event(&mut self, event: &TimerEvent);
}

impl<F> TimerListener for F
where
    F: FnMut(&TimerEvent) + Send,
{
    fn on_event(&mut self, event: &TimerEvent) {
        self(event)
    }
}

/// Owns the cycle state and the countdown, and pushes every change to the
/// subscribed listeners.
pub struct PomodoroController {
    state: CycleState,
    countdown: Countdown,
    settings: Settings,
    title: String,
    listeners: Vec<Box<dyn TimerListener>>,
}

impl PomodoroController {
    pub fn new(settings: Settings) -> Self {
        let state = CycleState::new(settings.durations);
        Self {
            countdown: Countdown::new(state.active_duration()),
            state,
            settings,
            title: String::new(),
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl TimerListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn remaining_ms(&self) -> u64 {
        self.countdown.remaining_ms()
    }

    pub fn is_running(&self) -> bool {
        self.countdown.is_running()
    }

    pub fn progress(&self) -> f64 {
        progress(self.countdown.remaining_ms(), self.state.active_duration())
    }

    /// Blank while stopped or when the user hid the timer.
    pub fn label(&self) -> String {
        if self.settings.show_timer && self.countdown.is_running() {
            format_label(self.countdown.remaining_ms())
        } else {
            String::new()
        }
    }

    /// Advances the running interval. Returns the transition when it finished;
    /// the next interval is then loaded stopped.
    pub fn tick(&mut self, elapsed: Duration) -> Option<IntervalEnd> {
        match self.countdown.advance(elapsed)? {
            CountdownTick::Remaining(_) => {
                self.push_display();
                None
            }
            CountdownTick::Done => {
                self.push_display();
                let finished = self.state.mode();
                let next_duration_ms = self.state.complete_interval();
                // The next interval waits for the user to start it.
                self.countdown.reset(next_duration_ms);
                let end = IntervalEnd {
                    finished,
                    next: self.state.mode(),
                    next_duration_ms,
                    completed: self.state.completed(),
                };
                self.emit(TimerEvent::Ended(end));
                self.push_display();
                Some(end)
            }
        }
    }

    pub fn reset(&mut self) {
        let work = self.state.reset();
        self.countdown.reset(work);
        self.push_display();
    }

    /// Starts or pauses the countdown, returning whether it now runs.
    pub fn toggle(&mut self) -> bool {
        let running = self.countdown.start_stop();
        self.push_display();
        running
    }

    pub fn stop(&mut self) {
        self.countdown.stop();
    }

    /// New durations wait for the next interval; display flags apply at once.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.state.set_durations(settings.durations);
        self.settings = settings;
        self.push_display();
    }

    fn push_display(&mut self) {
        let label = self.label();
        if label != self.title {
            self.title = label.clone();
            self.emit(TimerEvent::Title(label));
        }
        let progress = self.progress();
        self.emit(TimerEvent::Progress(progress));
    }

    fn emit(&mut self, event: TimerEvent) {
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }
}
