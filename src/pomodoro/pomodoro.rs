use crate::error::DurationError;

pub const MILLIS_PER_MINUTE: u64 = 60 * 1000;
pub const DEFAULT_WORK_MINUTES: u64 = 25; // Default Pomodoro work time
pub const DEFAULT_RELAX_MINUTES: u64 = 5; // Default short break
pub const DEFAULT_LONG_RELAX_MINUTES: u64 = 15; // Default long break
pub const LONG_RELAX_EVERY: u64 = 4; // Every 4th finished pomodoro earns the long break

/// Reported in place of a negative progress so the display never sits at a hard 0%.
pub const PROGRESS_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PomodoroMode {
    Working,
    Relaxing,
}

impl PomodoroMode {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            PomodoroMode::Working => "WORK",
            PomodoroMode::Relaxing => "RELAX",
        }
    }

    pub(crate) fn emoji(&self) -> &'static str {
        match self {
            PomodoroMode::Working => "💼",
            PomodoroMode::Relaxing => "☕",
        }
    }
}

/// The three interval lengths, in milliseconds. Always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durations {
    work: u64,
    short_relax: u64,
    long_relax: u64,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            work: DEFAULT_WORK_MINUTES * MILLIS_PER_MINUTE,
            short_relax: DEFAULT_RELAX_MINUTES * MILLIS_PER_MINUTE,
            long_relax: DEFAULT_LONG_RELAX_MINUTES * MILLIS_PER_MINUTE,
        }
    }
}

impl Durations {
    /// Builds durations from (possibly fractional) minute values, rejecting
    /// anything that does not round to at least one millisecond.
    pub fn from_minutes(work: f64, short_relax: f64, long_relax: f64) -> Result<Self, DurationError> {
        Ok(Self {
            work: minutes_to_millis("workTimer", work)?,
            short_relax: minutes_to_millis("relaxTimer", short_relax)?,
            long_relax: minutes_to_millis("longRelaxTimer", long_relax)?,
        })
    }

    pub fn work(&self) -> u64 {
        self.work
    }

    pub fn short_relax(&self) -> u64 {
        self.short_relax
    }

    pub fn long_relax(&self) -> u64 {
        self.long_relax
    }
}

fn minutes_to_millis(name: &'static str, minutes: f64) -> Result<u64, DurationError> {
    let millis = (minutes * MILLIS_PER_MINUTE as f64).round();
    if !millis.is_finite() || millis < 1.0 {
        return Err(DurationError::NotPositive { name, minutes });
    }
    Ok(millis as u64)
}

pub fn millis_to_minutes(millis: u64) -> f64 {
    millis as f64 / MILLIS_PER_MINUTE as f64
}

/// Where the work/relax rotation currently stands.
///
/// Durations handed to [`CycleState::set_durations`] are only picked up when the
/// next interval is chosen, so a running interval is never resized.
#[derive(Debug, Clone)]
pub struct CycleState {
    mode: PomodoroMode,
    completed: u64,
    durations: Durations,
    active_duration: u64,
}

impl CycleState {
    pub fn new(durations: Durations) -> Self {
        Self {
            mode: PomodoroMode::Working,
            completed: 0,
            durations,
            active_duration: durations.work(),
        }
    }

    pub fn mode(&self) -> PomodoroMode {
        self.mode
    }

    /// Number of finished work intervals since start.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn active_duration(&self) -> u64 {
        self.active_duration
    }

    pub fn set_durations(&mut self, durations: Durations) {
        self.durations = durations;
    }

    /// Moves to the next interval and returns its duration.
    pub fn complete_interval(&mut self) -> u64 {
        match self.mode {
            PomodoroMode::Working => {
                self.mode = PomodoroMode::Relaxing;
                self.completed += 1;
                self.active_duration = if self.completed % LONG_RELAX_EVERY == 0 {
                    self.durations.long_relax()
                } else {
                    self.durations.short_relax()
                };
            }
            PomodoroMode::Relaxing => {
                self.mode = PomodoroMode::Working;
                self.active_duration = self.durations.work();
            }
        }
        self.active_duration
    }

    /// Back to the start of a work interval. The completed count is kept.
    pub fn reset(&mut self) -> u64 {
        self.mode = PomodoroMode::Working;
        self.active_duration = self.durations.work();
        self.active_duration
    }
}

/// Percentage of the active interval already elapsed.
pub fn progress(remaining_ms: u64, active_duration_ms: u64) -> f64 {
    if active_duration_ms == 0 {
        return PROGRESS_EPSILON;
    }
    let max = active_duration_ms as f64;
    let percentage = (max - remaining_ms as f64) / max * 100.0;
    if percentage < 0.0 {
        PROGRESS_EPSILON
    } else {
        percentage
    }
}

/// `MM:SS` label for the tray.
pub fn format_label(remaining_ms: u64) -> String {
    let total_seconds = remaining_ms / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
