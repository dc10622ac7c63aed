use crate::pomodoro::controller::{IntervalEnd, TimerEvent};
use crate::pomodoro::pomodoro::millis_to_minutes;
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Append-only, human readable record of finished intervals.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = Self { path };
        log.append(&format!(
            "=== Session started at {} ===",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", message)?;
        Ok(())
    }

    pub fn record(&self, end: &IntervalEnd, at: DateTime<Local>) -> std::io::Result<()> {
        self.append(&format_entry(end, at))
    }
}

fn format_entry(end: &IntervalEnd, at: DateTime<Local>) -> String {
    format!(
        "[{}] {} {} done (pomodoros: {}), {} {} for {} min",
        at.format("%Y-%m-%d %H:%M:%S"),
        end.finished.emoji(),
        end.finished.as_str(),
        end.completed,
        end.next.emoji(),
        end.next.as_str(),
        millis_to_minutes(end.next_duration_ms)
    )
}

impl crate::pomodoro::controller::TimerListener for SessionLog {
    fn on_event(&mut self, event: &TimerEvent) {
        if let TimerEvent::Ended(end) = event {
            info!(
                finished = end.finished.as_str(),
                next = end.next.as_str(),
                completed = end.completed,
                "interval finished"
            );
            if let Err(e) = self.record(end, Local::now()) {
                warn!(path = %self.path.display(), error = %e, "failed to write session log");
            }
        }
    }
}
