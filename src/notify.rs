use crate::pomodoro::controller::{IntervalEnd, TimerEvent};
use crate::pomodoro::pomodoro::{PomodoroMode, millis_to_minutes};
use notify_rust::Notification;
use tracing::{error, warn};

const APP_SUMMARY: &str = "Tomato Bar - Pomodoro timer";

pub fn send_notification(summary: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    Notification::new()
        .summary(summary)
        .body(message)
        .timeout(0) // No auto-dismiss
        .show()?;
    Ok(())
}

/// Stands in for a modal error dialog: logged, then shown until dismissed.
pub fn show_error_box(title: &str, message: &str) {
    error!(%title, detail = %message, "error reported to user");
    if let Err(e) = send_notification(title, message) {
        error!(error = %e, "failed to show error notification");
    }
}

pub fn interval_message(end: &IntervalEnd) -> String {
    let minutes = millis_to_minutes(end.next_duration_ms);
    match end.next {
        PomodoroMode::Relaxing => format!(
            "Work session complete! Time for a {}-minute break.",
            minutes
        ),
        PomodoroMode::Working => format!(
            "Break is over! Starting {}-minute work session.",
            minutes
        ),
    }
}

/// Pops a desktop notification whenever an interval ends.
pub fn desktop_listener() -> impl FnMut(&TimerEvent) + Send {
    |event: &TimerEvent| {
        if let TimerEvent::Ended(end) = event {
            let message = interval_message(end);
            if let Err(e) = send_notification(APP_SUMMARY, &message) {
                warn!(error = %e, "failed to send notification");
            }
        }
    }
}
