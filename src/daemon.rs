use crate::autostart::{self, LaunchOnStartup};
use crate::config::{self, ConfigFile, Settings};
use crate::error::AutostartError;
use crate::messages::{Inbound, Request, RequestReceiver};
use crate::notify;
use crate::pomodoro::controller::PomodoroController;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

/// Single owner of the controller. Ticks and requests are handled one at a
/// time on the task running [`Daemon::run`].
pub struct Daemon {
    controller: PomodoroController,
    config_path: PathBuf,
    launcher: Option<Box<dyn LaunchOnStartup + Send>>,
    report_error: ErrorReporter,
}

/// Shows a non-fatal error to the user.
pub type ErrorReporter = Box<dyn Fn(&str, &str) + Send>;

impl Daemon {
    /// Loads the config (defaults when unavailable) and, if it loaded, brings
    /// launch on startup in line with it.
    pub fn new(config_path: PathBuf, launcher: Option<Box<dyn LaunchOnStartup + Send>>) -> Self {
        Self::with_error_reporter(config_path, launcher, Box::new(notify::show_error_box))
    }

    pub fn with_error_reporter(
        config_path: PathBuf,
        launcher: Option<Box<dyn LaunchOnStartup + Send>>,
        report_error: ErrorReporter,
    ) -> Self {
        let loaded = config::load(&config_path);
        let settings = match &loaded {
            Ok(settings) => settings.clone(),
            Err(error) => {
                info!(%error, "Didn't find previous config. Using default settings");
                Settings::default()
            }
        };
        let daemon = Self {
            controller: PomodoroController::new(settings.clone()),
            config_path,
            launcher,
            report_error,
        };
        if loaded.is_ok() {
            daemon.sync_autostart(settings.launch_on_startup);
        }
        daemon
    }

    pub fn controller(&self) -> &PomodoroController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PomodoroController {
        &mut self.controller
    }

    fn sync_autostart(&self, enabled: bool) {
        let result = match &self.launcher {
            Some(launcher) => autostart::sync(launcher.as_ref(), enabled),
            None if enabled => Err(AutostartError::Unavailable),
            None => Ok(()),
        };
        if let Err(e) = result {
            (self.report_error)(
                "Error on adding launch on startup functionality",
                &format!("Error: {}", e),
            );
        }
    }

    /// Re-reads the config file. A broken file keeps the current settings.
    pub fn reload_settings(&mut self) {
        match config::load(&self.config_path) {
            Ok(settings) => {
                debug!(?settings, "settings reloaded");
                self.sync_autostart(settings.launch_on_startup);
                self.controller.apply_settings(settings);
            }
            Err(error) => {
                info!(%error, "config unavailable, keeping current settings");
                let current = self.controller.settings().clone();
                self.controller.apply_settings(current);
            }
        }
    }

    pub fn handle(&mut self, inbound: Inbound) -> ControlFlow<()> {
        match inbound.request {
            Request::ResetTimer => self.controller.reset(),
            Request::ToggleTimer => {
                let running = self.controller.toggle();
                debug!(running, "timer toggled");
            }
            Request::SettingsUpdated => self.reload_settings(),
            Request::RequestConfig => {
                let config = ConfigFile::from(self.controller.settings());
                if let Some(reply) = inbound.reply {
                    // Requester may have hung up already.
                    let _ = reply.send(config);
                }
            }
            Request::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Runs until `quit`, Ctrl+C, or every request sender is gone.
    pub async fn run(mut self, mut requests: RequestReceiver, tick_every: Duration) {
        let mut ticker = interval(tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                now = ticker.tick() => {
                    let elapsed = now - last_tick;
                    last_tick = now;
                    self.controller.tick(elapsed);
                }
                inbound = requests.recv() => {
                    let Some(inbound) = inbound else {
                        info!("all request channels closed");
                        break;
                    };
                    if self.handle(inbound).is_break() {
                        info!("quit requested");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
            }
        }

        info!(
            completed = self.controller.state().completed(),
            mode = self.controller.state().mode().as_str(),
            remaining_ms = self.controller.remaining_ms(),
            was_running = self.controller.is_running(),
            "timer stopped"
        );
        self.controller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autostart::tests::MemoryLauncher;
    use crate::messages::create_request_channel;
    use crate::pomodoro::pomodoro::{MILLIS_PER_MINUTE, PomodoroMode};
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    const ONE_MINUTE_HIDDEN: &str = r#"{"workTimer":1,"relaxTimer":1,"longRelaxTimer":1,"showTimer":false,"launchOnStartup":false}"#;
    const LAUNCH_ON_STARTUP: &str = r#"{"workTimer":25,"relaxTimer":5,"longRelaxTimer":15,"showTimer":true,"launchOnStartup":true}"#;

    type Reported = Arc<Mutex<Vec<(String, String)>>>;

    fn recording_reporter() -> (ErrorReporter, Reported) {
        let reported: Reported = Arc::default();
        let sink = Arc::clone(&reported);
        let reporter: ErrorReporter = Box::new(move |title: &str, message: &str| {
            sink.lock().unwrap().push((title.to_string(), message.to_string()));
        });
        (reporter, reported)
    }

    fn send(daemon: &mut Daemon, request: Request) {
        assert!(daemon.handle(Inbound::new(request)).is_continue());
    }

    fn request_config(daemon: &mut Daemon) -> ConfigFile {
        let (tx, mut rx) = oneshot::channel();
        let flow = daemon.handle(Inbound {
            request: Request::RequestConfig,
            reply: Some(tx),
        });
        assert!(flow.is_continue());
        rx.try_recv().unwrap()
    }

    #[test]
    fn test_request_config_echoes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, ONE_MINUTE_HIDDEN).unwrap();

        let mut daemon = Daemon::new(path, None);
        assert_eq!(
            request_config(&mut daemon),
            ConfigFile {
                work_timer: 1.0,
                relax_timer: 1.0,
                long_relax_timer: 1.0,
                show_timer: false,
                launch_on_startup: false,
            }
        );

        send(&mut daemon, Request::ToggleTimer);
        for _ in 0..200 {
            daemon.controller_mut().tick(Duration::from_millis(450));
            assert_eq!(daemon.controller().label(), "");
        }
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut daemon = Daemon::new(dir.path().join("config.json"), None);
        let config = request_config(&mut daemon);
        assert_eq!(config.work_timer, 25.0);
        assert_eq!(config.relax_timer, 5.0);
        assert_eq!(config.long_relax_timer, 15.0);
        assert!(config.show_timer);
        assert!(!config.launch_on_startup);
    }

    #[test]
    fn test_settings_updated_applies_after_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut daemon = Daemon::new(path.clone(), None);
        send(&mut daemon, Request::ToggleTimer);
        daemon.controller_mut().tick(Duration::from_secs(60));

        std::fs::write(&path, ONE_MINUTE_HIDDEN).unwrap();
        send(&mut daemon, Request::SettingsUpdated);
        assert_eq!(daemon.controller().remaining_ms(), 24 * MILLIS_PER_MINUTE);
        assert_eq!(request_config(&mut daemon).work_timer, 1.0);

        send(&mut daemon, Request::ResetTimer);
        assert_eq!(daemon.controller().state().mode(), PomodoroMode::Working);
        assert_eq!(daemon.controller().remaining_ms(), MILLIS_PER_MINUTE);
    }

    #[test]
    fn test_broken_reload_keeps_current_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, ONE_MINUTE_HIDDEN).unwrap();
        let mut daemon = Daemon::new(path.clone(), None);

        std::fs::write(&path, "{\"workTimer\":").unwrap();
        send(&mut daemon, Request::SettingsUpdated);
        assert_eq!(request_config(&mut daemon).work_timer, 1.0);
    }

    #[test]
    fn test_launch_on_startup_is_synced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, LAUNCH_ON_STARTUP).unwrap();
        let launcher = MemoryLauncher::default();
        let enabled = Arc::clone(&launcher.enabled);

        let (reporter, reported) = recording_reporter();
        let mut daemon =
            Daemon::with_error_reporter(path.clone(), Some(Box::new(launcher)), reporter);
        assert!(enabled.load(Ordering::SeqCst));

        std::fs::write(&path, ONE_MINUTE_HIDDEN).unwrap();
        send(&mut daemon, Request::SettingsUpdated);
        assert!(!enabled.load(Ordering::SeqCst));
        assert!(reported.lock().unwrap().is_empty());
    }

    #[test]
    fn test_launch_on_startup_failure_is_reported_and_survived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, LAUNCH_ON_STARTUP).unwrap();
        let launcher = MemoryLauncher {
            failing: true,
            ..MemoryLauncher::default()
        };

        let (reporter, reported) = recording_reporter();
        let mut daemon =
            Daemon::with_error_reporter(path.clone(), Some(Box::new(launcher)), reporter);
        assert_eq!(
            *reported.lock().unwrap(),
            vec![(
                "Error on adding launch on startup functionality".to_string(),
                "Error: permission denied".to_string()
            )]
        );

        // Settings still applied and requests still served.
        assert!(request_config(&mut daemon).launch_on_startup);
        send(&mut daemon, Request::SettingsUpdated);
        assert_eq!(reported.lock().unwrap().len(), 2);
        send(&mut daemon, Request::ToggleTimer);
        daemon.controller_mut().tick(Duration::from_secs(1));
        assert_eq!(daemon.controller().label(), "24:59");
    }

    #[test]
    fn test_missing_launcher_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, ONE_MINUTE_HIDDEN).unwrap();

        let (reporter, reported) = recording_reporter();
        let mut daemon = Daemon::with_error_reporter(path.clone(), None, reporter);
        assert!(reported.lock().unwrap().is_empty());

        std::fs::write(&path, LAUNCH_ON_STARTUP).unwrap();
        send(&mut daemon, Request::SettingsUpdated);
        let reported = reported.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].1.contains("not available"));
        drop(reported);

        assert_eq!(request_config(&mut daemon).work_timer, 25.0);
    }

    #[test]
    fn test_quit_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let mut daemon = Daemon::new(dir.path().join("config.json"), None);
        assert!(daemon.handle(Inbound::new(Request::Quit)).is_break());
    }

    #[tokio::test]
    async fn test_run_stops_on_quit() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = Daemon::new(dir.path().join("config.json"), None);
        let (tx, rx) = create_request_channel();
        tx.send(Inbound::new(Request::ToggleTimer)).unwrap();
        tx.send(Inbound::new(Request::Quit)).unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            daemon.run(rx, Duration::from_millis(10)),
        )
        .await
        .expect("daemon should stop on quit");
    }
}
