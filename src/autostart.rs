//! Launch-on-startup registration.
//!
//! The platform work (XDG autostart entry, macOS LaunchAgent, Windows Run
//! key) is done by `auto-launch`; [`LaunchOnStartup`] is the seam the daemon
//! talks to.

use crate::error::AutostartError;
use auto_launch::{AutoLaunch, AutoLaunchBuilder};
use tracing::info;

const APP_NAME: &str = "tomato_bar";

pub trait LaunchOnStartup {
    fn enable(&self) -> Result<(), AutostartError>;
    fn disable(&self) -> Result<(), AutostartError>;
    fn is_enabled(&self) -> Result<bool, AutostartError>;
}

fn launcher_error(e: impl std::fmt::Display) -> AutostartError {
    AutostartError::Launcher(e.to_string())
}

/// Registration for the current executable on the running platform.
pub struct SystemLauncher {
    inner: AutoLaunch,
}

impl SystemLauncher {
    pub fn for_current_exe() -> Result<Self, AutostartError> {
        let exe = std::env::current_exe().map_err(AutostartError::CurrentExe)?;
        let exe_path = exe
            .to_str()
            .ok_or_else(|| AutostartError::NonUtf8Exe(exe.clone()))?;
        let inner = AutoLaunchBuilder::new()
            .set_app_name(APP_NAME)
            .set_app_path(exe_path)
            .set_use_launch_agent(true)
            .build()
            .map_err(launcher_error)?;
        Ok(Self { inner })
    }
}

impl LaunchOnStartup for SystemLauncher {
    fn enable(&self) -> Result<(), AutostartError> {
        self.inner.enable().map_err(launcher_error)
    }

    fn disable(&self) -> Result<(), AutostartError> {
        self.inner.disable().map_err(launcher_error)
    }

    fn is_enabled(&self) -> Result<bool, AutostartError> {
        self.inner.is_enabled().map_err(launcher_error)
    }
}

pub fn system_launcher() -> Result<Box<dyn LaunchOnStartup + Send>, AutostartError> {
    Ok(Box::new(SystemLauncher::for_current_exe()?))
}

/// Brings the registration in line with the `launchOnStartup` flag.
pub fn sync(launcher: &dyn LaunchOnStartup, enabled: bool) -> Result<(), AutostartError> {
    if enabled == launcher.is_enabled()? {
        return Ok(());
    }
    if enabled {
        launcher.enable()?;
    } else {
        launcher.disable()?;
    }
    info!(enabled, "updated launch on startup");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory registration; `failing` makes every change error out.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MemoryLauncher {
        pub enabled: Arc<AtomicBool>,
        pub changes: Arc<AtomicUsize>,
        pub failing: bool,
    }

    impl LaunchOnStartup for MemoryLauncher {
        fn enable(&self) -> Result<(), AutostartError> {
            if self.failing {
                return Err(AutostartError::Launcher("permission denied".into()));
            }
            self.changes.fetch_add(1, Ordering::SeqCst);
            self.enabled.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn disable(&self) -> Result<(), AutostartError> {
            if self.failing {
                return Err(AutostartError::Launcher("permission denied".into()));
            }
            self.changes.fetch_add(1, Ordering::SeqCst);
            self.enabled.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_enabled(&self) -> Result<bool, AutostartError> {
            Ok(self.enabled.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn test_sync_only_touches_registration_on_change() {
        let launcher = MemoryLauncher::default();
        sync(&launcher, false).unwrap();
        assert_eq!(launcher.changes.load(Ordering::SeqCst), 0);

        sync(&launcher, true).unwrap();
        sync(&launcher, true).unwrap();
        assert!(launcher.enabled.load(Ordering::SeqCst));
        assert_eq!(launcher.changes.load(Ordering::SeqCst), 1);

        sync(&launcher, false).unwrap();
        assert!(!launcher.enabled.load(Ordering::SeqCst));
        assert_eq!(launcher.changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sync_reports_failure() {
        let launcher = MemoryLauncher {
            failing: true,
            ..MemoryLauncher::default()
        };
        let err = sync(&launcher, true).unwrap_err();
        assert_eq!(err.to_string(), "permission denied");
        // Nothing to undo, so disabling is a no-op.
        sync(&launcher, false).unwrap();
    }
}
