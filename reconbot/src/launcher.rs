//! Starting SAP Logon and cleaning up after it.

use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;

use sysinfo::{ProcessesToUpdate, System};
use tracing::{error, info, instrument, warn};

use crate::errors::AutomationError;
use crate::selector::WindowPredicate;
use crate::window::{WindowSource, WindowWaiter};

pub const LAUNCHER_PROCESS: &str = "saplogon";

#[derive(Debug, Clone)]
pub struct Launcher {
    executable: PathBuf,
    window_title: String,
    timeout: Duration,
}

impl Launcher {
    pub fn new(executable: impl Into<PathBuf>, window_title: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            window_title: window_title.into(),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawns the launcher and waits for its main window. On failure the
    /// spawned process and any other launcher instance are killed.
    #[instrument(level = "info", skip(self, desktop), fields(exe = %self.executable.display()))]
    pub async fn launch<S>(&self, desktop: &S) -> Result<(), AutomationError>
    where
        S: WindowSource + ?Sized,
    {
        let mut child: Child = Command::new(&self.executable).spawn().map_err(|e| {
            AutomationError::PlatformError(format!(
                "cannot start {}: {e}",
                self.executable.display()
            ))
        })?;
        info!("started launcher process {}", child.id());

        let predicate = WindowPredicate::title(self.window_title.clone());
        match WindowWaiter::new()
            .wait_startup(desktop, &predicate, self.timeout)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("launcher window never appeared: {e}");
                stop_child(&mut child);
                kill_launcher_processes();
                Err(e)
            }
        }
    }
}

/// Kills a spawned process and reaps it. Returns whether it was reaped.
fn stop_child(child: &mut Child) -> bool {
    let pid = child.id();
    if let Err(e) = child.kill() {
        warn!("cannot kill launcher process {pid}: {e}");
    }
    match child.wait() {
        Ok(status) => {
            info!("launcher process {pid} exited: {status}");
            true
        }
        Err(e) => {
            warn!("cannot reap launcher process {pid}: {e}");
            false
        }
    }
}

/// Kills every running launcher process. Returns how many were killed.
pub fn kill_launcher_processes() -> usize {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut killed = 0;
    for (pid, process) in system.processes() {
        let name = process.name().to_string_lossy().to_lowercase();
        if !name.starts_with(LAUNCHER_PROCESS) {
            continue;
        }
        if process.kill() {
            killed += 1;
            info!("killed {name} (pid {})", pid.as_u32());
        } else {
            warn!("failed to kill {name} (pid {})", pid.as_u32());
        }
    }
    killed
}
