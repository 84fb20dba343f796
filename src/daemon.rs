//! Long-running harvest daemon.
//!
//! Runs the [`Scheduler`] until SIGINT/SIGTERM, guarded by a PID file so only
//! one instance harvests at a time.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::app::{AppContext, HarvestError, Result};
use crate::scheduler::{Scheduler, DEFAULT_SCHEDULE, SCHEDULE_TZ};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Whether to run a harvest immediately on start
    pub run_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { run_on_start: true }
    }
}

/// Daemon runner
pub struct Daemon {
    scheduler: Scheduler,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: &AppContext, config: DaemonConfig) -> Result<Self> {
        Ok(Self {
            scheduler: Scheduler::new(ctx.harvester.clone())?,
            config,
        })
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("jobharvest").join("daemon.pid"))
    }

    fn read_pid() -> Option<u32> {
        let pid_path = Self::pid_file_path()?;
        fs::read_to_string(pid_path).ok()?.trim().parse().ok()
    }

    /// PID of a live daemon, if any
    pub fn running_pid() -> Option<u32> {
        Self::read_pid().filter(|pid| Self::process_exists(*pid))
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        Self::running_pid().is_some()
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Run the daemon until a shutdown signal arrives
    pub async fn run(mut self) -> Result<()> {
        if Self::is_running() {
            return Err(HarvestError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file()
            .map_err(|e| HarvestError::Other(format!("Failed to write PID file: {}", e)))?;

        let schedule = DEFAULT_SCHEDULE
            .iter()
            .map(|e| format!("{:02}:{:02}", e.hour, e.minute))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            "jobharvest daemon started (schedule: {} {}, PID: {})",
            schedule,
            SCHEDULE_TZ,
            std::process::id()
        );

        if self.config.run_on_start {
            tracing::info!("Running initial harvest...");
            self.scheduler.trigger();
        }

        self.scheduler.start();
        let result = wait_for_shutdown().await;

        tracing::info!("Daemon shutting down...");
        self.scheduler.stop().await;
        self.remove_pid_file();

        result
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}

#[cfg(windows)]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> Result<()> {
    let pid_path = Daemon::pid_file_path()
        .ok_or_else(|| HarvestError::Other("Could not determine PID file path".to_string()))?;

    if !pid_path.exists() {
        return Err(HarvestError::Other(
            "No daemon is running (PID file not found)".to_string(),
        ));
    }

    let pid = Daemon::read_pid()
        .ok_or_else(|| HarvestError::Other("Invalid PID in PID file".to_string()))?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;

    if status.success() {
        let _ = fs::remove_file(&pid_path);
        Ok(())
    } else {
        Err(HarvestError::Other(format!(
            "Failed to stop daemon (PID {})",
            pid
        )))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match Daemon::read_pid() {
        Some(pid) if Daemon::process_exists(pid) => {
            format!("Daemon is running (PID: {})", pid)
        }
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}
