//! Brings up the out-of-process capture service.
//!
//! The service is spawned at most once per session. A failed spawn is not
//! retried; the session runs without capture capability until it is cleaned
//! up and initialised again.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use framewatch_conf::ServiceConfig;
use tracing::{debug, error, info, warn};

use crate::error::LaunchError;

/// Spawns a detached child process and returns its pid.
pub trait ProcessSpawner: Send {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<u32>;
}

/// `std::process::Command` with null stdio.
///
/// On Unix the child gets its own process group so terminal signals aimed at
/// the host do not reach it. A background thread reaps it when it exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandSpawner;

impl ProcessSpawner for CommandSpawner {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<u32> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn()?;
        let pid = child.id();

        let reaper = thread::Builder::new()
            .name("framewatch-reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) => debug!("capture service {} exited: {}", pid, status),
                Err(e) => warn!("failed to wait on capture service {}: {}", pid, e),
            });
        if let Err(e) = reaper {
            // The child keeps running; it is only left unreaped
            warn!("failed to start reaper thread for {}: {}", pid, e);
        }

        Ok(pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStatus {
    NotStarted,
    Launched { child_pid: u32 },
    Failed,
}

pub struct ServiceLauncher {
    spawner: Box<dyn ProcessSpawner>,
    config: ServiceConfig,
    monitored_pid: u32,
    status: LaunchStatus,
}

impl ServiceLauncher {
    pub fn new(spawner: Box<dyn ProcessSpawner>, config: ServiceConfig, monitored_pid: u32) -> Self {
        Self {
            spawner,
            config,
            monitored_pid,
            status: LaunchStatus::NotStarted,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn status(&self) -> LaunchStatus {
        self.status
    }

    /// `-pid <pid> -log_directory <dir>` followed by any configured extras.
    pub fn service_args(&self) -> Vec<String> {
        let mut args = vec![
            "-pid".to_string(),
            self.monitored_pid.to_string(),
            "-log_directory".to_string(),
            self.config.log_directory.display().to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Spawn the service if this session has not tried yet.
    ///
    /// Returns the outcome of the one and only attempt; later calls report
    /// the same status without spawning again.
    pub fn ensure_service_running(&mut self) -> Result<LaunchStatus, LaunchError> {
        if self.status != LaunchStatus::NotStarted {
            return Ok(self.status);
        }

        let args = self.service_args();
        info!(
            "launching capture service for pid {}: {} {}",
            self.monitored_pid,
            self.config.binary.display(),
            args.join(" ")
        );

        match self.spawner.spawn(&self.config.binary, &args) {
            Ok(child_pid) => {
                info!("capture service running as pid {}", child_pid);
                self.status = LaunchStatus::Launched { child_pid };
                Ok(self.status)
            }
            Err(source) => {
                error!(
                    "could not launch {}: {}; captures are disabled for this session",
                    self.config.binary.display(),
                    source
                );
                self.status = LaunchStatus::Failed;
                Err(LaunchError::Spawn {
                    binary: self.config.binary.clone(),
                    source,
                })
            }
        }
    }

    /// Forget the previous attempt so the next session launches again.
    pub fn reset(&mut self) {
        self.status = LaunchStatus::NotStarted;
    }
}
