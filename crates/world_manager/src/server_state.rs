//! Whether the game server process is up
//!
//! World switching and deletion are only allowed while the server is stopped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[async_trait]
pub trait ServerStateProvider: Send + Sync + std::fmt::Debug {
    async fn is_running(&self) -> bool;
}

/// Reads the PID the start script left in `server.pid` and checks that the
/// process is alive and, when a name is configured, that it is the expected
/// executable (`java` for a Paper server).
///
/// A missing, empty or unparsable PID file means the server is stopped.
#[derive(Debug, Clone)]
pub struct PidFileServerState {
    pid_file: PathBuf,
    process_name: Option<String>,
}

impl PidFileServerState {
    pub fn new(pid_file: impl AsRef<Path>, process_name: Option<String>) -> Self {
        Self {
            pid_file: pid_file.as_ref().to_path_buf(),
            process_name: process_name.filter(|n| !n.is_empty()),
        }
    }

    async fn read_pid(&self) -> Option<i32> {
        let contents = tokio::fs::read_to_string(&self.pid_file).await.ok()?;
        match contents.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => Some(pid),
            _ => {
                warn!("Ignoring malformed PID file {}", self.pid_file.display());
                None
            }
        }
    }

    async fn name_matches(&self, pid: i32) -> bool {
        let Some(expected) = &self.process_name else {
            return true;
        };

        match tokio::fs::read_to_string(format!("/proc/{pid}/comm")).await {
            Ok(comm) => comm.trim() == expected,
            // No procfs on this platform; liveness is all we can check.
            Err(_) => true,
        }
    }
}

#[async_trait]
impl ServerStateProvider for PidFileServerState {
    async fn is_running(&self) -> bool {
        let Some(pid) = self.read_pid().await else {
            return false;
        };

        if !process_alive(pid) {
            debug!("PID {} from {} is not alive", pid, self.pid_file.display());
            return false;
        }

        self.name_matches(pid).await
    }
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // Signal 0 performs the permission and existence checks without sending.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

/// State set explicitly by the embedding application.
#[derive(Debug, Default)]
pub struct ManualServerState {
    running: AtomicBool,
}

impl ManualServerState {
    pub fn new(running: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

#[async_trait]
impl ServerStateProvider for ManualServerState {
    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
