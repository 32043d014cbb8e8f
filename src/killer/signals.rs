// Signal management for process termination

use anyhow::Result;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::thread;
use std::time::Duration;

/// Strategy for killing processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillStrategy {
    /// Send SIGTERM first, escalating to SIGKILL if the process lingers
    Graceful,
    /// Send SIGKILL immediately
    Forceful,
}

/// Result of a kill operation
#[derive(Debug)]
pub enum KillResult {
    /// Process was successfully terminated
    Success,
    /// Process was already dead
    AlreadyDead,
    /// Permission denied (typically need root)
    PermissionDenied,
    /// Process not found
    NotFound,
    /// Other error occurred
    Error(String),
}

impl KillResult {
    /// Check if the kill operation was successful
    pub fn is_success(&self) -> bool {
        matches!(self, KillResult::Success | KillResult::AlreadyDead)
    }

    /// Get a human-readable description
    pub fn description(&self) -> &str {
        match self {
            KillResult::Success => "successfully terminated",
            KillResult::AlreadyDead => "already dead",
            KillResult::PermissionDenied => "permission denied",
            KillResult::NotFound => "not found",
            KillResult::Error(msg) => msg,
        }
    }
}

/// Send a signal to a process
fn send_signal(pid: i32, signal: Signal) -> KillResult {
    match signal::kill(Pid::from_raw(pid), signal) {
        Ok(()) => KillResult::Success,
        Err(nix::errno::Errno::ESRCH) => KillResult::NotFound,
        Err(nix::errno::Errno::EPERM) => KillResult::PermissionDenied,
        Err(e) => KillResult::Error(format!("signal error: {e}")),
    }
}

/// Check if a process is still alive
fn is_process_alive(pid: i32) -> bool {
    // Signal 0 checks existence without delivering anything
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Kill a single process using the specified strategy
pub fn kill_process(pid: i32, strategy: KillStrategy) -> Result<KillResult> {
    log::debug!("Attempting to kill process {pid} (strategy: {strategy:?})");

    if pid <= 0 {
        // kill(2) treats these as process groups
        anyhow::bail!("refusing to signal pid {pid}");
    }

    if !is_process_alive(pid) {
        log::debug!("Process {pid} is already dead");
        return Ok(KillResult::AlreadyDead);
    }

    Ok(match strategy {
        KillStrategy::Graceful => kill_graceful(pid),
        KillStrategy::Forceful => kill_forceful(pid),
    })
}

/// Kill a process gracefully using SIGTERM
fn kill_graceful(pid: i32) -> KillResult {
    log::info!("Sending SIGTERM to process {pid}");

    let result = send_signal(pid, Signal::SIGTERM);
    if !result.is_success() {
        log::warn!(
            "Failed to send SIGTERM to process {pid}: {}",
            result.description()
        );
        return result;
    }

    // Give the process a second to exit on its own
    for i in 0..10 {
        thread::sleep(Duration::from_millis(100));
        if !is_process_alive(pid) {
            log::info!("Process {pid} terminated gracefully after {}ms", i * 100);
            return KillResult::Success;
        }
    }

    log::warn!("Process {pid} did not respond to SIGTERM, escalating to SIGKILL");
    kill_forceful(pid)
}

/// Kill a process forcefully using SIGKILL
fn kill_forceful(pid: i32) -> KillResult {
    log::info!("Sending SIGKILL to process {pid}");

    let result = send_signal(pid, Signal::SIGKILL);
    if !result.is_success() {
        log::warn!(
            "Failed to send SIGKILL to process {pid}: {}",
            result.description()
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_kill_result_is_success() {
        assert!(KillResult::Success.is_success());
        assert!(KillResult::AlreadyDead.is_success());
        assert!(!KillResult::PermissionDenied.is_success());
        assert!(!KillResult::NotFound.is_success());
        assert!(!KillResult::Error("boom".to_string()).is_success());
    }

    #[test]
    fn test_kill_result_description() {
        assert_eq!(KillResult::Success.description(), "successfully terminated");
        assert_eq!(KillResult::AlreadyDead.description(), "already dead");
        assert_eq!(
            KillResult::PermissionDenied.description(),
            "permission denied"
        );
        assert_eq!(KillResult::NotFound.description(), "not found");
        assert_eq!(KillResult::Error("boom".to_string()).description(), "boom");
    }

    #[test]
    fn test_kill_nonexistent_process() {
        let result = kill_process(999_999_999, KillStrategy::Forceful).unwrap();
        assert!(matches!(
            result,
            KillResult::NotFound | KillResult::AlreadyDead
        ));
    }

    #[test]
    fn test_refuses_group_pids() {
        assert!(kill_process(0, KillStrategy::Forceful).is_err());
        assert!(kill_process(-1, KillStrategy::Forceful).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_kill_child_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;

        let result = kill_process(pid, KillStrategy::Forceful).unwrap();
        assert!(matches!(result, KillResult::Success));

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_graceful_kill_child_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;

        // sleep exits on SIGTERM; an unreaped child still counts as alive, so
        // this may escalate to SIGKILL, which also succeeds
        let result = kill_process(pid, KillStrategy::Graceful).unwrap();
        assert!(result.is_success());

        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
