//! macOS / Linux process termination using SIGTERM/SIGKILL, with a
//! `sudo -S` fallback for processes owned by other users.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::error::KillError;
use crate::model::KillOutcome;
use crate::termination::Credential;

const SIGTERM_GRACE: Duration = Duration::from_secs(2);
const SIGKILL_GRACE: Duration = Duration::from_secs(1);
const POLL_STEP: Duration = Duration::from_millis(200);

pub const ELEVATION_SUPPORTED: bool = true;

pub fn terminate_pid(pid_raw: i32) -> KillOutcome {
    let pid = Pid::from_raw(pid_raw);

    // Check if process exists
    match kill(pid, None) {
        Err(Errno::ESRCH) => return KillOutcome::AlreadyExited,
        Err(Errno::EPERM) => return KillOutcome::PermissionDenied,
        Err(err) => return KillOutcome::Failed(err.desc().to_string()),
        Ok(()) => {}
    }

    // Send SIGTERM to the specific PID only (not process group)
    match kill(pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return KillOutcome::AlreadyExited,
        Err(Errno::EPERM) => return KillOutcome::PermissionDenied,
        Err(err) => return KillOutcome::Failed(err.desc().to_string()),
    }

    // Wait for graceful shutdown
    match wait_for_exit(pid, SIGTERM_GRACE) {
        Ok(true) => return KillOutcome::Success,
        Ok(false) => {}
        Err(err) => return KillOutcome::Failed(err.desc().to_string()),
    }

    log::debug!("PID {} ignored SIGTERM, sending SIGKILL", pid_raw);
    match kill(pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return KillOutcome::Success,
        Err(Errno::EPERM) => return KillOutcome::PermissionDenied,
        Err(err) => return KillOutcome::Failed(err.desc().to_string()),
    }

    match wait_for_exit(pid, SIGKILL_GRACE) {
        Ok(true) => KillOutcome::Success,
        Ok(false) => KillOutcome::TimedOut,
        Err(err) => KillOutcome::Failed(err.desc().to_string()),
    }
}

fn wait_for_exit(pid: Pid, timeout: Duration) -> Result<bool, Errno> {
    let deadline = Instant::now() + timeout;
    loop {
        match kill(pid, None) {
            Err(Errno::ESRCH) => return Ok(true),
            Err(err) => return Err(err),
            Ok(()) => {}
        }

        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_STEP);
    }
}

/// Runs `sudo -S -k kill -9 <pid>`, feeding the password on stdin.
///
/// `-k` ignores any cached sudo timestamp so a wrong password is always
/// detected; `-p ""` keeps the prompt out of stderr. The password never
/// appears in argv or in the returned error.
pub fn terminate_pid_elevated(pid: i32, credential: &Credential) -> Result<(), KillError> {
    let mut child = Command::new("sudo")
        .args(["-S", "-k", "-p", "", "kill", "-9", &pid.to_string()])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| KillError::Other(format!("failed to run sudo: {}", err)))?;

    if let Some(mut stdin) = child.stdin.take() {
        // sudo may exit before reading; that shows up in its exit status
        let _ = stdin.write_all(credential.expose().as_bytes());
        let _ = stdin.write_all(b"\n");
    }

    let output = child
        .wait_with_output()
        .map_err(|err| KillError::Other(format!("failed to wait for sudo: {}", err)))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("sudo exited with {}", output.status)
    } else {
        stderr
    };
    Err(KillError::Other(message).classified())
}
