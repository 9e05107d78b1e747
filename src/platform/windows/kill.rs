//! Windows process termination using TerminateProcess API

use std::thread;
use std::time::Duration;

use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SYNCHRONIZE, PROCESS_TERMINATE,
    TerminateProcess, WaitForSingleObject,
};

use crate::error::KillError;
use crate::model::KillOutcome;
use crate::termination::Credential;

const FORCE_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_STEP: Duration = Duration::from_millis(200);

pub const ELEVATION_SUPPORTED: bool = false;

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_PARAMETER: u32 = 87;
const ERROR_NOT_FOUND: u32 = 1168;

pub fn terminate_pid(pid: i32) -> KillOutcome {
    unsafe {
        let handle = match OpenProcess(
            PROCESS_TERMINATE | PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_SYNCHRONIZE,
            false,
            pid as u32,
        ) {
            Ok(h) => h,
            Err(e) => return outcome_for_code(e.code().0 as u32, "OpenProcess"),
        };

        let outcome = match TerminateProcess(handle, 1) {
            Ok(()) if wait_for_exit(handle, FORCE_TIMEOUT) => KillOutcome::Success,
            Ok(()) => KillOutcome::TimedOut,
            // Process may have exited between open and terminate
            Err(e) => outcome_for_code(e.code().0 as u32, "TerminateProcess"),
        };
        let _ = CloseHandle(handle);
        outcome
    }
}

fn outcome_for_code(code: u32, call: &str) -> KillOutcome {
    // HRESULT_FROM_WIN32 puts the Win32 code in the low word
    match code & 0xFFFF {
        ERROR_INVALID_PARAMETER | ERROR_NOT_FOUND => KillOutcome::AlreadyExited,
        ERROR_ACCESS_DENIED => KillOutcome::PermissionDenied,
        other => {
            log::error!("{} failed with code {}", call, other);
            KillOutcome::Failed(format!("{} failed with code {}", call, other))
        }
    }
}

/// Wait for process to exit
unsafe fn wait_for_exit(handle: HANDLE, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        // SAFETY: handle is valid and obtained from OpenProcess
        if unsafe { WaitForSingleObject(handle, 0) } == WAIT_OBJECT_0 {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_STEP);
    }
}

/// Windows has no password-on-stdin elevation; the user has to start the app
/// from an Administrator session instead.
pub fn terminate_pid_elevated(_pid: i32, _credential: &Credential) -> Result<(), KillError> {
    Err(KillError::Other(
        "password elevation is not supported on Windows; run portassassin as Administrator"
            .to_string(),
    ))
}
