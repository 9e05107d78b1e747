//! Boundaries to the operating system. The core only sees these traits;
//! `System*` types bind them to the current platform.

use crate::error::{KillError, ScanError};
use crate::model::PortRecord;
use crate::process::{kill, ports};
use crate::termination::Credential;

pub trait PortScanner: Send + Sync {
    fn scan_ports(&self) -> Result<Vec<PortRecord>, ScanError>;
}

pub trait ProcessTerminator: Send + Sync {
    fn kill_process(&self, pid: i32) -> Result<(), KillError>;
    fn kill_process_elevated(&self, pid: i32, credential: &Credential) -> Result<(), KillError>;

    /// Whether `kill_process_elevated` can succeed at all on this system.
    fn supports_elevation(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemScanner;

impl PortScanner for SystemScanner {
    fn scan_ports(&self) -> Result<Vec<PortRecord>, ScanError> {
        ports::scan_ports().map_err(ScanError::from)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTerminator;

impl ProcessTerminator for SystemTerminator {
    fn kill_process(&self, pid: i32) -> Result<(), KillError> {
        kill::terminate_pid(pid).into_result()
    }

    fn kill_process_elevated(&self, pid: i32, credential: &Credential) -> Result<(), KillError> {
        kill::terminate_pid_elevated(pid, credential)
    }

    fn supports_elevation(&self) -> bool {
        kill::ELEVATION_SUPPORTED
    }
}
