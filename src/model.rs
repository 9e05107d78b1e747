use crate::config::Config;
use crate::error::KillError;
use crate::termination::{Credential, CredentialRequest};
use crate::ui::console::ConsoleAction;

/// One listening socket as reported by the most recent scan.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PortRecord {
    pub port: u16,
    pub pid: i32,
    pub process_name: String,
}

impl PortRecord {
    pub fn new(port: u16, pid: i32, process_name: impl Into<String>) -> Self {
        Self {
            port,
            pid,
            process_name: process_name.into(),
        }
    }
}

/// One row of the unified view: a port that is occupied, watched, or both.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortView {
    pub port: u16,
    pub occupant: Option<PortRecord>,
    pub is_watched: bool,
    pub is_favorite: bool,
}

impl PortView {
    /// A free port is "available", not missing data.
    pub fn is_available(&self) -> bool {
        self.occupant.is_none()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ViewFilter {
    pub search_term: String,
    pub favorites_only: bool,
}

impl ViewFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search_term: term.into(),
            favorites_only: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct KillTarget {
    pub pid: i32,
    pub process_name: String,
}

/// Raw result of a platform termination call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KillOutcome {
    Success,
    AlreadyExited,
    PermissionDenied,
    TimedOut,
    Failed(String),
}

impl KillOutcome {
    pub fn into_result(self) -> Result<(), KillError> {
        match self {
            KillOutcome::Success => Ok(()),
            KillOutcome::AlreadyExited => Err(KillError::NotFound),
            KillOutcome::PermissionDenied => {
                Err(KillError::PermissionDenied("operation not permitted".to_string()))
            }
            KillOutcome::TimedOut => Err(KillError::Other(
                "timed out waiting for the process to exit".to_string(),
            )),
            KillOutcome::Failed(reason) => Err(KillError::Other(reason)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// Outcome event handed to a [`crate::notify::NotificationSink`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub detail: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    pub fn success(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, subject, detail)
    }

    pub fn error(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, subject, detail)
    }

    pub fn info(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, subject, detail)
    }
}

/// Everything the console event loop reacts to, except poll results which
/// arrive on their own channel.
#[derive(Debug)]
pub enum AppEvent {
    Input(ConsoleAction),
    Notice(Notification),
    CredentialRequested(CredentialRequest),
    KillFinished { pid: i32 },
    ConfigReloaded(Config),
    ConfigReloadFailed(String),
    InputClosed,
}

#[derive(Debug)]
pub enum WorkerCommand {
    Kill(KillTarget),
}

#[derive(Debug)]
pub enum CredentialReply {
    Submit(Credential),
    Cancel,
}
