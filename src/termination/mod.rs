//! Per-request kill state machine.
//!
//! ```text
//! Idle -> Attempting(Unprivileged) -> Succeeded
//!                                  -> AwaitingCredential -> Attempting(Elevated) -> Succeeded
//!                                                                                -> AwaitingCredential (bad password)
//!                                                                                -> Failed
//!                                  -> Failed
//! ```
//!
//! A [`KillAttempt`] is driven synchronously by whoever owns it (the kill
//! worker in the app); the credential prompt is surfaced through
//! [`KillState::AwaitingCredential`] and answered with
//! [`KillAttempt::submit_credential`] or [`KillAttempt::cancel`].

mod classify;

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::adapters::ProcessTerminator;
use crate::error::KillError;
use crate::model::{KillTarget, Notification};
use crate::notify::NotificationSink;

pub use classify::{ErrorClass, classify_kill_message};

const ELEVATION_UNAVAILABLE: &str =
    "password elevation is not available on this platform; run as Administrator";

/// Requests an out-of-band scan after a successful kill.
pub trait Rescan: Send + Sync {
    fn rescan(&self);
}

/// A password used for exactly one elevated attempt.
///
/// Never printed: `Debug` is redacted and there is no `Display`. The buffer
/// is wiped when the credential is dropped.
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// What the caller needs to render a password prompt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialRequest {
    pub pid: i32,
    pub process_name: String,
    /// Set when a previous submission was rejected.
    pub error: Option<String>,
    /// False when no password can help; the only way out is cancelling.
    pub elevation_available: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Privilege {
    Unprivileged,
    Elevated,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KillFailure {
    #[error("cancelled by user")]
    UserCancelled,
    #[error(transparent)]
    Adapter(#[from] KillError),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KillState {
    Idle,
    Attempting(Privilege),
    AwaitingCredential(CredentialRequest),
    Succeeded(Privilege),
    Failed(KillFailure),
}

impl KillState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, KillState::Succeeded(_) | KillState::Failed(_))
    }
}

#[derive(Clone)]
pub struct TerminationController {
    terminator: Arc<dyn ProcessTerminator>,
    rescan: Arc<dyn Rescan>,
    sink: Arc<dyn NotificationSink>,
}

impl TerminationController {
    pub fn new(
        terminator: Arc<dyn ProcessTerminator>,
        rescan: Arc<dyn Rescan>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            terminator,
            rescan,
            sink,
        }
    }

    pub fn begin(&self, target: KillTarget) -> KillAttempt {
        KillAttempt {
            controller: self.clone(),
            target,
            state: KillState::Idle,
        }
    }
}

pub struct KillAttempt {
    controller: TerminationController,
    target: KillTarget,
    state: KillState,
}

impl KillAttempt {
    pub fn target(&self) -> &KillTarget {
        &self.target
    }

    pub fn state(&self) -> &KillState {
        &self.state
    }

    /// Sends the unprivileged signal. Only valid from `Idle`.
    pub fn run(&mut self) -> &KillState {
        if self.state != KillState::Idle {
            warn!("kill attempt for PID {} already started", self.target.pid);
            return &self.state;
        }

        self.state = KillState::Attempting(Privilege::Unprivileged);
        debug!("terminating {}", self.label());
        let result = self
            .controller
            .terminator
            .kill_process(self.target.pid)
            .map_err(KillError::classified);

        self.state = match result {
            Ok(()) => self.succeed(Privilege::Unprivileged, false),
            Err(KillError::NotFound) => self.succeed(Privilege::Unprivileged, true),
            Err(KillError::PermissionDenied(reason)) => {
                info!(
                    "permission denied terminating {} ({}); asking for credentials",
                    self.label(),
                    reason
                );
                KillState::AwaitingCredential(self.request(None))
            }
            Err(err) => self.fail(err.into()),
        };
        &self.state
    }

    /// Retries with elevation. The credential is dropped as soon as the
    /// adapter returns, whatever the outcome.
    pub fn submit_credential(&mut self, credential: Credential) -> &KillState {
        if !matches!(self.state, KillState::AwaitingCredential(_)) {
            warn!(
                "credential submitted for PID {} while no prompt is open; ignoring",
                self.target.pid
            );
            return &self.state;
        }
        if !self.controller.terminator.supports_elevation() {
            drop(credential);
            self.state = self.fail(KillError::Other(ELEVATION_UNAVAILABLE.to_string()).into());
            return &self.state;
        }
        if credential.is_empty() {
            self.state = KillState::AwaitingCredential(self.request(Some(
                "Password is required".to_string(),
            )));
            return &self.state;
        }

        self.state = KillState::Attempting(Privilege::Elevated);
        debug!("terminating {} with elevated privileges", self.label());
        let result = self
            .controller
            .terminator
            .kill_process_elevated(self.target.pid, &credential)
            .map_err(KillError::classified);
        drop(credential);

        self.state = match result {
            Ok(()) => self.succeed(Privilege::Elevated, false),
            Err(KillError::NotFound) => self.succeed(Privilege::Elevated, true),
            Err(KillError::BadCredential) => {
                info!("incorrect password for {}", self.label());
                KillState::AwaitingCredential(
                    self.request(Some("Incorrect password, try again".to_string())),
                )
            }
            Err(err) => self.fail(err.into()),
        };
        &self.state
    }

    /// Abandons the prompt. Has no effect outside `AwaitingCredential`, since a
    /// delivered signal cannot be taken back.
    pub fn cancel(&mut self) -> &KillState {
        if matches!(self.state, KillState::AwaitingCredential(_)) {
            self.state = self.fail(KillFailure::UserCancelled);
        } else {
            debug!("cancel ignored for PID {} in state {:?}", self.target.pid, self.state);
        }
        &self.state
    }

    fn label(&self) -> String {
        format!("{} (PID {})", self.target.process_name, self.target.pid)
    }

    fn request(&self, error: Option<String>) -> CredentialRequest {
        CredentialRequest {
            pid: self.target.pid,
            process_name: self.target.process_name.clone(),
            error,
            elevation_available: self.controller.terminator.supports_elevation(),
        }
    }

    fn succeed(&self, privilege: Privilege, already_exited: bool) -> KillState {
        let label = self.label();
        let notification = match (privilege, already_exited) {
            (_, true) => Notification::success(
                "Process already stopped",
                format!("{} had already exited", label),
            ),
            (Privilege::Unprivileged, false) => {
                Notification::success("Process killed", format!("Terminated {}", label))
            }
            (Privilege::Elevated, false) => Notification::success(
                "Process killed (elevated)",
                format!("Terminated {} with administrator privileges", label),
            ),
        };
        info!("{}: {}", notification.subject, notification.detail);
        self.controller.sink.notify(notification);
        self.controller.rescan.rescan();
        KillState::Succeeded(privilege)
    }

    fn fail(&self, failure: KillFailure) -> KillState {
        let label = self.label();
        warn!("failed to terminate {}: {}", label, failure);
        self.controller
            .sink
            .notify(Notification::error("Kill failed", format!("{}: {}", label, failure)));
        KillState::Failed(failure)
    }
}
