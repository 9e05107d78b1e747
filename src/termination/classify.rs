//! Maps free-text kill errors onto [`KillError`] variants.
//!
//! Platform helpers such as `sudo` and `kill` only report failures as text.
//! Matching is case-insensitive on English messages; a localized system will
//! fall through to [`ErrorClass::Other`].

use crate::error::KillError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    PermissionDenied,
    NotFound,
    BadCredential,
    Other,
}

// Checked before permission markers: sudo prints both on a wrong password.
const BAD_CREDENTIAL_MARKERS: &[&str] = &[
    "incorrect password",
    "sorry, try again",
    "authentication failure",
    "a password is required",
    "no password was provided",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "operation not permitted",
    "access is denied",
    "not in the sudoers file",
    "eperm",
];

const NOT_FOUND_MARKERS: &[&str] = &["no such process", "esrch", "process not found"];

pub fn classify_kill_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if has(BAD_CREDENTIAL_MARKERS) {
        ErrorClass::BadCredential
    } else if has(PERMISSION_MARKERS) {
        ErrorClass::PermissionDenied
    } else if has(NOT_FOUND_MARKERS) {
        ErrorClass::NotFound
    } else {
        ErrorClass::Other
    }
}

impl KillError {
    /// Refines an unclassified error by its message. Already-typed variants
    /// are returned untouched.
    pub fn classified(self) -> KillError {
        match self {
            KillError::Other(message) => match classify_kill_message(&message) {
                ErrorClass::PermissionDenied => KillError::PermissionDenied(message),
                ErrorClass::NotFound => KillError::NotFound,
                ErrorClass::BadCredential => KillError::BadCredential,
                ErrorClass::Other => KillError::Other(message),
            },
            typed => typed,
        }
    }
}
