//! In-memory fakes for the adapter traits, shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::adapters::ProcessTerminator;
use crate::config::{Config, ConfigStore};
use crate::error::{KillError, PersistenceError};
use crate::model::Notification;
use crate::notify::NotificationSink;
use crate::termination::{Credential, Rescan};

/// Answers from scripted queues, `Ok(())` once a queue runs dry.
#[derive(Default)]
pub struct FakeTerminator {
    plain: Mutex<VecDeque<Result<(), KillError>>>,
    elevated: Mutex<VecDeque<Result<(), KillError>>>,
    plain_calls: Mutex<Vec<i32>>,
    elevated_calls: Mutex<Vec<(i32, String)>>,
    no_elevation: bool,
}

impl FakeTerminator {
    /// Behaves like a platform with no password elevation.
    pub fn without_elevation() -> Self {
        Self {
            no_elevation: true,
            ..Self::default()
        }
    }

    pub fn push_plain(&self, result: Result<(), KillError>) {
        self.plain.lock().unwrap().push_back(result);
    }

    pub fn push_elevated(&self, result: Result<(), KillError>) {
        self.elevated.lock().unwrap().push_back(result);
    }

    pub fn plain_calls(&self) -> Vec<i32> {
        self.plain_calls.lock().unwrap().clone()
    }

    pub fn elevated_calls(&self) -> Vec<(i32, String)> {
        self.elevated_calls.lock().unwrap().clone()
    }
}

impl ProcessTerminator for FakeTerminator {
    fn kill_process(&self, pid: i32) -> Result<(), KillError> {
        self.plain_calls.lock().unwrap().push(pid);
        self.plain.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn kill_process_elevated(&self, pid: i32, credential: &Credential) -> Result<(), KillError> {
        self.elevated_calls
            .lock()
            .unwrap()
            .push((pid, credential.expose().to_string()));
        self.elevated.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn supports_elevation(&self) -> bool {
        !self.no_elevation
    }
}

#[derive(Default)]
pub struct CountingRescan(AtomicUsize);

impl CountingRescan {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Rescan for CountingRescan {
    fn rescan(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<Notification>>);

impl RecordingSink {
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

/// Keeps saved configs in memory; `fail_saves` makes every save fail.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: std::sync::Arc<Mutex<Vec<Config>>>,
    pub fail_saves: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Config> {
        Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
    }

    fn save(&self, config: &Config) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError("disk full".into()));
        }
        self.saved.lock().unwrap().push(config.clone());
        Ok(())
    }
}
