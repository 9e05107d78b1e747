//! The event loop's single piece of mutable state.
//!
//! Two writer roles, never mixed: the poller replaces the scan snapshot via
//! [`PortState::apply_scan`], and user actions change the watch list,
//! favorites and settings through the named mutation methods. Every settings
//! mutation is applied in memory first and then written through to the
//! [`ConfigStore`]; a failed write is reported but not rolled back.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{Config, ConfigStore};
use crate::error::{ConfigError, PersistenceError, ScanError};
use crate::model::{KillTarget, Notification, PortRecord, PortView, ViewFilter};
use crate::notify::{NotificationSink, WatchTracker};
use crate::reconcile::compute_view;

// Own writes remembered for recognising file-watcher echoes.
const RECENT_SAVES: usize = 8;

/// What [`PortState::apply_reloaded`] did with a config read back from disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReloadOutcome {
    Unchanged,
    /// The file held something this process wrote earlier and has since
    /// superseded; the newer in-memory config is kept.
    StaleOwnWrite,
    Applied { interval_changed: bool },
}

pub fn validate_port(raw: i64) -> Result<u16, ConfigError> {
    match u16::try_from(raw) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw)),
    }
}

pub struct PortState {
    scan: Vec<PortRecord>,
    scan_error: Option<ScanError>,
    config: Config,
    // Session-only, never persisted.
    favorites: BTreeSet<u16>,
    tracker: WatchTracker,
    recent_saves: VecDeque<Config>,
    store: Box<dyn ConfigStore>,
    sink: Arc<dyn NotificationSink>,
}

impl PortState {
    pub fn new(config: Config, store: Box<dyn ConfigStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            scan: Vec::new(),
            scan_error: None,
            config,
            favorites: BTreeSet::new(),
            tracker: WatchTracker::default(),
            recent_saves: VecDeque::new(),
            store,
            sink,
        }
    }

    pub fn scan(&self) -> &[PortRecord] {
        &self.scan
    }

    /// Set while the latest scan failed; the previous snapshot stays in place.
    pub fn scan_error(&self) -> Option<&ScanError> {
        self.scan_error.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn watched_ports(&self) -> &BTreeSet<u16> {
        &self.config.watched_ports
    }

    pub fn favorites(&self) -> &BTreeSet<u16> {
        &self.favorites
    }

    pub fn notifications_enabled(&self) -> bool {
        self.config.notifications_enabled
    }

    pub fn view(&self, filter: &ViewFilter) -> Vec<PortView> {
        compute_view(&self.scan, &self.config.watched_ports, &self.favorites, filter)
    }

    /// Replaces the snapshot wholesale on success. On failure the old snapshot
    /// is kept and the error flag raised; only the first failure in a row is
    /// announced.
    pub fn apply_scan(&mut self, result: Result<Vec<PortRecord>, ScanError>) {
        match result {
            Ok(records) => {
                let transitions = self.tracker.observe(&records, &self.config.watched_ports);
                if self.config.notifications_enabled {
                    for notification in transitions {
                        self.sink.notify(notification);
                    }
                }
                if self.scan_error.take().is_some() {
                    info!("port scan recovered");
                }
                debug!("applied scan with {} listeners", records.len());
                self.scan = records;
            }
            Err(err) => {
                warn!("{}", err);
                if self.scan_error.is_none() {
                    self.sink.notify(Notification::error("Scan failed", err.0.clone()));
                }
                self.scan_error = Some(err);
            }
        }
    }

    /// Returns `Ok(false)` when the port was already watched.
    pub fn add_watched_port(&mut self, raw: i64) -> Result<bool, ConfigError> {
        let port = validate_port(raw)?;
        if self.config.watched_ports.contains(&port) {
            return Ok(false);
        }
        self.config.watched_ports.insert(port);
        self.persist()?;
        self.sink.notify(Notification::success(
            "Port added to watch",
            format!("Port {} is now being watched", port),
        ));
        Ok(true)
    }

    /// Idempotent; persists whether or not the port was present.
    pub fn remove_watched_port(&mut self, raw: i64) -> Result<bool, ConfigError> {
        let port = validate_port(raw)?;
        let removed = self.config.watched_ports.remove(&port);
        self.persist()?;
        Ok(removed)
    }

    /// Returns the new flag value.
    pub fn toggle_notifications(&mut self) -> Result<bool, ConfigError> {
        self.config.notifications_enabled = !self.config.notifications_enabled;
        self.persist()?;
        Ok(self.config.notifications_enabled)
    }

    /// Returns whether the port is now a favorite.
    pub fn toggle_favorite(&mut self, raw: i64) -> Result<bool, ConfigError> {
        let port = validate_port(raw)?;
        if self.favorites.remove(&port) {
            Ok(false)
        } else {
            self.favorites.insert(port);
            Ok(true)
        }
    }

    /// Takes a config read back by the file watcher. Favorites are untouched.
    ///
    /// A reload that matches one of this process's own recent writes is an
    /// echo that arrived after a newer local change, so it is ignored rather
    /// than rolling that change back.
    pub fn apply_reloaded(&mut self, config: Config) -> ReloadOutcome {
        if config == self.config {
            return ReloadOutcome::Unchanged;
        }
        if self.recent_saves.contains(&config) {
            debug!("ignoring reload of an earlier local save");
            return ReloadOutcome::StaleOwnWrite;
        }
        let interval_changed = config.monitoring != self.config.monitoring;
        info!(
            "config reloaded: {} watched ports, notifications {}",
            config.watched_ports.len(),
            if config.notifications_enabled { "on" } else { "off" }
        );
        self.config = config;
        // an outside edit supersedes everything written before it
        self.recent_saves.clear();
        ReloadOutcome::Applied { interval_changed }
    }

    pub fn describe_pid(&self, pid: i32) -> Option<KillTarget> {
        self.scan
            .iter()
            .find(|record| record.pid == pid)
            .map(|record| KillTarget {
                pid,
                process_name: record.process_name.clone(),
            })
    }

    fn persist(&mut self) -> Result<(), ConfigError> {
        if let Err(err) = self.store.save(&self.config) {
            warn!("{}", err);
            self.sink.notify(correction(&err));
            return Err(err.into());
        }
        if self.recent_saves.len() == RECENT_SAVES {
            self.recent_saves.pop_front();
        }
        self.recent_saves.push_back(self.config.clone());
        Ok(())
    }
}

fn correction(err: &PersistenceError) -> Notification {
    Notification::error(
        "Settings not saved",
        format!("Change kept for this session only: {}", err.0),
    )
}
