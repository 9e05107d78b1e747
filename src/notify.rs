use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::model::{AppEvent, Notification, NotificationKind, PortRecord};

const MAX_BODY_LEN: usize = 80;

/// Fire-and-forget receiver of outcome events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to the console event loop.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: Sender<AppEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(AppEvent::Notice(notification)).is_err() {
            log::debug!("event loop gone, dropping notification");
        }
    }
}

/// Writes notices to the log so they survive in stderr output.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => {
                log::warn!("{}: {}", notification.subject, notification.detail)
            }
            _ => log::info!("{}: {}", notification.subject, notification.detail),
        }
    }
}

/// Native desktop notifications (terminal-notifier, notify-send or a
/// PowerShell toast). Delivery failures are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn notify(&self, notification: Notification) {
        let body = truncate(&notification.detail, MAX_BODY_LEN);
        crate::platform::current::notify::show(&notification.subject, &body);
    }
}

/// Final delivery of notices that reached the event loop: the log always
/// gets them, the desktop only while notifications are enabled.
#[derive(Clone)]
pub struct NoticeRouter {
    log: Arc<dyn NotificationSink>,
    desktop: Arc<dyn NotificationSink>,
}

impl NoticeRouter {
    pub fn new(log: Arc<dyn NotificationSink>, desktop: Arc<dyn NotificationSink>) -> Self {
        Self { log, desktop }
    }

    pub fn route(&self, notification: Notification, notifications_enabled: bool) {
        if notifications_enabled {
            self.desktop.notify(notification.clone());
        }
        self.log.notify(notification);
    }
}

impl Default for NoticeRouter {
    fn default() -> Self {
        Self::new(Arc::new(LogSink), Arc::new(DesktopSink))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Turns consecutive scans into taken / freed / changed-hands events for
/// watched ports.
///
/// The tracker remembers every occupied port, not only watched ones, so
/// watching a port that is already busy does not look like it was just taken.
/// The first snapshot only primes the tracker.
#[derive(Debug, Default)]
pub struct WatchTracker {
    last: HashMap<u16, i32>,
    primed: bool,
}

impl WatchTracker {
    pub fn observe(&mut self, scan: &[PortRecord], watched: &BTreeSet<u16>) -> Vec<Notification> {
        let current: HashMap<u16, &PortRecord> = scan.iter().map(|r| (r.port, r)).collect();
        let mut events = Vec::new();

        if self.primed {
            for &port in watched {
                match (self.last.get(&port), current.get(&port)) {
                    (None, Some(record)) => events.push(Notification::info(
                        format!("Port {} taken", port),
                        format!("{} (PID {})", record.process_name, record.pid),
                    )),
                    (Some(pid), None) => events.push(Notification::info(
                        format!("Port {} freed", port),
                        format!("PID {} released the port", pid),
                    )),
                    (Some(pid), Some(record)) if *pid != record.pid => {
                        events.push(Notification::info(
                            format!("Port {} changed hands", port),
                            format!("Now held by {} (PID {})", record.process_name, record.pid),
                        ))
                    }
                    _ => {}
                }
            }
        }

        self.last = current.into_iter().map(|(port, r)| (port, r.pid)).collect();
        self.primed = true;
        events
    }
}
