//! Periodic port scanning.
//!
//! A timer thread dispatches one scan per tick. Scheduled ticks and manual
//! refreshes share an in-flight guard: while one of them is still scanning,
//! the next is skipped rather than queued, so results always arrive in
//! dispatch order. Forced refreshes (after a kill) bypass the guard.
//!
//! After [`PollHandle::stop`] returns no new scan is started, and results of
//! scans that were already running are dropped on arrival.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, select, tick};

use crate::adapters::PortScanner;
use crate::error::ScanError;
use crate::model::PortRecord;
use crate::termination::Rescan;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanTrigger {
    Scheduled,
    Manual,
    Forced,
}

#[derive(Debug)]
pub struct PollEvent {
    pub trigger: ScanTrigger,
    pub result: Result<Vec<PortRecord>, ScanError>,
}

struct Shared {
    scanner: Arc<dyn PortScanner>,
    events: Sender<PollEvent>,
    in_flight: AtomicBool,
    stopped: AtomicBool,
}

impl Shared {
    fn dispatch(self: &Arc<Self>, trigger: ScanTrigger) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        let guarded = trigger != ScanTrigger::Forced;
        if guarded
            && self
                .in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            log::trace!("scan still outstanding, skipping {:?} tick", trigger);
            return false;
        }

        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("port-scan".into())
            .spawn(move || shared.run_scan(trigger, guarded));
        if let Err(err) = spawned {
            log::error!("failed to spawn scan thread: {}", err);
            if guarded {
                self.in_flight.store(false, Ordering::SeqCst);
            }
            return false;
        }
        true
    }

    fn run_scan(&self, trigger: ScanTrigger, guarded: bool) {
        let result = if self.stopped.load(Ordering::SeqCst) {
            None
        } else {
            let started = Instant::now();
            let result = self.scanner.scan_ports();
            log::trace!("{:?} scan took {:?}", trigger, started.elapsed());
            Some(result)
        };

        if guarded {
            self.in_flight.store(false, Ordering::SeqCst);
        }

        let Some(result) = result else {
            return;
        };
        if self.stopped.load(Ordering::SeqCst) {
            log::debug!("poller stopped, discarding {:?} scan result", trigger);
            return;
        }
        if self.events.send(PollEvent { trigger, result }).is_err() {
            log::debug!("poll receiver gone, dropping scan result");
        }
    }
}

pub struct PollHandle {
    shared: Arc<Shared>,
    stop_tx: Sender<()>,
    timer: Mutex<Option<thread::JoinHandle<()>>>,
}

/// Starts polling. The first scan is dispatched immediately.
pub fn start(
    scanner: Arc<dyn PortScanner>,
    interval: Duration,
    events: Sender<PollEvent>,
) -> PollHandle {
    let shared = Arc::new(Shared {
        scanner,
        events,
        in_flight: AtomicBool::new(false),
        stopped: AtomicBool::new(false),
    });
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    shared.dispatch(ScanTrigger::Scheduled);

    let timer_shared = Arc::clone(&shared);
    let timer = thread::spawn(move || {
        let ticker = tick(interval);
        loop {
            select! {
                recv(ticker) -> _ => {
                    timer_shared.dispatch(ScanTrigger::Scheduled);
                }
                recv(stop_rx) -> _ => break,
            }
        }
        log::debug!("poll timer stopped");
    });

    PollHandle {
        shared,
        stop_tx,
        timer: Mutex::new(Some(timer)),
    }
}

impl PollHandle {
    /// User-triggered scan; skipped if another scheduled or manual scan is
    /// still running. Returns whether a scan was started.
    pub fn refresh(&self) -> bool {
        self.shared.dispatch(ScanTrigger::Manual)
    }

    /// Scan that runs even while a scheduled one is outstanding.
    pub fn force_refresh(&self) -> bool {
        self.shared.dispatch(ScanTrigger::Forced)
    }

    /// A cloneable handle for requesting forced refreshes.
    pub fn trigger(&self) -> PollTrigger {
        PollTrigger {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Idempotent. Joins the timer thread before returning.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.try_send(());
        let timer = match self.timer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(timer) = timer
            && timer.join().is_err()
        {
            log::error!("poll timer thread panicked");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone)]
pub struct PollTrigger {
    shared: Arc<Shared>,
}

impl Rescan for PollTrigger {
    fn rescan(&self) {
        self.shared.dispatch(ScanTrigger::Forced);
    }
}
