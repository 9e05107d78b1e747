//! End-to-end behaviour through the public API, with in-memory adapters.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use portassassin::adapters::{PortScanner, ProcessTerminator};
use portassassin::config::{Config, ConfigStore};
use portassassin::error::{ConfigError, KillError, PersistenceError, ScanError};
use portassassin::model::{KillTarget, Notification, NotificationKind, PortRecord, ViewFilter};
use portassassin::notify::NotificationSink;
use portassassin::poller;
use portassassin::reconcile::compute_view;
use portassassin::state::PortState;
use portassassin::termination::{
    Credential, CredentialRequest, KillState, Privilege, Rescan, TerminationController,
};

#[derive(Default)]
struct Recorder(Mutex<Vec<Notification>>);

impl NotificationSink for Recorder {
    fn notify(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
struct Rescans(AtomicUsize);

impl Rescan for Rescans {
    fn rescan(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CountingStore(Arc<AtomicUsize>);

impl ConfigStore for CountingStore {
    fn load(&self) -> anyhow::Result<Config> {
        Ok(Config::default())
    }

    fn save(&self, _config: &Config) -> Result<(), PersistenceError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// First unprivileged kill is refused; elevated kills succeed.
#[derive(Default)]
struct RefusingTerminator {
    elevated: Mutex<Vec<(i32, String)>>,
}

impl ProcessTerminator for RefusingTerminator {
    fn kill_process(&self, _pid: i32) -> Result<(), KillError> {
        Err(KillError::PermissionDenied("operation not permitted".into()))
    }

    fn kill_process_elevated(&self, pid: i32, credential: &Credential) -> Result<(), KillError> {
        self.elevated
            .lock()
            .unwrap()
            .push((pid, credential.expose().to_string()));
        Ok(())
    }
}

/// Each scan blocks until the test releases it.
struct SlowScanner {
    calls: AtomicUsize,
    release: Receiver<()>,
}

impl PortScanner for SlowScanner {
    fn scan_ports(&self) -> Result<Vec<PortRecord>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.release.recv_timeout(Duration::from_secs(5));
        Ok(Vec::new())
    }
}

fn node_scan() -> Vec<PortRecord> {
    vec![PortRecord::new(3000, 111, "node")]
}

fn ports(list: &[u16]) -> BTreeSet<u16> {
    list.iter().copied().collect()
}

#[test]
fn occupied_and_free_watched_ports_are_merged() {
    let view = compute_view(
        &node_scan(),
        &ports(&[3000, 8080]),
        &BTreeSet::new(),
        &ViewFilter::default(),
    );

    assert_eq!(view.len(), 2);
    assert_eq!(view[0].port, 3000);
    assert_eq!(view[0].occupant, Some(PortRecord::new(3000, 111, "node")));
    assert!(view[0].is_watched);
    assert_eq!(view[1].port, 8080);
    assert!(view[1].occupant.is_none());
    assert!(view[1].is_watched);
    assert!(view.iter().all(|entry| !entry.is_favorite));
}

#[test]
fn favorites_move_to_the_front() {
    let view = compute_view(
        &node_scan(),
        &ports(&[3000, 8080]),
        &ports(&[8080]),
        &ViewFilter::default(),
    );

    let order: Vec<u16> = view.iter().map(|entry| entry.port).collect();
    assert_eq!(order, vec![8080, 3000]);
}

#[test]
fn view_is_the_union_and_deterministic() {
    let scan = vec![
        PortRecord::new(5432, 40, "postgres"),
        PortRecord::new(3000, 111, "node"),
        PortRecord::new(9229, 111, "node"),
    ];
    let watch = ports(&[3000, 8080, 6379]);
    let favorites = ports(&[9229, 6379]);

    let first = compute_view(&scan, &watch, &favorites, &ViewFilter::default());
    let second = compute_view(&scan, &watch, &favorites, &ViewFilter::default());
    assert_eq!(first, second);

    let seen: Vec<u16> = first.iter().map(|entry| entry.port).collect();
    let unique: HashSet<u16> = seen.iter().copied().collect();
    assert_eq!(seen.len(), unique.len());
    let expected: HashSet<u16> = [5432, 3000, 9229, 8080, 6379].into_iter().collect();
    assert_eq!(unique, expected);

    // favorites first, each group ascending
    assert_eq!(seen, vec![6379, 9229, 3000, 5432, 8080]);
}

#[test]
fn filters_narrow_the_view() {
    let scan = vec![
        PortRecord::new(5432, 40, "postgres"),
        PortRecord::new(3000, 111, "Node"),
    ];
    let watch = ports(&[8080]);
    let favorites = ports(&[8080, 5432]);

    let only_favorites = ViewFilter {
        search_term: String::new(),
        favorites_only: true,
    };
    let view = compute_view(&scan, &watch, &favorites, &only_favorites);
    assert!(view.iter().all(|entry| favorites.contains(&entry.port)));
    assert_eq!(view.len(), 2);

    let view = compute_view(&scan, &watch, &favorites, &ViewFilter::search("NODE"));
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].port, 3000);

    let view = compute_view(&scan, &watch, &favorites, &ViewFilter::search("40"));
    let matched: Vec<u16> = view.iter().map(|entry| entry.port).collect();
    assert_eq!(matched, vec![5432]);
}

#[test]
fn refused_kill_escalates_with_the_password() {
    let terminator = Arc::new(RefusingTerminator::default());
    let rescans = Arc::new(Rescans::default());
    let events = Arc::new(Recorder::default());
    let controller = TerminationController::new(terminator.clone(), rescans.clone(), events.clone());

    let mut attempt = controller.begin(KillTarget {
        pid: 111,
        process_name: "node".into(),
    });

    assert_eq!(
        attempt.run(),
        &KillState::AwaitingCredential(CredentialRequest {
            pid: 111,
            process_name: "node".into(),
            error: None,
            elevation_available: true,
        })
    );
    assert!(events.0.lock().unwrap().is_empty());

    let state = attempt.submit_credential(Credential::new("secret"));
    assert_eq!(state, &KillState::Succeeded(Privilege::Elevated));
    assert_eq!(
        *terminator.elevated.lock().unwrap(),
        vec![(111, "secret".to_string())]
    );
    assert_eq!(rescans.0.load(Ordering::SeqCst), 1);

    let events = events.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::Success);
}

#[test]
fn out_of_range_watch_port_never_persists() {
    let saves = Arc::new(AtomicUsize::new(0));
    let mut state = PortState::new(
        Config::default(),
        Box::new(CountingStore(saves.clone())),
        Arc::new(Recorder::default()),
    );

    assert_eq!(
        state.add_watched_port(70000),
        Err(ConfigError::InvalidPort(70000))
    );
    assert_eq!(saves.load(Ordering::SeqCst), 0);
    assert!(state.watched_ports().is_empty());
}

#[test]
fn removing_twice_matches_removing_once() {
    let mut state = PortState::new(
        Config::default(),
        Box::new(CountingStore::default()),
        Arc::new(Recorder::default()),
    );
    state.add_watched_port(3000).unwrap();
    state.add_watched_port(8080).unwrap();

    state.remove_watched_port(3000).unwrap();
    let once = state.config().clone();
    state.remove_watched_port(3000).unwrap();

    assert_eq!(state.config(), &once);
    assert_eq!(state.watched_ports(), &ports(&[8080]));
}

#[test]
fn overlapping_tick_does_not_call_the_scanner() {
    let (release_tx, release_rx): (Sender<()>, Receiver<()>) = unbounded();
    let scanner = Arc::new(SlowScanner {
        calls: AtomicUsize::new(0),
        release: release_rx,
    });
    let (events_tx, events_rx) = unbounded();

    // ticks every 10ms while the first scan stays blocked
    let handle = poller::start(scanner.clone(), Duration::from_millis(10), events_tx);
    let deadline = Instant::now() + Duration::from_secs(5);
    while scanner.calls.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "first scan never started");
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);

    handle.stop();
    release_tx.send(()).unwrap();
    assert!(events_rx.recv_timeout(Duration::from_millis(200)).is_err());
}
