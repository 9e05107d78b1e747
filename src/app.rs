use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ::notify::{Event as FsEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, select, unbounded};
use log::{debug, error, info, warn};

use crate::adapters::{SystemScanner, SystemTerminator};
use crate::config::{Config, JsonConfigStore, get_config_path, load_and_validate_config};
use crate::error::ConfigError;
use crate::model::{AppEvent, CredentialReply, KillTarget, ViewFilter, WorkerCommand};
use crate::notify::{ChannelSink, NoticeRouter, NotificationSink};
use crate::poller::{self, PollEvent, PollHandle, ScanTrigger};
use crate::state::{PortState, ReloadOutcome};
use crate::termination::{CredentialRequest, KillState, TerminationController};
use crate::ui::console::{
    ConsoleAction, HELP, parse_command, render_credential_request, render_notice, render_view,
};
use crate::ui::prompt;

const CONFIG_DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Default)]
pub struct AppOptions {
    pub config_path: Option<PathBuf>,
    /// Overrides `monitoring.poll_interval_ms`.
    pub poll_interval: Option<Duration>,
}

pub fn run(options: AppOptions) -> Result<()> {
    let config_path = options.config_path.unwrap_or_else(get_config_path);
    let store = JsonConfigStore::new(&config_path);
    let config = store
        .load_or_create()
        .context("failed to load configuration")?;
    let interval = options
        .poll_interval
        .unwrap_or_else(|| Duration::from_millis(config.monitoring.poll_interval_ms));
    info!(
        "using config {} with poll interval {:?}",
        config_path.display(),
        interval
    );

    let (event_tx, event_rx) = unbounded::<AppEvent>();
    let (poll_tx, poll_rx) = unbounded::<PollEvent>();
    let (worker_tx, worker_rx) = unbounded::<WorkerCommand>();
    let (reply_tx, reply_rx) = unbounded::<CredentialReply>();
    let sink: Arc<dyn NotificationSink> = Arc::new(ChannelSink::new(event_tx.clone()));

    let poller = poller::start(Arc::new(SystemScanner), interval, poll_tx);
    let controller = TerminationController::new(
        Arc::new(SystemTerminator),
        Arc::new(poller.trigger()),
        sink.clone(),
    );

    let _worker = spawn_worker(controller, worker_rx, reply_rx, event_tx.clone());
    let _config_watcher = spawn_config_watcher(config_path, event_tx.clone());
    let _input = spawn_input_thread(event_tx);

    println!(
        "Watching {} port(s). Type 'help' for commands.",
        config.watched_ports.len()
    );

    let mut console = Console {
        state: PortState::new(config, Box::new(store), sink),
        filter: ViewFilter::default(),
        pending_credential: None,
        active_kill: None,
        rendered: false,
        worker: worker_tx,
        replies: reply_tx,
        poller,
        notices: NoticeRouter::default(),
    };

    loop {
        select! {
            recv(poll_rx) -> msg => match msg {
                Ok(event) => console.on_poll(event),
                Err(_) => break,
            },
            recv(event_rx) -> msg => match msg {
                Ok(event) => {
                    if let Flow::Quit = console.on_event(event) {
                        break;
                    }
                }
                Err(_) => break,
            },
        }
    }

    console.poller.stop();
    debug!("event loop finished");
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

/// Owns all mutable state; lives on the main thread.
struct Console {
    state: PortState,
    filter: ViewFilter,
    pending_credential: Option<CredentialRequest>,
    active_kill: Option<i32>,
    rendered: bool,
    worker: Sender<WorkerCommand>,
    replies: Sender<CredentialReply>,
    poller: PollHandle,
    notices: NoticeRouter,
}

impl Console {
    fn on_poll(&mut self, event: PollEvent) {
        let before = self.state.scan().to_vec();
        let had_error = self.state.scan_error().is_some();
        self.state.apply_scan(event.result);

        let changed = self.state.scan() != before.as_slice()
            || had_error != self.state.scan_error().is_some();
        if changed || !self.rendered || event.trigger == ScanTrigger::Manual {
            self.print_view();
        }
    }

    fn on_event(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Input(action) => return self.on_action(action),
            AppEvent::Notice(notification) => {
                println!("{}", render_notice(&notification));
                self.notices
                    .route(notification, self.state.notifications_enabled());
            }
            AppEvent::CredentialRequested(request) => {
                println!("{}", render_credential_request(&request));
                self.pending_credential = Some(request);
            }
            AppEvent::KillFinished { pid } => {
                debug!("kill of PID {} finished", pid);
                self.active_kill = None;
                self.pending_credential = None;
            }
            AppEvent::ConfigReloaded(config) => self.on_config_reloaded(config),
            AppEvent::ConfigReloadFailed(message) => println!("⚠️ {}", message),
            AppEvent::InputClosed => return Flow::Quit,
        }
        Flow::Continue
    }

    fn on_action(&mut self, action: ConsoleAction) -> Flow {
        match action {
            ConsoleAction::List => self.print_view(),
            ConsoleAction::Refresh => {
                if !self.poller.refresh() {
                    println!("A scan is already running.");
                }
            }
            ConsoleAction::Watch(raw) => match self.state.add_watched_port(raw) {
                Ok(true) => self.print_view(),
                Ok(false) => println!("Port {} is already watched.", raw),
                Err(err) => self.report_config_error(err),
            },
            ConsoleAction::Unwatch(raw) => match self.state.remove_watched_port(raw) {
                Ok(true) => {
                    println!("Stopped watching port {}.", raw);
                    self.print_view();
                }
                Ok(false) => println!("Port {} was not watched.", raw),
                Err(err) => self.report_config_error(err),
            },
            ConsoleAction::Favorite(raw) => match self.state.toggle_favorite(raw) {
                Ok(true) => println!("★ Port {} added to favorites.", raw),
                Ok(false) => println!("Port {} removed from favorites.", raw),
                Err(err) => self.report_config_error(err),
            },
            ConsoleAction::FavoritesOnly => {
                self.filter.favorites_only = !self.filter.favorites_only;
                self.print_view();
            }
            ConsoleAction::Search(term) => {
                self.filter.search_term = term;
                self.print_view();
            }
            ConsoleAction::ToggleNotifications => {
                if let Err(err) = self.state.toggle_notifications() {
                    self.report_config_error(err);
                }
                println!(
                    "Notifications {}.",
                    if self.state.notifications_enabled() { "on" } else { "off" }
                );
            }
            ConsoleAction::Kill(pid) => self.start_kill(pid),
            ConsoleAction::Authenticate => println!("Type 'auth' on its own line to enter a password."),
            ConsoleAction::SubmitCredential(credential) => {
                if self.pending_credential.take().is_some() {
                    self.reply(CredentialReply::Submit(credential));
                } else {
                    println!("No kill is waiting for a password.");
                }
            }
            ConsoleAction::Cancel => {
                if self.pending_credential.take().is_some() {
                    self.reply(CredentialReply::Cancel);
                } else {
                    println!("Nothing to cancel.");
                }
            }
            ConsoleAction::Help => println!("{}", HELP),
            ConsoleAction::Quit => return Flow::Quit,
            ConsoleAction::Invalid(message) => println!("{}", message),
        }
        Flow::Continue
    }

    fn start_kill(&mut self, pid: i32) {
        if let Some(active) = self.active_kill {
            println!("Still terminating PID {}; wait for it to finish.", active);
            return;
        }
        let target = self.state.describe_pid(pid).unwrap_or_else(|| KillTarget {
            pid,
            process_name: format!("PID {}", pid),
        });
        println!("Terminating {} (PID {})...", target.process_name, pid);
        if self.worker.send(WorkerCommand::Kill(target)).is_err() {
            error!("kill worker is gone");
            return;
        }
        self.active_kill = Some(pid);
    }

    fn reply(&self, reply: CredentialReply) {
        if self.replies.send(reply).is_err() {
            error!("kill worker is gone, dropping credential reply");
        }
    }

    fn on_config_reloaded(&mut self, config: Config) {
        match self.state.apply_reloaded(config) {
            ReloadOutcome::Unchanged | ReloadOutcome::StaleOwnWrite => {
                debug!("config file event without new settings");
            }
            ReloadOutcome::Applied { interval_changed } => {
                if interval_changed {
                    warn!("poll interval changes take effect after a restart");
                }
                println!("Config reloaded.");
                self.print_view();
            }
        }
    }

    fn report_config_error(&self, err: ConfigError) {
        match err {
            ConfigError::InvalidPort(_) => println!("{}", err),
            // the correction notice has already been printed
            ConfigError::Persistence(_) => {}
        }
    }

    fn print_view(&mut self) {
        self.rendered = true;
        println!("{}", render_view(&self.state, &self.filter));
    }
}

fn spawn_worker(
    controller: TerminationController,
    rx: Receiver<WorkerCommand>,
    replies: Receiver<CredentialReply>,
    events: Sender<AppEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for command in rx.iter() {
            match command {
                WorkerCommand::Kill(target) => {
                    let pid = target.pid;
                    let outcome = drive_kill(&controller, target, &replies, &events);
                    debug!("kill of PID {} ended in {:?}", pid, outcome);
                    if events.send(AppEvent::KillFinished { pid }).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Runs one attempt to a terminal state, relaying credential prompts to the
/// event loop. A closed reply channel counts as a cancel.
fn drive_kill(
    controller: &TerminationController,
    target: KillTarget,
    replies: &Receiver<CredentialReply>,
    events: &Sender<AppEvent>,
) -> KillState {
    // replies meant for an earlier attempt
    while replies.try_recv().is_ok() {}

    let mut attempt = controller.begin(target);
    let mut state = attempt.run().clone();
    loop {
        match state {
            KillState::AwaitingCredential(request) => {
                if events.send(AppEvent::CredentialRequested(request)).is_err() {
                    return attempt.cancel().clone();
                }
                state = match replies.recv() {
                    Ok(CredentialReply::Submit(credential)) => {
                        attempt.submit_credential(credential).clone()
                    }
                    Ok(CredentialReply::Cancel) | Err(_) => attempt.cancel().clone(),
                };
            }
            other => return other,
        }
    }
}

fn spawn_config_watcher(config_path: PathBuf, events: Sender<AppEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (tx, rx) = unbounded();

        let mut watcher: RecommendedWatcher = match Watcher::new(
            move |res: Result<FsEvent, ::notify::Error>| {
                let _ = tx.send(res);
            },
            ::notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to create config watcher: {}", e);
                return;
            }
        };

        // Saves replace the file by rename, so watch the directory.
        let dir = watch_dir(&config_path);
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            error!("Failed to watch config directory {}: {}", dir.display(), e);
            return;
        }
        debug!("Config watcher started for {:?}", config_path);

        let mut pending = false;
        loop {
            let next = if pending {
                rx.recv_timeout(CONFIG_DEBOUNCE_DURATION)
            } else {
                rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
            };
            match next {
                Ok(Ok(event)) => {
                    if is_config_change(&event, &config_path) {
                        pending = true;
                    }
                }
                Ok(Err(e)) => error!("Config watch error: {}", e),
                // Editors may write in several steps; reload once things settle.
                Err(RecvTimeoutError::Timeout) => {
                    pending = false;
                    debug!("Config file changed, attempting reload");
                    let event = match load_and_validate_config(&config_path) {
                        Ok(config) => AppEvent::ConfigReloaded(config),
                        Err(e) => {
                            let msg = format!("Config reload failed: {:#}", e);
                            warn!("{}", msg);
                            AppEvent::ConfigReloadFailed(msg)
                        }
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    })
}

fn watch_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_config_change(event: &FsEvent, config_path: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == config_path.file_name())
}

fn spawn_input_thread(events: Sender<AppEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    error!("failed to read stdin: {}", err);
                    break;
                }
            }
            let Some(action) = parse_command(&line) else {
                continue;
            };
            // Only this thread touches stdin, so the password is read here.
            let action = match action {
                ConsoleAction::Authenticate => match prompt::read_password("Password: ") {
                    Ok(Some(credential)) => ConsoleAction::SubmitCredential(credential),
                    Ok(None) => ConsoleAction::Cancel,
                    Err(err) => ConsoleAction::Invalid(format!("could not read password: {:#}", err)),
                },
                other => other,
            };
            let quit = matches!(action, ConsoleAction::Quit);
            if events.send(AppEvent::Input(action)).is_err() || quit {
                return;
            }
        }
        let _ = events.send(AppEvent::InputClosed);
    })
}
