use crate::model::{Notification, NotificationKind, PortView, ViewFilter};
use crate::state::PortState;
use crate::termination::{Credential, CredentialRequest};

const NAME_WIDTH: usize = 28;

pub const HELP: &str = "\
Commands:
  list               show the port view
  refresh            scan now
  watch <port>       add a port to the watch list
  unwatch <port>     remove a port from the watch list
  fav <port>         toggle a favorite (this session only)
  favonly            toggle showing favorites only
  search [term]      filter by port, PID or process name; no term clears
  notify             toggle notifications
  kill <pid>         terminate a process
  auth               enter the password for a pending kill
  cancel             abandon a pending kill
  quit";

#[derive(Debug)]
pub enum ConsoleAction {
    List,
    Refresh,
    Watch(i64),
    Unwatch(i64),
    Favorite(i64),
    FavoritesOnly,
    Search(String),
    ToggleNotifications,
    Kill(i32),
    /// Typed `auth`; the input thread turns this into `SubmitCredential`.
    Authenticate,
    SubmitCredential(Credential),
    Cancel,
    Help,
    Quit,
    Invalid(String),
}

/// Returns `None` for blank lines.
pub fn parse_command(line: &str) -> Option<ConsoleAction> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let action = match cmd.to_lowercase().as_str() {
        "list" | "ls" => ConsoleAction::List,
        "refresh" | "r" => ConsoleAction::Refresh,
        "watch" | "add" => port_arg(rest, "watch").map_or_else(ConsoleAction::Invalid, ConsoleAction::Watch),
        "unwatch" | "rm" => {
            port_arg(rest, "unwatch").map_or_else(ConsoleAction::Invalid, ConsoleAction::Unwatch)
        }
        "fav" => port_arg(rest, "fav").map_or_else(ConsoleAction::Invalid, ConsoleAction::Favorite),
        "favonly" => ConsoleAction::FavoritesOnly,
        "search" | "/" => ConsoleAction::Search(rest.to_string()),
        "notify" => ConsoleAction::ToggleNotifications,
        "kill" => match rest.parse::<i32>() {
            Ok(pid) if pid > 0 => ConsoleAction::Kill(pid),
            _ => ConsoleAction::Invalid("usage: kill <pid>".to_string()),
        },
        "auth" => ConsoleAction::Authenticate,
        "cancel" => ConsoleAction::Cancel,
        "help" | "?" => ConsoleAction::Help,
        "quit" | "q" | "exit" => ConsoleAction::Quit,
        other => ConsoleAction::Invalid(format!("unknown command '{}', try 'help'", other)),
    };
    Some(action)
}

// Range checks happen in `PortState` so every caller gets the same rule.
fn port_arg(rest: &str, cmd: &str) -> Result<i64, String> {
    rest.parse::<i64>()
        .map_err(|_| format!("usage: {} <port>", cmd))
}

pub fn render_view(state: &PortState, filter: &ViewFilter) -> String {
    let view = state.view(filter);
    let mut lines = Vec::new();

    lines.push(format!(
        "Active {} · Watched {} · Notifications {}",
        state.scan().len(),
        state.watched_ports().len(),
        if state.notifications_enabled() { "on" } else { "off" }
    ));
    if !filter.search_term.trim().is_empty() || filter.favorites_only {
        let mut parts = Vec::new();
        if !filter.search_term.trim().is_empty() {
            parts.push(format!("search \"{}\"", filter.search_term.trim()));
        }
        if filter.favorites_only {
            parts.push("favorites only".to_string());
        }
        lines.push(format!("Filter: {}", parts.join(", ")));
    }
    if let Some(err) = state.scan_error() {
        lines.push(format!("⚠️ {} (showing last good scan)", err));
    }

    if view.is_empty() {
        lines.push("No ports to show.".to_string());
    } else {
        lines.extend(view.iter().map(format_row));
    }
    lines.join("\n")
}

pub fn format_row(entry: &PortView) -> String {
    let star = if entry.is_favorite { '★' } else { ' ' };
    let occupant = match &entry.occupant {
        Some(record) => format!("{} (PID {})", record.process_name, record.pid),
        None => "available".to_string(),
    };
    let watched = if entry.is_watched { "watched" } else { "" };
    format!(
        "{} {:>5}  {:<width$} {}",
        star,
        entry.port,
        truncate(&occupant, NAME_WIDTH),
        watched,
        width = NAME_WIDTH
    )
    .trim_end()
    .to_string()
}

pub fn render_notice(notification: &Notification) -> String {
    let prefix = match notification.kind {
        NotificationKind::Success => "✅ ",
        NotificationKind::Error => "⛔ ",
        NotificationKind::Info => "🔔 ",
    };
    format!("{}{}: {}", prefix, notification.subject, notification.detail)
}

pub fn render_credential_request(request: &CredentialRequest) -> String {
    if !request.elevation_available {
        return format!(
            "Permission denied terminating {} (PID {}). Password elevation is not available on this platform; \
             restart portassassin as Administrator and retry. Type 'cancel' to dismiss.",
            request.process_name, request.pid
        );
    }
    let mut text = format!(
        "Administrator password required to terminate {} (PID {}). Type 'auth' to enter it or 'cancel'.",
        request.process_name, request.pid
    );
    if let Some(error) = &request.error {
        text.push_str(&format!("\n⚠️ {}", error));
    }
    text
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::model::PortRecord;
    use crate::testing::{MemoryStore, RecordingSink};

    #[test]
    fn parse_simple_actions() {
        assert!(matches!(parse_command("list"), Some(ConsoleAction::List)));
        assert!(matches!(parse_command("  R "), Some(ConsoleAction::Refresh)));
        assert!(matches!(parse_command("favonly"), Some(ConsoleAction::FavoritesOnly)));
        assert!(matches!(parse_command("notify"), Some(ConsoleAction::ToggleNotifications)));
        assert!(matches!(parse_command("auth"), Some(ConsoleAction::Authenticate)));
        assert!(matches!(parse_command("q"), Some(ConsoleAction::Quit)));
        assert!(parse_command("   ").is_none());
    }

    #[test]
    fn parse_targeted_actions() {
        assert!(matches!(parse_command("watch 3000"), Some(ConsoleAction::Watch(3000))));
        assert!(matches!(parse_command("unwatch 8080"), Some(ConsoleAction::Unwatch(8080))));
        assert!(matches!(parse_command("fav 5173"), Some(ConsoleAction::Favorite(5173))));
        assert!(matches!(parse_command("kill 111"), Some(ConsoleAction::Kill(111))));
        assert!(matches!(
            parse_command("search Node JS"),
            Some(ConsoleAction::Search(term)) if term == "Node JS"
        ));
        assert!(matches!(
            parse_command("search"),
            Some(ConsoleAction::Search(term)) if term.is_empty()
        ));
    }

    #[test]
    fn out_of_range_ports_still_parse() {
        // rejected later by the state, not by the parser
        assert!(matches!(parse_command("watch 70000"), Some(ConsoleAction::Watch(70000))));
    }

    #[test]
    fn bad_arguments_are_invalid() {
        assert!(matches!(parse_command("watch"), Some(ConsoleAction::Invalid(_))));
        assert!(matches!(parse_command("watch abc"), Some(ConsoleAction::Invalid(_))));
        assert!(matches!(parse_command("kill -5"), Some(ConsoleAction::Invalid(_))));
        assert!(matches!(
            parse_command("frobnicate"),
            Some(ConsoleAction::Invalid(msg)) if msg.contains("frobnicate")
        ));
    }

    #[test]
    fn rows_show_availability_and_favorites() {
        let busy = PortView {
            port: 3000,
            occupant: Some(PortRecord::new(3000, 111, "node")),
            is_watched: true,
            is_favorite: false,
        };
        let free = PortView {
            port: 8080,
            occupant: None,
            is_watched: true,
            is_favorite: true,
        };
        assert_eq!(
            format_row(&busy),
            format!("   3000  {:<28} watched", "node (PID 111)")
        );
        assert!(format_row(&free).starts_with("★  8080  available"));
    }

    #[test]
    fn render_lists_favorites_first() {
        let sink = Arc::new(RecordingSink::default());
        let mut state = PortState::new(Config::default(), Box::new(MemoryStore::default()), sink);
        state.add_watched_port(8080).unwrap();
        state.apply_scan(Ok(vec![PortRecord::new(3000, 111, "node")]));
        state.toggle_favorite(8080).unwrap();

        let text = render_view(&state, &ViewFilter::default());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Active 1 · Watched 1 · Notifications on");
        assert!(lines[1].contains("8080"));
        assert!(lines[2].contains("node (PID 111)"));
    }

    #[test]
    fn render_empty_view() {
        let sink = Arc::new(RecordingSink::default());
        let state = PortState::new(Config::default(), Box::new(MemoryStore::default()), sink);
        let text = render_view(&state, &ViewFilter::search("zzz"));
        assert!(text.contains("Filter: search \"zzz\""));
        assert!(text.ends_with("No ports to show."));
    }

    #[test]
    fn credential_prompt_mentions_target_and_error() {
        let request = CredentialRequest {
            pid: 111,
            process_name: "node".into(),
            error: Some("Incorrect password, try again".into()),
            elevation_available: true,
        };
        let text = render_credential_request(&request);
        assert!(text.contains("node (PID 111)"));
        assert!(text.ends_with("Incorrect password, try again"));
    }

    #[test]
    fn prompt_without_elevation_does_not_ask_for_a_password() {
        let request = CredentialRequest {
            pid: 4242,
            process_name: "svchost.exe".into(),
            error: None,
            elevation_available: false,
        };
        let text = render_credential_request(&request);
        assert!(text.contains("not available"));
        assert!(text.contains("Administrator"));
        assert!(!text.contains("'auth'"));
    }
}
