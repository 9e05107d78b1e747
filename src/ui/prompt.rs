//! Password entry without echo.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use zeroize::Zeroizing;

use crate::termination::Credential;

/// Reads one line from the terminal with echo off. Returns `Ok(None)` when the
/// user presses Esc or Ctrl-C. When stdin is not a terminal the line is read
/// as-is, so piped input still works.
pub fn read_password(label: &str) -> Result<Option<Credential>> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    if !io::stdin().is_terminal() {
        return read_plain(&mut io::stdin().lock());
    }

    enable_raw_mode().context("failed to enable raw terminal mode")?;
    let result = read_raw();
    if let Err(err) = disable_raw_mode() {
        log::warn!("failed to restore terminal mode: {}", err);
    }
    writeln!(stdout)?;
    result
}

// The line buffer is wiped on every return path, including read errors.
fn read_plain(reader: &mut impl BufRead) -> Result<Option<Credential>> {
    let mut line = Zeroizing::new(String::with_capacity(128));
    let read = reader
        .read_line(&mut line)
        .context("failed to read password")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(Credential::new(line.trim_end_matches(['\r', '\n']))))
}

fn read_raw() -> Result<Option<Credential>> {
    let mut buffer = Credential::new(String::new());
    loop {
        let Event::Key(key) = event::read().context("failed to read key event")? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match apply_key(&buffer, key) {
            KeyStep::Continue(next) => buffer = next,
            KeyStep::Done => return Ok(Some(buffer)),
            KeyStep::Abort => return Ok(None),
        }
    }
}

enum KeyStep {
    Continue(Credential),
    Done,
    Abort,
}

// Rebuilds the buffer on every key so each intermediate copy is zeroed on drop.
fn apply_key(buffer: &Credential, key: KeyEvent) -> KeyStep {
    match key.code {
        KeyCode::Enter => KeyStep::Done,
        KeyCode::Esc => KeyStep::Abort,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyStep::Abort,
        KeyCode::Backspace => {
            let mut chars = buffer.expose().chars();
            chars.next_back();
            KeyStep::Continue(Credential::new(chars.as_str()))
        }
        KeyCode::Char(c) => {
            let mut next = String::with_capacity(buffer.expose().len() + c.len_utf8());
            next.push_str(buffer.expose());
            next.push(c);
            KeyStep::Continue(Credential::new(next))
        }
        _ => KeyStep::Continue(Credential::new(buffer.expose())),
    }
}
