//! Password prompt without terminal echo

use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

/// Read a password from the terminal without echoing it.
///
/// Piped stdin is read as a single line.
pub fn read_password(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush().context("Failed to write prompt")?;

    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password")?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    enable_raw_mode().context("Failed to switch terminal to raw mode")?;
    let result = read_hidden();
    let restored = disable_raw_mode();
    eprintln!();
    restored.context("Failed to restore terminal")?;
    result
}

fn read_hidden() -> Result<String> {
    let mut password = String::new();
    loop {
        let Event::Key(key) = event::read().context("Failed to read key")? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match apply_key(&mut password, key) {
            KeyOutcome::Continue => {}
            KeyOutcome::Submit => return Ok(password),
            KeyOutcome::Cancel => bail!("Password entry cancelled"),
        }
    }
}

fn apply_key(password: &mut String, key: KeyEvent) -> KeyOutcome {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Esc => KeyOutcome::Cancel,
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => KeyOutcome::Cancel,
        KeyCode::Char('u') if ctrl => {
            password.clear();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) => {
            password.push(c);
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            password.pop();
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}
