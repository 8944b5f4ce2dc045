//! Raw-mode terminal password prompt.
//!
//! Reads key events with `crossterm` and feeds them through the
//! wallet's [`MaskedInput`] state machine, which owns the masking and
//! ANSI-filtering rules. Pasted text arrives as a `Paste` event and
//! is fed character by character, so escape sequences embedded in a
//! paste are dropped by the same state machine.

use std::io::Write;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use depinchat_wallet::prompt::{Feedback, MaskedInput, PasswordSource};
use depinchat_types::{DepinError, Result};
use zeroize::Zeroizing;

/// Interactive prompt over the controlling terminal.
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// Reads one masked password line. `None` means Ctrl-C.
    fn read_one(&self, attempt: usize) -> Result<Option<Zeroizing<String>>> {
        let mut stderr = std::io::stderr();
        if attempt == 1 {
            let _ = write!(stderr, "Password: ");
        } else {
            let _ = write!(stderr, "Password (attempt {attempt}): ");
        }
        let _ = stderr.flush();

        terminal::enable_raw_mode().map_err(|e| DepinError::Message {
            reason: format!("cannot enter raw mode: {e}"),
        })?;
        let result = self.read_loop(&mut stderr);
        let _ = terminal::disable_raw_mode();
        let _ = writeln!(stderr);
        result
    }

    fn read_loop(&self, stderr: &mut std::io::Stderr) -> Result<Option<Zeroizing<String>>> {
        let mut input = MaskedInput::new();
        loop {
            let event = crossterm::event::read().map_err(|e| DepinError::Message {
                reason: format!("terminal read failed: {e}"),
            })?;

            let chars: Vec<char> = match event {
                Event::Key(key) => key_to_chars(&key),
                Event::Paste(text) => text.chars().collect(),
                _ => continue,
            };

            for c in chars {
                match input.feed(c) {
                    Feedback::Echo => {
                        let _ = write!(stderr, "*");
                        let _ = stderr.flush();
                    }
                    Feedback::Erase => {
                        let _ = write!(stderr, "\u{08} \u{08}");
                        let _ = stderr.flush();
                    }
                    Feedback::Submit => return Ok(Some(input.take())),
                    Feedback::Cancel => return Ok(None),
                    Feedback::None => {}
                }
            }
        }
    }
}

/// Translates a crossterm key event into the character stream the
/// state machine understands.
fn key_to_chars(key: &KeyEvent) -> Vec<char> {
    match key.code {
        KeyCode::Enter => vec!['\r'],
        KeyCode::Backspace => vec!['\u{7f}'],
        KeyCode::Esc => vec!['\u{1b}'],
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => match c {
            'c' => vec!['\u{03}'],
            'd' => vec!['\u{04}'],
            _ => Vec::new(),
        },
        KeyCode::Char(c) => vec![c],
        _ => Vec::new(),
    }
}

impl PasswordSource for TerminalPrompt {
    fn read_password(&mut self, attempt: usize) -> Result<Option<Zeroizing<String>>> {
        self.read_one(attempt)
    }

    fn on_rejected(&mut self, _attempt: usize, remaining: usize) {
        if remaining > 0 {
            eprintln!("Wrong password, {remaining} attempt(s) remaining.");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn plain_chars_pass_through() {
        assert_eq!(key_to_chars(&key(KeyCode::Char('a'), KeyModifiers::NONE)), vec!['a']);
        assert_eq!(
            key_to_chars(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            vec!['A']
        );
    }

    #[test]
    fn control_keys_map_to_c0() {
        assert_eq!(
            key_to_chars(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            vec!['\u{03}']
        );
        assert_eq!(
            key_to_chars(&key(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            vec!['\u{04}']
        );
        assert!(key_to_chars(&key(KeyCode::Char('z'), KeyModifiers::CONTROL)).is_empty());
    }

    #[test]
    fn editing_keys_map_to_controls() {
        assert_eq!(key_to_chars(&key(KeyCode::Enter, KeyModifiers::NONE)), vec!['\r']);
        assert_eq!(
            key_to_chars(&key(KeyCode::Backspace, KeyModifiers::NONE)),
            vec!['\u{7f}']
        );
        assert_eq!(key_to_chars(&key(KeyCode::Esc, KeyModifiers::NONE)), vec!['\u{1b}']);
    }

    #[test]
    fn navigation_keys_are_ignored() {
        assert!(key_to_chars(&key(KeyCode::Up, KeyModifiers::NONE)).is_empty());
        assert!(key_to_chars(&key(KeyCode::F(5), KeyModifiers::NONE)).is_empty());
    }
}
