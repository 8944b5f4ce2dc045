//! Masked password input and the bounded-attempt unlock loop.
//!
//! The password prompt echoes a `*` per accepted character and never
//! the character itself. Pasted input may carry ANSI escape sequences
//! (cursor moves, bracketed-paste markers, OSC titles); an explicit
//! state machine drops them whole instead of letting fragments leak
//! into the password. Control characters other than backspace, Enter,
//! Ctrl-D, and Ctrl-C are ignored.
//!
//! Terminal plumbing (raw mode, key events) lives in the CLI crate;
//! this module is pure so the filtering rules are unit-testable.

use depinchat_types::{DepinError, Result};
use zeroize::Zeroizing;

use crate::secret_store;

/// Maximum interactive unlock attempts.
pub const MAX_UNLOCK_ATTEMPTS: usize = 3;

// ---------------------------------------------------------------------------
// Escape-filter state machine
// ---------------------------------------------------------------------------

/// Parser state while consuming an ANSI escape sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EscapeState {
    /// Plain input.
    Normal,
    /// Seen ESC; the next character selects the sequence family.
    Esc,
    /// Inside `ESC [ … final` (CSI).
    Csi,
    /// Inside `ESC ] …` (OSC), terminated by BEL or ST.
    Osc,
    /// Seen ESC inside an OSC; `\` completes the ST terminator.
    OscEsc,
}

/// Visible effect of feeding one character to the buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Feedback {
    /// Nothing to render (filtered or ignored input).
    None,
    /// One `*` should be echoed.
    Echo,
    /// One `*` should be erased.
    Erase,
    /// The password is complete (Enter / Ctrl-D).
    Submit,
    /// The user aborted (Ctrl-C).
    Cancel,
}

/// Accumulates a password, filtering escape sequences and controls.
pub struct MaskedInput {
    buffer: Zeroizing<String>,
    state: EscapeState,
}

impl Default for MaskedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskedInput {
    pub fn new() -> Self {
        Self {
            buffer: Zeroizing::new(String::new()),
            state: EscapeState::Normal,
        }
    }

    /// Number of accepted characters (equals echoed `*`s).
    pub fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the accumulated password.
    pub fn take(self) -> Zeroizing<String> {
        self.buffer
    }

    /// Feeds one character of input and reports the visible effect.
    pub fn feed(&mut self, c: char) -> Feedback {
        match self.state {
            EscapeState::Normal => self.feed_normal(c),
            EscapeState::Esc => {
                self.state = match c {
                    '[' => EscapeState::Csi,
                    ']' => EscapeState::Osc,
                    // Two-character sequences (ESC x) end here; a
                    // second ESC restarts the sequence.
                    '\u{1b}' => EscapeState::Esc,
                    _ => EscapeState::Normal,
                };
                Feedback::None
            }
            EscapeState::Csi => {
                // Parameter and intermediate bytes are 0x20..=0x3F;
                // any final byte 0x40..=0x7E ends the sequence.
                if ('\u{40}'..='\u{7e}').contains(&c) {
                    self.state = EscapeState::Normal;
                }
                Feedback::None
            }
            EscapeState::Osc => {
                match c {
                    '\u{07}' => self.state = EscapeState::Normal, // BEL
                    '\u{1b}' => self.state = EscapeState::OscEsc,
                    _ => {}
                }
                Feedback::None
            }
            EscapeState::OscEsc => {
                self.state = match c {
                    '\\' => EscapeState::Normal, // ST = ESC \
                    '\u{1b}' => EscapeState::OscEsc,
                    _ => EscapeState::Osc,
                };
                Feedback::None
            }
        }
    }

    fn feed_normal(&mut self, c: char) -> Feedback {
        match c {
            '\r' | '\n' | '\u{04}' => Feedback::Submit,
            '\u{03}' => Feedback::Cancel,
            '\u{08}' | '\u{7f}' => {
                if self.buffer.pop().is_some() {
                    Feedback::Erase
                } else {
                    Feedback::None
                }
            }
            '\u{1b}' => {
                self.state = EscapeState::Esc;
                Feedback::None
            }
            // C0 and C1 controls are dropped; everything else counts
            // as a password character.
            c if c.is_control() => Feedback::None,
            c => {
                self.buffer.push(c);
                Feedback::Echo
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Bounded-attempt unlock
// ---------------------------------------------------------------------------

/// Source of password attempts.
///
/// The CLI implements this over a raw-mode terminal; tests implement
/// it over a canned list.
pub trait PasswordSource {
    /// Reads one password attempt. `None` means the user cancelled.
    fn read_password(&mut self, attempt: usize) -> Result<Option<Zeroizing<String>>>;

    /// Called after a rejected attempt, for user feedback.
    fn on_rejected(&mut self, attempt: usize, remaining: usize);
}

/// Unlocks the stored WIF with at most [`MAX_UNLOCK_ATTEMPTS`] tries.
///
/// # Errors
///
/// - [`DepinError::MaxAttemptsExceeded`] once the attempts run out.
/// - [`DepinError::MalformedSecret`] immediately for a broken record
///   (retyping a password cannot fix it).
/// - [`DepinError::Message`] when the source reports cancellation.
pub fn unlock_with<S: PasswordSource>(
    encoded: &str,
    source: &mut S,
) -> Result<Zeroizing<String>> {
    for attempt in 1..=MAX_UNLOCK_ATTEMPTS {
        let Some(password) = source.read_password(attempt)? else {
            return Err(DepinError::Message {
                reason: "unlock cancelled".into(),
            });
        };
        match secret_store::decrypt(encoded, &password) {
            Ok(wif) => return Ok(wif),
            Err(DepinError::BadPassword) => {
                source.on_rejected(attempt, MAX_UNLOCK_ATTEMPTS - attempt);
            }
            Err(other) => return Err(other),
        }
    }
    Err(DepinError::MaxAttemptsExceeded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
