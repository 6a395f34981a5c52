//! Blocking keyboard event sources.
//!
//! The listener thread only ever talks to the [`KeySource`] trait, so the
//! terminal backend can be swapped for a scripted one without touching the
//! accumulator.

use std::sync::mpsc;

use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use teleop_types::{Key, KeyEvent, KeyState, TeleopError};
use tracing::warn;

/// A blocking producer of discrete key events.
pub trait KeySource: Send {
    /// Block until the next key event is available.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the listener.
    fn next_event(&mut self) -> Result<KeyEvent, TeleopError>;
}

/// Reads key events from the controlling terminal via crossterm.
///
/// Expects the terminal to be in raw mode (see [`RawModeGuard`]); otherwise
/// keys arrive only after Enter.
#[derive(Debug, Default)]
pub struct TerminalKeySource;

impl TerminalKeySource {
    pub fn new() -> Self {
        Self
    }
}

impl KeySource for TerminalKeySource {
    fn next_event(&mut self) -> Result<KeyEvent, TeleopError> {
        loop {
            let ev = event::read().map_err(|e| TeleopError::InputSource(e.to_string()))?;
            if let TermEvent::Key(key) = ev {
                return Ok(map_key_event(&key));
            }
        }
    }
}

/// Translate a crossterm key event into the teleop representation.
///
/// Auto-repeat counts as a key-down. Ctrl-C becomes [`Key::Interrupt`]
/// because raw mode suppresses SIGINT.
pub fn map_key_event(key: &event::KeyEvent) -> KeyEvent {
    let state = match key.kind {
        KeyEventKind::Press | KeyEventKind::Repeat => KeyState::Down,
        KeyEventKind::Release => KeyState::Up,
    };
    let mapped = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Esc => Key::Escape,
        other => Key::Other(format!("{other:?}")),
    };
    KeyEvent { key: mapped, state }
}

/// Keeps the terminal in raw mode for as long as it is alive.
///
/// Hold it in `main`, not in the listener thread: the listener may still be
/// blocked in a read when the process exits.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> Result<Self, TeleopError> {
        terminal::enable_raw_mode().map_err(|e| TeleopError::InputSource(e.to_string()))?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

/// [`KeySource`] fed from an in-process channel.
///
/// Dropping every sender ends the stream with [`TeleopError::InputClosed`].
pub struct ChannelKeySource {
    rx: mpsc::Receiver<KeyEvent>,
}

impl ChannelKeySource {
    pub fn new(rx: mpsc::Receiver<KeyEvent>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/source pair.
    pub fn pair() -> (mpsc::Sender<KeyEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl KeySource for ChannelKeySource {
    fn next_event(&mut self) -> Result<KeyEvent, TeleopError> {
        self.rx.recv().map_err(|_| TeleopError::InputClosed)
    }
}
