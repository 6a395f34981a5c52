use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Commanded vehicle control: the pair the keyboard accumulates and the
/// publisher forwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub speed: f64,
    pub steering_angle: f64,
}

impl ControlState {
    pub fn new(speed: f64, steering_angle: f64) -> Self {
        Self {
            speed,
            steering_angle,
        }
    }
}

/// Symbolic key identity as seen by the teleop core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// A printable character, exactly as typed (no case folding).
    Char(char),
    Escape,
    /// Ctrl-C delivered as a key press while the terminal is in raw mode.
    Interrupt,
    /// Anything else the input backend reports, kept for logging.
    Other(String),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Escape => write!(f, "esc"),
            Key::Interrupt => write!(f, "ctrl+c"),
            Key::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    Down,
    Up,
}

/// A discrete keyboard event produced by a blocking input source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn down(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Down,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Up,
        }
    }

    /// Shorthand for a key-down of a character key.
    pub fn press(c: char) -> Self {
        Self::down(Key::Char(c))
    }

    pub fn is_down(&self) -> bool {
        self.state == KeyState::Down
    }
}

/// Message header carried by every published [`ControlCommand`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Name of the publishing module, e.g. `"teleop"`.
    pub module_name: String,
    /// Monotonic per-publisher counter, starting at 1.
    pub sequence_num: u64,
}

/// The control message handed to the external publisher at a fixed cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlCommand {
    pub header: Header,
    pub speed: f64,
    pub steering_angle: f64,
}

impl ControlCommand {
    /// Stamp `state` with a fresh header.
    pub fn from_state(state: ControlState, module_name: &str, sequence_num: u64) -> Self {
        Self {
            header: Header {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                module_name: module_name.to_string(),
                sequence_num,
            },
            speed: state.speed,
            steering_angle: state.steering_angle,
        }
    }

    pub fn state(&self) -> ControlState {
        ControlState::new(self.speed, self.steering_angle)
    }
}

/// Unified event wrapper for the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Channel or component the event originated from, e.g. `"/apollo/control"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Control(ControlCommand),
    /// The operator asked the process to stop.
    Shutdown { reason: String },
}

/// Error type shared by the input, bus, and publishing layers.
///
/// Every variant except [`TeleopError::Config`] is fatal at runtime: the
/// caller propagates it to `main` and the process exits.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum TeleopError {
    #[error("Input Source Error: {0}")]
    InputSource(String),

    #[error("Input Source Closed")]
    InputClosed,

    #[error("Bus Channel Error: {0}")]
    Channel(String),

    #[error("Publish Error: {0}")]
    Publish(String),

    #[error("Config Error: {0}")]
    Config(String),
}
