//! Key → control-delta dispatch.
//!
//! The mapping is fixed:
//!
//! | Key | Action | Effect |
//! |---|---|---|
//! | `w` | [`KeyAction::Forward`] | `speed += speed_delta` |
//! | `s` | [`KeyAction::Backward`] | `speed -= speed_delta` |
//! | `a` | [`KeyAction::TurnLeft`] | `steering_angle += steering_angle_delta` |
//! | `d` | [`KeyAction::TurnRight`] | `steering_angle -= steering_angle_delta` |
//!
//! Values accumulate without bound; limits belong to the downstream
//! controller.

use teleop_types::{ControlState, Key};

/// Speed change applied per `w`/`s` press.
pub const SPEED_DELTA: f64 = 0.1;
/// Steering angle change applied per `a`/`d` press.
pub const STEERING_ANGLE_DELTA: f64 = 1.0;

/// Step sizes applied by each [`KeyAction`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlDeltas {
    pub speed: f64,
    pub steering_angle: f64,
}

impl Default for ControlDeltas {
    fn default() -> Self {
        Self {
            speed: SPEED_DELTA,
            steering_angle: STEERING_ANGLE_DELTA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
}

impl KeyAction {
    /// Look up the action bound to `key`, if any.
    pub fn for_key(key: &Key) -> Option<Self> {
        match key {
            Key::Char('w') => Some(KeyAction::Forward),
            Key::Char('s') => Some(KeyAction::Backward),
            Key::Char('a') => Some(KeyAction::TurnLeft),
            Key::Char('d') => Some(KeyAction::TurnRight),
            _ => None,
        }
    }

    /// Return `state` with this action's delta applied.
    pub fn apply(self, state: ControlState, deltas: &ControlDeltas) -> ControlState {
        let ControlState {
            speed,
            steering_angle,
        } = state;
        match self {
            KeyAction::Forward => ControlState::new(speed + deltas.speed, steering_angle),
            KeyAction::Backward => ControlState::new(speed - deltas.speed, steering_angle),
            KeyAction::TurnLeft => {
                ControlState::new(speed, steering_angle + deltas.steering_angle)
            }
            KeyAction::TurnRight => {
                ControlState::new(speed, steering_angle - deltas.steering_angle)
            }
        }
    }

    /// Short label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            KeyAction::Forward => "forward",
            KeyAction::Backward => "backward",
            KeyAction::TurnLeft => "turn_left",
            KeyAction::TurnRight => "turn_right",
        }
    }
}
