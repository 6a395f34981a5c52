//! `teleop-hal` – keyboard input for the teleop stack.
//!
//! # Modules
//!
//! - [`keyboard`] – the blocking [`KeySource`] trait, a crossterm-backed
//!   terminal source, a channel-fed source, and [`RawModeGuard`].
//! - [`keymap`] – the fixed `w`/`s`/`a`/`d` → [`KeyAction`] table and the
//!   per-press [`ControlDeltas`].
//! - [`accumulator`] – [`InputStateAccumulator`], the lock-guarded control
//!   state folded from key events on a background listener thread.

pub mod accumulator;
pub mod keyboard;
pub mod keymap;

pub use accumulator::{Flow, InputStateAccumulator, LISTENER_THREAD_NAME};
pub use keyboard::{ChannelKeySource, KeySource, RawModeGuard, TerminalKeySource};
pub use keymap::{ControlDeltas, KeyAction, SPEED_DELTA, STEERING_ANGLE_DELTA};
