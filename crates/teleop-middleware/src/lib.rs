//! `teleop-middleware` – message plumbing between the teleop core and the
//! outside world.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`adapter`] – the [`ControlSink`] seam the publisher loop writes to, and
//!   the bus-backed [`BusSink`].

pub mod adapter;
pub mod bus;

pub use adapter::{BusSink, CONTROL_TOPIC, ControlSink};
pub use bus::{EventBus, Topic, TopicReceiver};
