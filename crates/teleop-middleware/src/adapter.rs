//! The publisher seam.
//!
//! The teleop core never speaks to a concrete transport.  It hands each
//! [`ControlCommand`] to a [`ControlSink`]; the default [`BusSink`] forwards
//! it onto the in-process [`EventBus`] where any external bridge can pick it
//! up from [`Topic::Control`].

use async_trait::async_trait;
use std::sync::Arc;
use teleop_types::{ControlCommand, Event, EventPayload, TeleopError};
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// Channel the control command is published on by default.
pub const CONTROL_TOPIC: &str = "/apollo/control";

/// Anything that accepts control commands at the caller's cadence.
///
/// An `Err` is fatal to the publishing loop.
#[async_trait]
pub trait ControlSink: Send + Sync {
    async fn publish(&self, command: ControlCommand) -> Result<(), TeleopError>;
}

/// [`ControlSink`] that wraps each command in an [`Event`] on
/// [`Topic::Control`].
pub struct BusSink {
    bus: Arc<EventBus>,
    channel: String,
}

impl BusSink {
    pub fn new(bus: Arc<EventBus>, channel: impl Into<String>) -> Self {
        Self {
            bus,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl ControlSink for BusSink {
    async fn publish(&self, command: ControlCommand) -> Result<(), TeleopError> {
        let seq = command.header.sequence_num;
        let event = Event::new(self.channel.clone(), EventPayload::Control(command));
        let delivered = self.bus.publish_to(Topic::Control, event)?;
        debug!(channel = %self.channel, seq, delivered, "control command published");
        Ok(())
    }
}
