//! [`ControlPublisher`] – the fixed-cadence poller.
//!
//! Every `period` it snapshots the [`InputStateAccumulator`], stamps the
//! result into a [`ControlCommand`], and hands it to a [`ControlSink`].  The
//! loop ends on the first tick after the accumulator's run flag clears.

use std::sync::Arc;
use std::time::Duration;

use teleop_hal::InputStateAccumulator;
use teleop_middleware::ControlSink;
use teleop_types::{ControlCommand, TeleopError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Default publish period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Default `module_name` stamped into each command header.
pub const DEFAULT_MODULE_NAME: &str = "teleop";

pub struct ControlPublisher {
    accumulator: Arc<InputStateAccumulator>,
    sink: Arc<dyn ControlSink>,
    period: Duration,
    module_name: String,
}

impl ControlPublisher {
    /// # Errors
    ///
    /// Returns [`TeleopError::Config`] for a zero `period`.
    pub fn new(
        accumulator: Arc<InputStateAccumulator>,
        sink: Arc<dyn ControlSink>,
        period: Duration,
        module_name: impl Into<String>,
    ) -> Result<Self, TeleopError> {
        if period.is_zero() {
            return Err(TeleopError::Config("publish period must be non-zero".to_string()));
        }
        Ok(Self {
            accumulator,
            sink,
            period,
            module_name: module_name.into(),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Publish until the run flag clears.
    ///
    /// The first command goes out one `period` after the call.  Returns the
    /// number of commands published.
    ///
    /// # Errors
    ///
    /// The first sink error ends the loop and is returned unchanged.
    pub async fn run(&self) -> Result<u64, TeleopError> {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sequence_num = 0u64;
        info!(period_ms = self.period.as_millis() as u64, "control publisher started");
        loop {
            ticker.tick().await;
            if !self.accumulator.is_running() {
                break;
            }
            let state = self.accumulator.snapshot();
            sequence_num += 1;
            let command = ControlCommand::from_state(state, &self.module_name, sequence_num);
            debug!(
                seq = sequence_num,
                speed = state.speed,
                steering_angle = state.steering_angle,
                "publishing control command"
            );
            if let Err(e) = self.sink.publish(command).await {
                error!(error = %e, seq = sequence_num, "control sink failed");
                return Err(e);
            }
        }
        info!(published = sequence_num, "control publisher stopped");
        Ok(sequence_num)
    }
}
