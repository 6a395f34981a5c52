//! `teleop-runtime` – the publishing side of the teleop process.
//!
//! # Modules
//!
//! - [`publisher`] – [`ControlPublisher`][publisher::ControlPublisher]: a
//!   Tokio interval loop that snapshots the keyboard accumulator and forwards
//!   each [`ControlCommand`][teleop_types::ControlCommand] to a
//!   [`ControlSink`][teleop_middleware::ControlSink] until the run flag clears.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod publisher;
pub mod telemetry;

pub use publisher::{ControlPublisher, DEFAULT_MODULE_NAME, DEFAULT_PERIOD};
pub use telemetry::{TracerProviderGuard, init_tracing};
