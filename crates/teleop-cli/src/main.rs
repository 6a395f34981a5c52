//! `teleop-cli` – keyboard teleoperation entry point.
//!
//! This binary:
//!
//! 1. Loads `~/.teleop/config.toml` (optional) plus `TELEOP_*` overrides.
//! 2. Puts the terminal in raw mode and starts the keyboard listener thread.
//! 3. Publishes the accumulated `(speed, steering_angle)` on the control
//!    channel every publish period until Esc or Ctrl-C.
//! 4. Intercepts SIGINT/SIGTERM to stop the accumulator and announce the
//!    shutdown on the event bus.

mod config;

use colored::Colorize;
use futures_util::StreamExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use teleop_hal::{InputStateAccumulator, RawModeGuard, TerminalKeySource};
use teleop_middleware::{BusSink, ControlSink, EventBus, Topic, TopicReceiver};
use teleop_runtime::{ControlPublisher, DEFAULT_MODULE_NAME, init_tracing};
use teleop_types::{Event, EventPayload, TeleopError};

fn main() -> ExitCode {
    // Logs go to stderr; RUST_LOG and TELEOP_LOG_FORMAT=json apply.
    let _tracing = init_tracing("teleop");

    let cfg = match config::resolve() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, path = %config::config_path().display(), "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    print_banner(&cfg);

    match run(cfg) {
        Ok(published) => {
            info!(published, "Program exited.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "teleop terminated");
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: config::Config) -> Result<u64, TeleopError> {
    let bus = Arc::new(EventBus::new(cfg.bus_capacity));
    let accumulator = Arc::new(InputStateAccumulator::new(cfg.deltas()));

    // ── Signal handler ────────────────────────────────────────────────────
    // Raw mode swallows the terminal's Ctrl-C (the listener sees it as a key
    // instead), so this only fires for signals sent from outside.
    {
        let accumulator = Arc::clone(&accumulator);
        let bus = Arc::clone(&bus);
        if let Err(e) = ctrlc::set_handler(move || {
            warn!("termination signal received, stopping teleop");
            accumulator.stop();
            let event = Event::new(
                "teleop-cli",
                EventPayload::Shutdown {
                    reason: "operator interrupt".to_string(),
                },
            );
            let _ = bus.publish_to(Topic::SystemAlerts, event);
        }) {
            warn!(error = %e, "failed to install signal handler; use Esc to exit");
        }
    }

    let sink: Arc<dyn ControlSink> = Arc::new(BusSink::new(Arc::clone(&bus), cfg.channel.clone()));
    let publisher = ControlPublisher::new(
        Arc::clone(&accumulator),
        sink,
        cfg.publish_period(),
        DEFAULT_MODULE_NAME,
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| TeleopError::Publish(format!("failed to build tokio runtime: {e}")))?;

    let raw_mode = RawModeGuard::enable()?;
    let listener = accumulator.start(TerminalKeySource::new())?;

    let monitor_rx = bus.subscribe_to(Topic::Control);
    let published = runtime.block_on(async {
        let monitor = tokio::spawn(monitor_control(monitor_rx));
        let result = publisher.run().await;
        monitor.abort();
        result
    });
    drop(raw_mode);

    if published.is_err() {
        accumulator.stop();
    }

    // A listener still parked in a read exited cleanly by flag; only a
    // finished one can carry an error.
    if listener.is_finished() {
        match listener.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(TeleopError::InputSource("keyboard listener panicked".to_string()));
            }
        }
    }

    published
}

/// Log every command that reaches the bus.
async fn monitor_control(rx: TopicReceiver) {
    let mut stream = rx.into_stream();
    while let Some(event) = stream.next().await {
        if let EventPayload::Control(cmd) = event.payload {
            debug!(
                channel = %event.source,
                seq = cmd.header.sequence_num,
                speed = cmd.speed,
                steering_angle = cmd.steering_angle,
                "control frame on bus"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(cfg: &config::Config) {
    println!();
    println!(
        "  {} {}",
        "Keyboard Teleop".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!(
        "  Publishing on {} every {} ms",
        cfg.channel.bold(),
        cfg.publish_period_ms
    );
    println!();
    println!(
        "    {} / {}  speed ±{}",
        "w".bold(),
        "s".bold(),
        cfg.speed_delta
    );
    println!(
        "    {} / {}  steering ±{}",
        "a".bold(),
        "d".bold(),
        cfg.steering_angle_delta
    );
    println!("    {}    exit", "Esc".bold().yellow());
    println!();
}
