//! Optional settings file – reads `~/.teleop/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use teleop_hal::{ControlDeltas, SPEED_DELTA, STEERING_ANGLE_DELTA};
use teleop_middleware::CONTROL_TOPIC;
use teleop_types::TeleopError;

/// Settings for one teleop session.  Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Channel name stamped on published control events.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Interval between published control commands, in milliseconds.
    #[serde(default = "default_publish_period_ms")]
    pub publish_period_ms: u64,

    /// Speed change per `w`/`s` press.
    #[serde(default = "default_speed_delta")]
    pub speed_delta: f64,

    /// Steering angle change per `a`/`d` press.
    #[serde(default = "default_steering_angle_delta")]
    pub steering_angle_delta: f64,

    /// Buffered events per bus topic.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_channel() -> String {
    CONTROL_TOPIC.to_string()
}
fn default_publish_period_ms() -> u64 {
    100
}
fn default_speed_delta() -> f64 {
    SPEED_DELTA
}
fn default_steering_angle_delta() -> f64 {
    STEERING_ANGLE_DELTA
}
fn default_bus_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            publish_period_ms: default_publish_period_ms(),
            speed_delta: default_speed_delta(),
            steering_angle_delta: default_steering_angle_delta(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl Config {
    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms)
    }

    pub fn deltas(&self) -> ControlDeltas {
        ControlDeltas {
            speed: self.speed_delta,
            steering_angle: self.steering_angle_delta,
        }
    }

    /// Reject settings the publisher cannot run with.
    pub fn validate(&self) -> Result<(), TeleopError> {
        if self.publish_period_ms == 0 {
            return Err(TeleopError::Config("publish_period_ms must be > 0".to_string()));
        }
        if self.channel.trim().is_empty() {
            return Err(TeleopError::Config("channel must not be empty".to_string()));
        }
        if !self.speed_delta.is_finite() || !self.steering_angle_delta.is_finite() {
            return Err(TeleopError::Config("deltas must be finite".to_string()));
        }
        Ok(())
    }
}

/// Return the path to `~/.teleop/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".teleop").join("config.toml")
}

/// Load the file if present, fall back to defaults otherwise, then apply
/// `TELEOP_*` overrides and validate.
pub fn resolve() -> Result<Config, TeleopError> {
    resolve_from(&config_path())
}

pub(crate) fn resolve_from(path: &Path) -> Result<Config, TeleopError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, TeleopError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TeleopError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| TeleopError::Config(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `TELEOP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELEOP_CHANNEL` | `channel` |
/// | `TELEOP_PUBLISH_PERIOD_MS` | `publish_period_ms` |
/// | `TELEOP_SPEED_DELTA` | `speed_delta` |
/// | `TELEOP_STEERING_ANGLE_DELTA` | `steering_angle_delta` |
/// | `TELEOP_BUS_CAPACITY` | `bus_capacity` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TELEOP_CHANNEL") {
        cfg.channel = v;
    }
    if let Ok(v) = std::env::var("TELEOP_PUBLISH_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.publish_period_ms = ms;
    }
    if let Ok(v) = std::env::var("TELEOP_SPEED_DELTA")
        && let Ok(d) = v.parse::<f64>()
    {
        cfg.speed_delta = d;
    }
    if let Ok(v) = std::env::var("TELEOP_STEERING_ANGLE_DELTA")
        && let Ok(d) = v.parse::<f64>()
    {
        cfg.steering_angle_delta = d;
    }
    if let Ok(v) = std::env::var("TELEOP_BUS_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.bus_capacity = n;
    }
}
