//! Runtime configuration.
//!
//! Every field has a default, so an empty file (or none at all) is valid:
//!
//! ```toml
//! poll_interval_ms = 4
//! hotplug_interval_ms = 500
//! max_reports_per_tick = 32
//! mode = "camera"
//!
//! [calibration]
//! min = -1.0
//! max = 1.0
//! dead_zone = 0
//! ```
//!
//! The device match criteria are fixed and cannot be configured.

use crate::error::Error;
use crate::motion::Mode;
use crate::value::Calibration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sleep between event-loop turns in [`run`](crate::MultiAxisDevice::run).
    pub poll_interval_ms: u64,

    /// Minimum time between device re-enumerations on backends without a
    /// hotplug callback.
    pub hotplug_interval_ms: u64,

    /// Upper bound on reports drained from one device per turn.
    pub max_reports_per_tick: usize,

    /// Initial operating mode.
    pub mode: Mode,

    pub calibration: Calibration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4,
            hotplug_interval_ms: 500,
            max_reports_per_tick: 32,
            mode: Mode::default(),
            calibration: Calibration::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn hotplug_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug_interval_ms)
    }
}
