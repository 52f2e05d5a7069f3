//! Platform HID backends.
//!
//! A [`HidBackend`] is the HID subsystem underneath the manager: it matches
//! devices by usage page/usage, reports attach/detach, opens devices and hands
//! out a [`HidConnection`] per opened device. The connection *is* the input
//! registration: values are only read through it, so dropping it ends
//! delivery for that device.
//!
//! # Feature flags
//! - **`hid`** enables the `hidapi` backend ([`hid::HidapiBackend`]).
//!
//! The [`virtual_input`] backend is always available; it is scripted from
//! the outside and is what the test suite runs against.

use crate::error::Error;
use crate::metadata::{Properties, PRODUCT_KEY};
use crate::usage::MatchCriteria;
use crate::value::RawValue;
use std::fmt;
use std::time::{Duration, Instant};

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod virtual_input;

/// Native reference to one matching device interface.
///
/// Two references are equal when they name the same OS path.
#[derive(Clone, Debug)]
pub struct NativeDevice {
    path: String,
    properties: Properties,
}

impl NativeDevice {
    pub fn new(path: impl Into<String>, properties: Properties) -> Self {
        Self {
            path: path.into(),
            properties,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Property store captured at enumeration.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

impl PartialEq for NativeDevice {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for NativeDevice {}

impl fmt::Display for NativeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.properties.string(PRODUCT_KEY) {
            Some(product) => write!(f, "{product} ({})", self.path),
            None => f.write_str(&self.path),
        }
    }
}

/// Attach/detach notification from the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HotplugEvent {
    Attached(NativeDevice),
    Detached(NativeDevice),
}

/// The HID subsystem the manager runs on.
pub trait HidBackend {
    /// Restrict enumeration and notifications to devices matching `criteria`.
    fn set_device_matching(&mut self, criteria: MatchCriteria);

    /// Attach/detach notifications since the previous call, in order.
    fn poll_hotplug(&mut self) -> Result<Vec<HotplugEvent>, Error>;

    /// Open `device` and register for its input values.
    fn open_device(&mut self, device: &NativeDevice) -> Result<Box<dyn HidConnection>, Error>;

    /// Close the enumeration context. Called once, on manager teardown.
    fn close(&mut self) {}
}

/// An opened device delivering input values.
pub trait HidConnection {
    /// Append pending input values to `out` without blocking.
    ///
    /// Returns the number of values appended.
    fn read_values(&mut self, out: &mut Vec<RawValue>) -> Result<usize, Error>;

    /// Output report IDs declared by the device (LEDs). Never written.
    fn output_report_ids(&self) -> &[u8] {
        &[]
    }
}

/// Rate limit for backends that derive hotplug by re-enumerating.
#[derive(Clone, Copy, Debug)]
pub struct ScanThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ScanThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a scan should run at `now`. Records `now` when it should.
    ///
    /// The first call is always due.
    pub fn due(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}
