//! Device properties and metadata snapshot.
//!
//! Backends capture a property store for every matching device when it is
//! enumerated ([`Properties`], keyed by the string constants below).
//! [`DeviceMeta`] is the typed, serializable view of that store suitable for
//! UI display and logging.
//!
//! # Conventions
//! - Lookups never fail: a missing key or a value of the wrong type reads as `None`.
//! - `bus` is a short, human-readable hint like `"usb"` or `"bluetooth"`.
//! - `path` is an OS path, unique per attached interface; it is the device's
//!   identity for attach/detach matching but may change across reconnects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANUFACTURER_KEY: &str = "Manufacturer";
pub const PRODUCT_KEY: &str = "Product";
pub const SERIAL_NUMBER_KEY: &str = "SerialNumber";
pub const VENDOR_ID_KEY: &str = "VendorID";
pub const PRODUCT_ID_KEY: &str = "ProductID";
pub const VERSION_NUMBER_KEY: &str = "VersionNumber";
pub const PRIMARY_USAGE_PAGE_KEY: &str = "PrimaryUsagePage";
pub const PRIMARY_USAGE_KEY: &str = "PrimaryUsage";
pub const TRANSPORT_KEY: &str = "Transport";
pub const INTERFACE_NUMBER_KEY: &str = "InterfaceNumber";

/// A single property value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<u16> for PropertyValue {
    fn from(v: u16) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

/// Property store of one device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// String property; `None` if absent or not a string.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            PropertyValue::String(s) => Some(s.clone()),
            PropertyValue::Int(_) => None,
        }
    }

    /// Integer property; `None` if absent or not an integer.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::String(_) => None,
        }
    }
}

/// Snapshot of metadata describing a single device.
///
/// All fields are optional; populate what is known on the current platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// Transport classification (e.g., `"usb"`, `"bluetooth"`).
    pub bus: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    pub manufacturer: Option<String>,

    /// Human-readable product name from the driver/firmware.
    pub product_string: Option<String>,

    pub serial_number: Option<String>,

    /// HID Usage Page of the top-level collection (`0x01` for Generic Desktop).
    pub usage_page: Option<u16>,

    /// HID Usage within the page (`0x08` for a multi-axis controller).
    pub usage: Option<u16>,

    /// OS path to the device. Format is platform-specific; treat as opaque.
    pub path: Option<String>,
}

impl DeviceMeta {
    pub fn from_properties(path: &str, props: &Properties) -> Self {
        let u16_prop = |key: &str| props.int(key).and_then(|v| u16::try_from(v).ok());
        Self {
            bus: props.string(TRANSPORT_KEY),
            vid: u16_prop(VENDOR_ID_KEY),
            pid: u16_prop(PRODUCT_ID_KEY),
            manufacturer: props.string(MANUFACTURER_KEY),
            product_string: props.string(PRODUCT_KEY),
            serial_number: props.string(SERIAL_NUMBER_KEY),
            usage_page: u16_prop(PRIMARY_USAGE_PAGE_KEY),
            usage: u16_prop(PRIMARY_USAGE_KEY),
            path: Some(path.to_string()),
        }
    }
}
