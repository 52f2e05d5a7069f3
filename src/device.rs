//! One attached HID device.
//!
//! [`HidDevice`] owns the backend connection of a single multi-axis
//! controller. The connection doubles as its input registration, so the
//! device is the only place values for that controller enter the crate, and
//! closing the device ends delivery.
//!
//! Opening is best-effort: a device the OS refuses to open (missing
//! permission, exclusive access held elsewhere) is still constructed and
//! tracked. It answers property queries and reports
//! [`DeviceStatus::OpenFailed`], but never produces input.

use crate::backends::{HidBackend, HidConnection, NativeDevice};
use crate::error::Error;
use crate::metadata::{DeviceMeta, MANUFACTURER_KEY, PRODUCT_KEY};
use crate::value::RawValue;
use std::cell::OnceCell;
use std::fmt;
use tracing::{debug, trace, warn};

/// Receives every value an open device produces.
pub trait DeviceDelegate {
    fn value_received(&mut self, device: &HidDevice, value: &RawValue);
}

/// Health of a tracked device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    Open,
    OpenFailed { reason: String },
    Closed,
}

pub struct HidDevice {
    native: NativeDevice,
    connection: Option<Box<dyn HidConnection>>,
    status: DeviceStatus,
    manufacturer: OnceCell<Option<String>>,
    product: OnceCell<Option<String>>,
    scratch: Vec<RawValue>,
}

impl HidDevice {
    /// Open `native` through `backend`. Never fails; see the module docs.
    pub fn open(backend: &mut dyn HidBackend, native: NativeDevice) -> Self {
        let (connection, status) = match backend.open_device(&native) {
            Ok(connection) => (Some(connection), DeviceStatus::Open),
            Err(e) => {
                warn!("Error opening HID device: {}", e);
                let reason = match e {
                    Error::Open { reason, .. } => reason,
                    other => other.to_string(),
                };
                (None, DeviceStatus::OpenFailed { reason })
            }
        };

        let device = Self {
            native,
            connection,
            status,
            manufacturer: OnceCell::new(),
            product: OnceCell::new(),
            scratch: Vec::new(),
        };
        if let Some(product) = device.product() {
            debug!("Product: {}", product);
        }
        device
    }

    pub fn native(&self) -> &NativeDevice {
        &self.native
    }

    pub fn path(&self) -> &str {
        self.native.path()
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Manufacturer string, looked up once and cached.
    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer
            .get_or_init(|| self.get_string(MANUFACTURER_KEY))
            .as_deref()
    }

    /// Product string, looked up once and cached.
    pub fn product(&self) -> Option<&str> {
        self.product
            .get_or_init(|| self.get_string(PRODUCT_KEY))
            .as_deref()
    }

    /// String property by key; `None` if missing or not a string.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.native.properties().string(key)
    }

    /// Integer property by key; `None` if missing or not an integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.native.properties().int(key)
    }

    pub fn metadata(&self) -> DeviceMeta {
        DeviceMeta::from_properties(self.path(), self.native.properties())
    }

    /// Output report IDs the device declares (its LED). Nothing is ever sent.
    pub fn output_report_ids(&self) -> &[u8] {
        self.connection
            .as_ref()
            .map(|c| c.output_report_ids())
            .unwrap_or(&[])
    }

    /// Drain pending input and hand each value to `delegate`, in device order.
    ///
    /// Read errors are logged and end this turn for the device; a device
    /// that has gone away is removed by its detach notification.
    pub fn service(&mut self, delegate: &mut dyn DeviceDelegate) -> usize {
        let Some(connection) = self.connection.as_mut() else {
            return 0;
        };
        let mut values = std::mem::take(&mut self.scratch);
        if let Err(e) = connection.read_values(&mut values) {
            warn!("{}: read failed: {}", self.native, e);
        }

        let count = values.len();
        for value in values.drain(..) {
            trace!(
                "{}: page 0x{:02x} usage 0x{:02x} value {}",
                self.native,
                value.usage_page(),
                value.usage(),
                value.integer_value()
            );
            delegate.value_received(self, &value);
        }
        self.scratch = values;
        count
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!("closed {}", self.native);
        }
        self.status = DeviceStatus::Closed;
    }
}

impl Drop for HidDevice {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for HidDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.native, f)
    }
}

impl fmt::Debug for HidDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HidDevice")
            .field("path", &self.path())
            .field("status", &self.status)
            .finish()
    }
}
