//! In-memory backend driven from the outside.
//!
//! [`VirtualBackend`] plays the HID subsystem; the paired [`VirtualHub`]
//! scripts it: attach and detach devices, queue raw reports (decoded with the
//! device's report descriptor) or ready-made values, and make opens fail.
//!
//! ```
//! use multiaxis::backends::virtual_input::{VirtualBackend, VirtualDevice};
//! use multiaxis::usage::GenericDesktopUsage;
//! use multiaxis::MultiAxisDevice;
//!
//! let (backend, hub) = VirtualBackend::new();
//! let mut mouse = MultiAxisDevice::new(backend);
//! let dev = hub.attach(VirtualDevice::space_mouse("virtual:0"));
//! hub.set_axis(&dev, GenericDesktopUsage::RotationZ, 12.5);
//! mouse.poll();
//! assert_eq!(mouse.state().yaw, 12.5);
//! ```

use crate::backends::{HidBackend, HidConnection, HotplugEvent, NativeDevice};
use crate::descriptor::{self, Element, ElementKind, SPACE_MOUSE_COMPACT};
use crate::error::Error;
use crate::metadata::*;
use crate::usage::{GenericDesktopUsage, MatchCriteria, UsagePage, MULTI_AXIS_CONTROLLER};
use crate::value::{Calibration, RawValue, ReportDecoder};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Description of a device to attach to a [`VirtualHub`].
#[derive(Clone, Debug)]
pub struct VirtualDevice {
    path: String,
    properties: Properties,
    descriptor: Option<Vec<u8>>,
    open_error: Option<String>,
}

impl VirtualDevice {
    /// A bare multi-axis controller with a product name and no report descriptor.
    pub fn new(path: &str, product: &str) -> Self {
        Self {
            path: path.to_string(),
            properties: Properties::new()
                .with(PRODUCT_KEY, product)
                .with(PRIMARY_USAGE_PAGE_KEY, UsagePage::GENERIC_DESKTOP)
                .with(PRIMARY_USAGE_KEY, MULTI_AXIS_CONTROLLER)
                .with(TRANSPORT_KEY, "virtual"),
            descriptor: None,
            open_error: None,
        }
    }

    /// A SpaceMouse Compact, descriptor included.
    pub fn space_mouse(path: &str) -> Self {
        Self::new(path, "SpaceMouse Compact")
            .with_property(MANUFACTURER_KEY, "3Dconnexion")
            .with_property(VENDOR_ID_KEY, 0x256f)
            .with_property(PRODUCT_ID_KEY, 0xc635)
            .with_descriptor(SPACE_MOUSE_COMPACT)
    }

    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn with_descriptor(mut self, bytes: &[u8]) -> Self {
        self.descriptor = Some(bytes.to_vec());
        self
    }

    /// Make every open of this device fail with `reason`.
    pub fn failing_open(mut self, reason: &str) -> Self {
        self.open_error = Some(reason.to_string());
        self
    }

    pub fn native(&self) -> NativeDevice {
        NativeDevice::new(self.path.clone(), self.properties.clone())
    }
}

enum Input {
    Report(Vec<u8>),
    Value(RawValue),
}

struct Slot {
    device: VirtualDevice,
    queue: VecDeque<Input>,
}

#[derive(Default)]
struct Hub {
    pending: VecDeque<HotplugEvent>,
    slots: HashMap<String, Slot>,
    open_connections: HashMap<String, usize>,
    scan_error: Option<String>,
    closed: bool,
}

/// The HID subsystem side, handed to the manager.
pub struct VirtualBackend {
    hub: Arc<Mutex<Hub>>,
    criteria: Option<MatchCriteria>,
    calibration: Calibration,
}

/// The scripting side.
#[derive(Clone)]
pub struct VirtualHub {
    hub: Arc<Mutex<Hub>>,
}

impl VirtualBackend {
    pub fn new() -> (Self, VirtualHub) {
        Self::with_calibration(Calibration::default())
    }

    /// Calibration applied when decoding queued raw reports.
    pub fn with_calibration(calibration: Calibration) -> (Self, VirtualHub) {
        let hub = Arc::new(Mutex::new(Hub::default()));
        let backend = Self {
            hub: Arc::clone(&hub),
            criteria: None,
            calibration,
        };
        (backend, VirtualHub { hub })
    }

    fn matches(&self, device: &NativeDevice) -> bool {
        let Some(criteria) = self.criteria else {
            return true;
        };
        let props = device.properties();
        let page = props.int(PRIMARY_USAGE_PAGE_KEY).unwrap_or(-1);
        let usage = props.int(PRIMARY_USAGE_KEY).unwrap_or(-1);
        i64::from(criteria.usage_page) == page && i64::from(criteria.usage) == usage
    }
}

impl HidBackend for VirtualBackend {
    fn set_device_matching(&mut self, criteria: MatchCriteria) {
        self.criteria = Some(criteria);
    }

    fn poll_hotplug(&mut self) -> Result<Vec<HotplugEvent>, Error> {
        let drained: Vec<HotplugEvent> = {
            let mut hub = self.hub.lock();
            if let Some(reason) = hub.scan_error.take() {
                return Err(Error::Io(std::io::Error::other(reason)));
            }
            hub.pending.drain(..).collect()
        };
        Ok(drained
            .into_iter()
            .filter(|event| match event {
                HotplugEvent::Attached(d) | HotplugEvent::Detached(d) => self.matches(d),
            })
            .collect())
    }

    fn open_device(&mut self, device: &NativeDevice) -> Result<Box<dyn HidConnection>, Error> {
        let mut hub = self.hub.lock();
        let open_err = |reason: &str| Error::Open {
            path: device.path().to_string(),
            reason: reason.to_string(),
        };
        let slot = hub
            .slots
            .get(device.path())
            .ok_or_else(|| open_err("no such device"))?;
        if let Some(reason) = &slot.device.open_error {
            return Err(open_err(reason));
        }
        let decoder = match &slot.device.descriptor {
            Some(bytes) => Some(ReportDecoder::new(
                descriptor::parse(bytes)?,
                self.calibration,
            )),
            None => None,
        };
        *hub.open_connections
            .entry(device.path().to_string())
            .or_insert(0) += 1;

        Ok(Box::new(VirtualConnection {
            hub: Arc::clone(&self.hub),
            path: device.path().to_string(),
            output_ids: decoder
                .as_ref()
                .map(|d| d.descriptor().output_report_ids.clone())
                .unwrap_or_default(),
            decoder,
        }))
    }

    fn close(&mut self) {
        self.hub.lock().closed = true;
    }
}

struct VirtualConnection {
    hub: Arc<Mutex<Hub>>,
    path: String,
    decoder: Option<ReportDecoder>,
    output_ids: Vec<u8>,
}

impl HidConnection for VirtualConnection {
    fn read_values(&mut self, out: &mut Vec<RawValue>) -> Result<usize, Error> {
        let inputs: Vec<Input> = match self.hub.lock().slots.get_mut(&self.path) {
            Some(slot) => slot.queue.drain(..).collect(),
            None => return Ok(0),
        };
        let mut emitted = 0;
        for input in inputs {
            match input {
                Input::Value(value) => {
                    out.push(value);
                    emitted += 1;
                }
                Input::Report(bytes) => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        emitted += decoder.decode(&bytes, out);
                    }
                }
            }
        }
        Ok(emitted)
    }

    fn output_report_ids(&self) -> &[u8] {
        &self.output_ids
    }
}

impl Drop for VirtualConnection {
    fn drop(&mut self) {
        if let Some(count) = self.hub.lock().open_connections.get_mut(&self.path) {
            *count = count.saturating_sub(1);
        }
    }
}

impl VirtualHub {
    /// Plug a device in and queue its attach notification.
    ///
    /// Attaching a path that is already present queues a second notification.
    pub fn attach(&self, device: VirtualDevice) -> NativeDevice {
        let native = device.native();
        let mut hub = self.hub.lock();
        hub.pending.push_back(HotplugEvent::Attached(native.clone()));
        hub.slots.insert(
            native.path().to_string(),
            Slot {
                device,
                queue: VecDeque::new(),
            },
        );
        native
    }

    /// Unplug a device and queue its detach notification. Queued input is lost.
    pub fn detach(&self, device: &NativeDevice) {
        let mut hub = self.hub.lock();
        hub.slots.remove(device.path());
        hub.pending.push_back(HotplugEvent::Detached(device.clone()));
    }

    /// Queue a raw input report (ID byte included when the descriptor uses IDs).
    pub fn send_report(&self, device: &NativeDevice, report: &[u8]) -> bool {
        self.push(device, Input::Report(report.to_vec()))
    }

    /// Queue a decoded value as-is.
    pub fn inject(&self, device: &NativeDevice, value: RawValue) -> bool {
        self.push(device, Input::Value(value))
    }

    /// Queue a value for `(usage_page, usage)` with a given calibrated reading.
    pub fn set_value(
        &self,
        device: &NativeDevice,
        usage_page: u16,
        usage: u16,
        calibrated: f64,
    ) -> bool {
        let value = RawValue::with_calibrated(
            element(usage_page, usage),
            calibrated.round() as i32,
            calibrated,
        );
        self.inject(device, value)
    }

    pub fn set_axis(
        &self,
        device: &NativeDevice,
        axis: GenericDesktopUsage,
        calibrated: f64,
    ) -> bool {
        self.set_value(device, UsagePage::GENERIC_DESKTOP, axis.code(), calibrated)
    }

    pub fn press_button(&self, device: &NativeDevice, button: u16) -> bool {
        self.set_value(device, UsagePage::BUTTON, button, 1.0)
    }

    pub fn release_button(&self, device: &NativeDevice, button: u16) -> bool {
        self.set_value(device, UsagePage::BUTTON, button, 0.0)
    }

    /// Make the next hotplug scan fail with `reason`. Pending notifications
    /// are kept for the scan after it.
    pub fn fail_next_scan(&self, reason: &str) {
        self.hub.lock().scan_error = Some(reason.to_string());
    }

    /// Connections currently open on `path`.
    pub fn open_connections(&self, path: &str) -> usize {
        self.hub.lock().open_connections.get(path).copied().unwrap_or(0)
    }

    /// Whether the backend's enumeration context has been closed.
    pub fn is_closed(&self) -> bool {
        self.hub.lock().closed
    }

    fn push(&self, device: &NativeDevice, input: Input) -> bool {
        match self.hub.lock().slots.get_mut(device.path()) {
            Some(slot) => {
                slot.queue.push_back(input);
                true
            }
            None => false,
        }
    }
}

/// A stand-alone element for injected values.
///
/// Axes get the SpaceMouse's ±350 logical range; everything else is a 1-bit field.
pub fn element(usage_page: u16, usage: u16) -> Element {
    let axis = usage_page == UsagePage::GENERIC_DESKTOP && (0x30..=0x38).contains(&usage);
    let (bits, lo, hi) = if axis { (16, -350, 350) } else { (1, 0, 1) };
    Element {
        report_id: 0,
        bit_offset: 0,
        bit_size: bits,
        usage_page,
        usage,
        logical_min: lo,
        logical_max: hi,
        physical_min: 0,
        physical_max: 0,
        unit_exponent: 0,
        unit: 0,
        relative: axis,
        kind: match UsagePage::from(usage_page) {
            UsagePage::Button => ElementKind::Button,
            _ if axis => ElementKind::Axis,
            _ => ElementKind::Misc,
        },
    }
}
