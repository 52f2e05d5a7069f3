//! `hidapi` backend.
//!
//! hidapi has no hotplug callback, so attach/detach is derived by
//! re-enumerating from [`poll_hotplug`](HidBackend::poll_hotplug) and diffing
//! the matching interfaces by path. Enumeration runs at most once per
//! `hotplug_interval_ms`; polls in between report nothing. Input is read non-blocking and
//! decoded with the device's own report descriptor.

use crate::backends::{HidBackend, HidConnection, HotplugEvent, NativeDevice, ScanThrottle};
use crate::config::Config;
use crate::descriptor;
use crate::error::Error;
use crate::metadata::*;
use crate::usage::MatchCriteria;
use crate::value::{Calibration, RawValue, ReportDecoder};
use hidapi::{BusType, DeviceInfo, HidApi, HidDevice};
use std::ffi::CString;
use std::time::Instant;
use tracing::debug;

/// Upper bound for a report descriptor (HID_MAX_DESCRIPTOR_SIZE on Linux).
const MAX_DESCRIPTOR_LEN: usize = 4096;

pub struct HidapiBackend {
    api: HidApi,
    criteria: Option<MatchCriteria>,
    known: Vec<NativeDevice>,
    throttle: ScanThrottle,
    calibration: Calibration,
    max_reports_per_tick: usize,
}

impl HidapiBackend {
    /// Create the hidapi context. Nothing is enumerated until the first poll.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let api = HidApi::new_without_enumerate()?;
        Ok(Self {
            api,
            criteria: None,
            known: Vec::new(),
            throttle: ScanThrottle::new(config.hotplug_interval()),
            calibration: config.calibration,
            max_reports_per_tick: config.max_reports_per_tick.max(1),
        })
    }
}

impl HidBackend for HidapiBackend {
    fn set_device_matching(&mut self, criteria: MatchCriteria) {
        self.criteria = Some(criteria);
    }

    fn poll_hotplug(&mut self) -> Result<Vec<HotplugEvent>, Error> {
        let Some(criteria) = self.criteria else {
            return Ok(Vec::new());
        };
        if !self.throttle.due(Instant::now()) {
            return Ok(Vec::new());
        }
        self.api.reset_devices()?;
        self.api.add_devices(0, 0)?;

        let present: Vec<NativeDevice> = self
            .api
            .device_list()
            .filter(|info| criteria.matches(info.usage_page(), info.usage()))
            .map(native_device)
            .collect();

        let mut events = Vec::new();
        for gone in self.known.iter().filter(|d| !present.contains(d)) {
            events.push(HotplugEvent::Detached(gone.clone()));
        }
        for new in present.iter().filter(|d| !self.known.contains(d)) {
            events.push(HotplugEvent::Attached(new.clone()));
        }
        self.known = present;
        Ok(events)
    }

    fn open_device(&mut self, device: &NativeDevice) -> Result<Box<dyn HidConnection>, Error> {
        let open_err = |reason: String| Error::Open {
            path: device.path().to_string(),
            reason,
        };
        let path = CString::new(device.path()).map_err(|e| open_err(e.to_string()))?;
        let raw = self
            .api
            .open_path(&path)
            .map_err(|e| open_err(e.to_string()))?;
        // Reads are drained from the host loop.
        raw.set_blocking_mode(false)?;

        let mut buf = vec![0u8; MAX_DESCRIPTOR_LEN];
        let len = raw.get_report_descriptor(&mut buf)?;
        let parsed = descriptor::parse(&buf[..len])?;
        debug!(
            "{}: {} input element(s), report ids {}",
            device,
            parsed.elements.len(),
            if parsed.uses_report_ids { "on" } else { "off" }
        );

        let read_len = parsed.max_input_report_len().max(1);
        Ok(Box::new(HidapiConnection {
            path: device.path().to_string(),
            raw,
            buf: vec![0u8; read_len],
            output_ids: parsed.output_report_ids.clone(),
            decoder: ReportDecoder::new(parsed, self.calibration),
            max_reports_per_tick: self.max_reports_per_tick,
        }))
    }

    fn close(&mut self) {
        self.known.clear();
    }
}

struct HidapiConnection {
    #[cfg_attr(not(feature = "debug-log"), allow(dead_code))]
    path: String,
    raw: HidDevice,
    buf: Vec<u8>,
    output_ids: Vec<u8>,
    decoder: ReportDecoder,
    max_reports_per_tick: usize,
}

impl HidConnection for HidapiConnection {
    fn read_values(&mut self, out: &mut Vec<RawValue>) -> Result<usize, Error> {
        let mut emitted = 0;
        for _ in 0..self.max_reports_per_tick {
            let n = self.raw.read(&mut self.buf)?;
            if n == 0 {
                break;
            }
            let report = &self.buf[..n];
            #[cfg(feature = "debug-log")]
            tracing::trace!("{}: report {:02x?}", self.path, report);
            emitted += self.decoder.decode(report, out);
        }
        Ok(emitted)
    }

    fn output_report_ids(&self) -> &[u8] {
        &self.output_ids
    }
}

/// Capture the property store of a hidapi device entry.
fn native_device(info: &DeviceInfo) -> NativeDevice {
    let mut props = Properties::new()
        .with(VENDOR_ID_KEY, info.vendor_id())
        .with(PRODUCT_ID_KEY, info.product_id())
        .with(VERSION_NUMBER_KEY, info.release_number())
        .with(PRIMARY_USAGE_PAGE_KEY, info.usage_page())
        .with(PRIMARY_USAGE_KEY, info.usage())
        .with(INTERFACE_NUMBER_KEY, info.interface_number())
        .with(TRANSPORT_KEY, bus_name(info.bus_type()));
    if let Some(s) = info.manufacturer_string() {
        props.insert(MANUFACTURER_KEY, s);
    }
    if let Some(s) = info.product_string() {
        props.insert(PRODUCT_KEY, s);
    }
    if let Some(s) = info.serial_number() {
        props.insert(SERIAL_NUMBER_KEY, s);
    }
    NativeDevice::new(info.path().to_string_lossy().into_owned(), props)
}

fn bus_name(bus: BusType) -> &'static str {
    match bus {
        BusType::Usb => "usb",
        BusType::Bluetooth => "bluetooth",
        BusType::I2c => "i2c",
        BusType::Spi => "spi",
        _ => "unknown",
    }
}
