//! HID value decoding.
//!
//! A [`RawValue`] is one element reading taken from one input report. It is
//! produced by a [`ReportDecoder`] (or injected by a virtual backend), handed
//! once through the delegate chain and then dropped.
//!
//! ## Scale types
//! - **Calibrated**: the logical range mapped linearly onto a [`Calibration`]
//!   range (default `[-1.0, 1.0]`), saturating at the ends, with an optional
//!   dead zone around the logical center.
//! - **Physical**: the logical range mapped onto the element's physical extents.
//! - **Exponent**: the physical value scaled by `10^unit_exponent`.

use crate::descriptor::{Element, ReportDescriptor};
use crate::usage::UsagePage;
use serde::{Deserialize, Serialize};

/// How to interpret an element's integer value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScaleType {
    Calibrated,
    Physical,
    Exponent,
}

/// Target range for calibrated values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub min: f64,
    pub max: f64,
    /// Half-width of the dead zone around the logical center, in logical units.
    pub dead_zone: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
            dead_zone: 0,
        }
    }
}

impl Calibration {
    /// Map `integer` from the element's logical range onto this range.
    pub fn apply(&self, element: &Element, integer: i32) -> f64 {
        let (lo, hi) = (element.logical_min, element.logical_max);
        let center = (self.min + self.max) / 2.0;
        if hi <= lo {
            return center;
        }
        let v = integer.clamp(lo, hi);
        if self.dead_zone > 0 {
            let logical_center = (f64::from(lo) + f64::from(hi)) / 2.0;
            if (f64::from(v) - logical_center).abs() <= f64::from(self.dead_zone) {
                return center;
            }
        }
        let t = (f64::from(v) - f64::from(lo)) / (f64::from(hi) - f64::from(lo));
        self.min + t * (self.max - self.min)
    }
}

/// One decoded element reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawValue {
    element: Element,
    integer: i32,
    calibrated: f64,
}

impl RawValue {
    /// Build a value, computing the calibrated reading from `calibration`.
    pub fn new(element: Element, integer: i32, calibration: &Calibration) -> Self {
        Self {
            element,
            integer,
            calibrated: calibration.apply(&element, integer),
        }
    }

    /// Build a value whose calibrated reading is already known.
    pub fn with_calibrated(element: Element, integer: i32, calibrated: f64) -> Self {
        Self {
            element,
            integer,
            calibrated,
        }
    }

    #[inline]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[inline]
    pub fn usage_page(&self) -> u16 {
        self.element.usage_page
    }

    #[inline]
    pub fn usage(&self) -> u16 {
        self.element.usage
    }

    #[inline]
    pub fn page(&self) -> UsagePage {
        UsagePage::from(self.element.usage_page)
    }

    #[inline]
    pub fn integer_value(&self) -> i32 {
        self.integer
    }

    #[inline]
    pub fn calibrated(&self) -> f64 {
        self.calibrated
    }

    pub fn scaled(&self, scale: ScaleType) -> f64 {
        match scale {
            ScaleType::Calibrated => self.calibrated,
            ScaleType::Physical => self.physical(),
            ScaleType::Exponent => {
                self.physical() * 10f64.powi(i32::from(self.element.unit_exponent))
            }
        }
    }

    fn physical(&self) -> f64 {
        let (lo, hi) = (self.element.logical_min, self.element.logical_max);
        let (plo, phi) = self.element.physical_range();
        if hi <= lo {
            return f64::from(plo);
        }
        let v = self.integer.clamp(lo, hi);
        let t = (f64::from(v) - f64::from(lo)) / (f64::from(hi) - f64::from(lo));
        f64::from(plo) + t * (f64::from(phi) - f64::from(plo))
    }
}

/// Read `size` bits at `offset` (LSB first) from `payload`.
///
/// Returns `None` if the field does not fit in the payload or is wider than 32 bits.
pub fn extract_field(payload: &[u8], offset: u32, size: u32, signed: bool) -> Option<i32> {
    if size == 0 || size > 32 {
        return None;
    }
    let end = offset.checked_add(size)?;
    if end.div_ceil(8) as usize > payload.len() {
        return None;
    }
    let mut v: u64 = 0;
    for bit in 0..size {
        let pos = offset + bit;
        if (payload[(pos / 8) as usize] >> (pos % 8)) & 1 == 1 {
            v |= 1 << bit;
        }
    }
    if signed && size < 32 && (v >> (size - 1)) & 1 == 1 {
        v |= !0u64 << size;
    }
    Some(v as u32 as i32)
}

/// Turns input reports into per-element [`RawValue`]s.
///
/// An element is emitted when its value changes, on every report for
/// relative elements, and on the first report that carries it.
#[derive(Clone, Debug)]
pub struct ReportDecoder {
    descriptor: ReportDescriptor,
    calibration: Calibration,
    last: Vec<Option<i32>>,
}

impl ReportDecoder {
    pub fn new(descriptor: ReportDescriptor, calibration: Calibration) -> Self {
        let last = vec![None; descriptor.elements.len()];
        Self {
            descriptor,
            calibration,
            last,
        }
    }

    pub fn descriptor(&self) -> &ReportDescriptor {
        &self.descriptor
    }

    /// Decode one report as read from the device (ID byte included when used).
    ///
    /// Returns the number of values appended to `out`.
    pub fn decode(&mut self, report: &[u8], out: &mut Vec<RawValue>) -> usize {
        let (report_id, payload) = if self.descriptor.uses_report_ids {
            match report.split_first() {
                Some((&id, rest)) => (id, rest),
                None => return 0,
            }
        } else {
            (0, report)
        };

        let mut emitted = 0;
        for (element, last) in self.descriptor.elements.iter().zip(self.last.iter_mut()) {
            if element.report_id != report_id {
                continue;
            }
            let Some(integer) = extract_field(
                payload,
                element.bit_offset,
                element.bit_size,
                element.is_signed(),
            ) else {
                continue;
            };
            if *last != Some(integer) || element.relative {
                *last = Some(integer);
                out.push(RawValue::new(*element, integer, &self.calibration));
                emitted += 1;
            }
        }
        emitted
    }
}
