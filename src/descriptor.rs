//! HID report-descriptor parsing.
//!
//! Walks the short items of a report descriptor and flattens every variable
//! input field into an [`Element`]: its report ID, bit position, usage and
//! logical/physical extents. That is all the value decoder needs to turn raw
//! report bytes into per-usage readings.
//!
//! ## Scope
//! - Main items: Input (variable fields become elements; constant and array
//!   fields only advance the bit cursor), Output/Feature (report IDs are
//!   recorded, nothing else), Collection / End Collection.
//! - Global items including Push/Pop; Unit Exponent is read as a signed nibble.
//! - Local Usage / Usage Minimum / Usage Maximum, including 4-byte extended
//!   usages that carry their own page.
//! - Long items are rejected.

use crate::error::DescriptorError;
use crate::usage::UsagePage;
use std::collections::BTreeMap;

/// Coarse classification of an input element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Button,
    Axis,
    Misc,
}

/// One variable input field of a report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Element {
    /// Report ID (0 when the descriptor does not use IDs).
    pub report_id: u8,
    /// Bit offset into the report payload, excluding the ID byte.
    pub bit_offset: u32,
    pub bit_size: u32,
    pub usage_page: u16,
    pub usage: u16,
    pub logical_min: i32,
    pub logical_max: i32,
    pub physical_min: i32,
    pub physical_max: i32,
    pub unit_exponent: i8,
    pub unit: u32,
    pub relative: bool,
    pub kind: ElementKind,
}

impl Element {
    /// Whether raw field bits are two's-complement.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.logical_min < 0
    }

    /// Physical extents, falling back to the logical ones when both are zero.
    pub fn physical_range(&self) -> (i32, i32) {
        if self.physical_min == 0 && self.physical_max == 0 {
            (self.logical_min, self.logical_max)
        } else {
            (self.physical_min, self.physical_max)
        }
    }
}

/// Parsed view of a report descriptor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportDescriptor {
    /// Input elements in descriptor order.
    pub elements: Vec<Element>,
    /// Whether reports on the wire are prefixed with a report ID byte.
    pub uses_report_ids: bool,
    /// Report IDs of output reports (LEDs etc.). Never written by this crate.
    pub output_report_ids: Vec<u8>,
    /// Report IDs of feature reports. Never written by this crate.
    pub feature_report_ids: Vec<u8>,
    /// `(usage_page, usage)` of the first application collection.
    pub application: Option<(u16, u16)>,
    input_bits: BTreeMap<u8, u32>,
}

impl ReportDescriptor {
    /// Payload length in bytes (without the ID byte) of input report `report_id`.
    pub fn input_report_len(&self, report_id: u8) -> Option<usize> {
        self.input_bits
            .get(&report_id)
            .map(|bits| bits.div_ceil(8) as usize)
    }

    /// Longest input report on the wire, including the ID byte if used.
    pub fn max_input_report_len(&self) -> usize {
        let payload = self
            .input_bits
            .values()
            .map(|bits| bits.div_ceil(8) as usize)
            .max()
            .unwrap_or(0);
        payload + usize::from(self.uses_report_ids)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Globals {
    usage_page: u16,
    logical_min: i32,
    logical_max: Extent,
    physical_min: i32,
    physical_max: Extent,
    unit_exponent: i8,
    unit: u32,
    report_size: u32,
    report_id: u8,
    report_count: u32,
}

/// A maximum as written: signed and unsigned readings of the same bytes.
#[derive(Clone, Copy, Debug, Default)]
struct Extent {
    signed: i32,
    unsigned: u32,
}

impl Extent {
    /// Devices often write e.g. `Logical Max (255)` in one byte; read it
    /// unsigned when the signed reading would fall below the minimum.
    fn resolve(self, min: i32) -> i32 {
        if self.signed < min {
            i32::try_from(self.unsigned).unwrap_or(i32::MAX)
        } else {
            self.signed
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct LocalUsage {
    page: Option<u16>,
    id: u16,
}

#[derive(Default)]
struct Locals {
    usages: Vec<LocalUsage>,
    usage_min: Option<LocalUsage>,
    usage_max: Option<LocalUsage>,
}

impl Locals {
    /// Usage for the `index`-th field of a main item. Short lists repeat their last entry.
    fn usage_at(&self, index: u32) -> Option<LocalUsage> {
        if !self.usages.is_empty() {
            let i = (index as usize).min(self.usages.len() - 1);
            return Some(self.usages[i]);
        }
        let (min, max) = (self.usage_min?, self.usage_max?);
        let id = u32::from(min.id).saturating_add(index);
        Some(LocalUsage {
            page: min.page,
            id: id.min(u32::from(max.id)) as u16,
        })
    }
}

mod item {
    pub const INPUT: u8 = 0x80;
    pub const OUTPUT: u8 = 0x90;
    pub const FEATURE: u8 = 0xB0;
    pub const COLLECTION: u8 = 0xA0;
    pub const END_COLLECTION: u8 = 0xC0;

    pub const USAGE_PAGE: u8 = 0x04;
    pub const LOGICAL_MIN: u8 = 0x14;
    pub const LOGICAL_MAX: u8 = 0x24;
    pub const PHYSICAL_MIN: u8 = 0x34;
    pub const PHYSICAL_MAX: u8 = 0x44;
    pub const UNIT_EXPONENT: u8 = 0x54;
    pub const UNIT: u8 = 0x64;
    pub const REPORT_SIZE: u8 = 0x74;
    pub const REPORT_ID: u8 = 0x84;
    pub const REPORT_COUNT: u8 = 0x94;
    pub const PUSH: u8 = 0xA4;
    pub const POP: u8 = 0xB4;

    pub const USAGE: u8 = 0x08;
    pub const USAGE_MIN: u8 = 0x18;
    pub const USAGE_MAX: u8 = 0x28;

    pub const LONG_PREFIX: u8 = 0xFE;
}

/// Upper bound on the size of one input report, ID byte excluded.
pub const MAX_REPORT_BITS: u32 = u16::MAX as u32;

const INPUT_CONSTANT: u32 = 1 << 0;
const INPUT_VARIABLE: u32 = 1 << 1;
const INPUT_RELATIVE: u32 = 1 << 2;

/// Parse a raw report descriptor.
pub fn parse(bytes: &[u8]) -> Result<ReportDescriptor, DescriptorError> {
    let mut out = ReportDescriptor::default();
    let mut globals = Globals::default();
    let mut stack: Vec<Globals> = Vec::new();
    let mut locals = Locals::default();
    let mut depth = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let prefix = bytes[i];
        if prefix == item::LONG_PREFIX {
            return Err(DescriptorError::LongItem { offset: i });
        }
        let size = match prefix & 0x03 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        let data = bytes
            .get(i + 1..i + 1 + size)
            .ok_or(DescriptorError::Truncated { offset: i })?;
        let unsigned = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        let signed = match size {
            1 => unsigned as u8 as i8 as i32,
            2 => unsigned as u16 as i16 as i32,
            4 => unsigned as i32,
            _ => 0,
        };

        match prefix & 0xFC {
            item::INPUT => {
                add_input(&mut out, &globals, &locals, unsigned, i)?;
                locals = Locals::default();
            }
            item::OUTPUT => {
                push_unique(&mut out.output_report_ids, globals.report_id);
                locals = Locals::default();
            }
            item::FEATURE => {
                push_unique(&mut out.feature_report_ids, globals.report_id);
                locals = Locals::default();
            }
            item::COLLECTION => {
                // Collection type 0x01 = Application.
                if out.application.is_none() && unsigned == 0x01 {
                    if let Some(u) = locals.usage_at(0) {
                        out.application = Some((u.page.unwrap_or(globals.usage_page), u.id));
                    }
                }
                depth += 1;
                locals = Locals::default();
            }
            item::END_COLLECTION => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(DescriptorError::UnbalancedCollection { offset: i })?;
                locals = Locals::default();
            }

            item::USAGE_PAGE => globals.usage_page = unsigned as u16,
            item::LOGICAL_MIN => globals.logical_min = signed,
            item::LOGICAL_MAX => globals.logical_max = Extent { signed, unsigned },
            item::PHYSICAL_MIN => globals.physical_min = signed,
            item::PHYSICAL_MAX => globals.physical_max = Extent { signed, unsigned },
            item::UNIT_EXPONENT => {
                let nibble = (unsigned & 0x0F) as i8;
                globals.unit_exponent = if nibble > 7 { nibble - 16 } else { nibble };
            }
            item::UNIT => globals.unit = unsigned,
            item::REPORT_SIZE => globals.report_size = unsigned,
            item::REPORT_ID => {
                globals.report_id = unsigned as u8;
                out.uses_report_ids = true;
            }
            item::REPORT_COUNT => globals.report_count = unsigned,
            item::PUSH => stack.push(globals),
            item::POP => {
                globals = stack
                    .pop()
                    .ok_or(DescriptorError::PopWithoutPush { offset: i })?;
            }

            item::USAGE => locals.usages.push(local_usage(unsigned, size)),
            item::USAGE_MIN => locals.usage_min = Some(local_usage(unsigned, size)),
            item::USAGE_MAX => locals.usage_max = Some(local_usage(unsigned, size)),

            // Designators, strings, delimiters: irrelevant for decoding.
            _ => {}
        }

        i += 1 + size;
    }

    Ok(out)
}

fn local_usage(data: u32, size: usize) -> LocalUsage {
    if size == 4 {
        LocalUsage {
            page: Some((data >> 16) as u16),
            id: data as u16,
        }
    } else {
        LocalUsage {
            page: None,
            id: data as u16,
        }
    }
}

fn push_unique(ids: &mut Vec<u8>, id: u8) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn add_input(
    out: &mut ReportDescriptor,
    globals: &Globals,
    locals: &Locals,
    flags: u32,
    offset: usize,
) -> Result<(), DescriptorError> {
    let bits = globals.report_size;
    if bits > 32 {
        return Err(DescriptorError::FieldTooWide { offset, bits });
    }
    let cursor = out.input_bits.entry(globals.report_id).or_insert(0);
    let end = bits
        .checked_mul(globals.report_count)
        .and_then(|span| span.checked_add(*cursor))
        .filter(|&end| end <= MAX_REPORT_BITS)
        .ok_or(DescriptorError::ReportTooLong { offset })?;

    let is_data_variable = flags & INPUT_CONSTANT == 0 && flags & INPUT_VARIABLE != 0;
    if !is_data_variable || bits == 0 {
        *cursor = end;
        return Ok(());
    }

    let logical_max = globals.logical_max.resolve(globals.logical_min);
    let physical_max = globals.physical_max.resolve(globals.physical_min);

    for index in 0..globals.report_count {
        let bit_offset = *cursor;
        *cursor += bits;

        let Some(usage) = locals.usage_at(index) else {
            continue;
        };
        let usage_page = usage.page.unwrap_or(globals.usage_page);
        out.elements.push(Element {
            report_id: globals.report_id,
            bit_offset,
            bit_size: bits,
            usage_page,
            usage: usage.id,
            logical_min: globals.logical_min,
            logical_max,
            physical_min: globals.physical_min,
            physical_max,
            unit_exponent: globals.unit_exponent,
            unit: globals.unit,
            relative: flags & INPUT_RELATIVE != 0,
            kind: classify(usage_page, usage.id),
        });
    }
    Ok(())
}

fn classify(usage_page: u16, usage: u16) -> ElementKind {
    match UsagePage::from(usage_page) {
        UsagePage::Button => ElementKind::Button,
        // X..Wheel
        UsagePage::GenericDesktop if (0x30..=0x38).contains(&usage) => ElementKind::Axis,
        _ => ElementKind::Misc,
    }
}

/// Report descriptor of a 3Dconnexion SpaceMouse Compact (256f:c635),
/// minus its vendor-defined feature collection.
pub const SPACE_MOUSE_COMPACT: &[u8] = &[
    0x05, 0x01, //       Usage Page (Generic Desktop)
    0x09, 0x08, //       Usage (Multi-axis Controller)
    0xA1, 0x01, //       Collection (Application)
    0xA1, 0x00, //         Collection (Physical)
    0x85, 0x01, //           Report ID (1)
    0x16, 0xA2, 0xFE, //     Logical Minimum (-350)
    0x26, 0x5E, 0x01, //     Logical Maximum (350)
    0x36, 0x88, 0xFA, //     Physical Minimum (-1400)
    0x46, 0x78, 0x05, //     Physical Maximum (1400)
    0x55, 0x0C, //           Unit Exponent (-4)
    0x65, 0x11, //           Unit (SI Linear, cm)
    0x09, 0x30, //           Usage (X)
    0x09, 0x31, //           Usage (Y)
    0x09, 0x32, //           Usage (Z)
    0x75, 0x10, //           Report Size (16)
    0x95, 0x03, //           Report Count (3)
    0x81, 0x06, //           Input (Data, Var, Rel)
    0xC0, //               End Collection
    0xA1, 0x00, //         Collection (Physical)
    0x85, 0x02, //           Report ID (2)
    0x09, 0x33, //           Usage (Rx)
    0x09, 0x34, //           Usage (Ry)
    0x09, 0x35, //           Usage (Rz)
    0x75, 0x10, //           Report Size (16)
    0x95, 0x03, //           Report Count (3)
    0x81, 0x06, //           Input (Data, Var, Rel)
    0xC0, //               End Collection
    0xA1, 0x02, //         Collection (Logical)
    0x85, 0x03, //           Report ID (3)
    0x05, 0x09, //           Usage Page (Button)
    0x19, 0x01, //           Usage Minimum (1)
    0x29, 0x02, //           Usage Maximum (2)
    0x15, 0x00, //           Logical Minimum (0)
    0x25, 0x01, //           Logical Maximum (1)
    0x35, 0x00, //           Physical Minimum (0)
    0x45, 0x01, //           Physical Maximum (1)
    0x75, 0x01, //           Report Size (1)
    0x95, 0x02, //           Report Count (2)
    0x81, 0x02, //           Input (Data, Var, Abs)
    0x95, 0x0E, //           Report Count (14)
    0x81, 0x03, //           Input (Const, Var, Abs)
    0xC0, //               End Collection
    0xA1, 0x02, //         Collection (Logical)
    0x85, 0x04, //           Report ID (4)
    0x05, 0x08, //           Usage Page (LED)
    0x09, 0x4B, //           Usage (Generic Indicator)
    0x15, 0x00, //           Logical Minimum (0)
    0x25, 0x01, //           Logical Maximum (1)
    0x95, 0x01, //           Report Count (1)
    0x75, 0x01, //           Report Size (1)
    0x91, 0x02, //           Output (Data, Var, Abs)
    0x95, 0x01, //           Report Count (1)
    0x75, 0x07, //           Report Size (7)
    0x91, 0x03, //           Output (Const, Var, Abs)
    0xC0, //               End Collection
    0xC0, //             End Collection
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_mouse_layout() {
        let d = parse(SPACE_MOUSE_COMPACT).unwrap();
        assert!(d.uses_report_ids);
        assert_eq!(d.application, Some((0x01, 0x08)));
        assert_eq!(d.elements.len(), 8);

        let x = d.elements[0];
        assert_eq!((x.report_id, x.usage_page, x.usage), (1, 0x01, 0x30));
        assert_eq!((x.bit_offset, x.bit_size), (0, 16));
        assert_eq!((x.logical_min, x.logical_max), (-350, 350));
        assert_eq!((x.physical_min, x.physical_max), (-1400, 1400));
        assert_eq!(x.unit_exponent, -4);
        assert_eq!(x.unit, 0x11);
        assert!(x.relative);
        assert_eq!(x.kind, ElementKind::Axis);

        let z = d.elements[2];
        assert_eq!((z.usage, z.bit_offset), (0x32, 32));

        let rz = d.elements[5];
        assert_eq!((rz.report_id, rz.usage, rz.bit_offset), (2, 0x35, 32));
        // Globals carry over into the second physical collection.
        assert_eq!(rz.logical_min, -350);
    }

    #[test]
    fn buttons_expand_usage_range_and_skip_padding() {
        let d = parse(SPACE_MOUSE_COMPACT).unwrap();
        let buttons: Vec<_> = d
            .elements
            .iter()
            .filter(|e| e.kind == ElementKind::Button)
            .collect();
        assert_eq!(buttons.len(), 2);
        assert_eq!((buttons[0].usage, buttons[0].bit_offset), (1, 0));
        assert_eq!((buttons[1].usage, buttons[1].bit_offset), (2, 1));
        assert!(!buttons[0].relative);
        assert_eq!(d.input_report_len(3), Some(2));
        assert_eq!(d.input_report_len(1), Some(6));
        assert_eq!(d.max_input_report_len(), 7);
    }

    #[test]
    fn led_output_is_recorded_not_decoded() {
        let d = parse(SPACE_MOUSE_COMPACT).unwrap();
        assert_eq!(d.output_report_ids, vec![4]);
        assert!(d.feature_report_ids.is_empty());
        assert!(d.elements.iter().all(|e| e.usage_page != 0x08));
    }

    #[test]
    fn unsigned_logical_max_in_one_byte() {
        // Logical Min (0), Logical Max (255) written as 0xFF.
        let bytes = [
            0x05, 0x01, 0x09, 0x30, 0x15, 0x00, 0x25, 0xFF, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
        ];
        let d = parse(&bytes).unwrap();
        assert!(!d.uses_report_ids);
        assert_eq!(d.elements[0].logical_max, 255);
        assert!(!d.elements[0].is_signed());
    }

    #[test]
    fn extended_usage_overrides_page() {
        // Usage (0x0009_0001) on a Generic Desktop page.
        let bytes = [
            0x05, 0x01, 0x0B, 0x01, 0x00, 0x09, 0x00, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95,
            0x01, 0x81, 0x02,
        ];
        let d = parse(&bytes).unwrap();
        assert_eq!(d.elements[0].usage_page, 0x09);
        assert_eq!(d.elements[0].usage, 0x01);
        assert_eq!(d.elements[0].kind, ElementKind::Button);
    }

    #[test]
    fn push_pop_restores_globals() {
        let bytes = [
            0x05, 0x01, 0x75, 0x08, 0xA4, // Push
            0x75, 0x10, 0xB4, // Pop
            0x09, 0x30, 0x95, 0x01, 0x81, 0x02,
        ];
        let d = parse(&bytes).unwrap();
        assert_eq!(d.elements[0].bit_size, 8);
    }

    #[test]
    fn malformed_descriptors() {
        assert_eq!(
            parse(&[0x26, 0x5E]),
            Err(DescriptorError::Truncated { offset: 0 })
        );
        assert_eq!(
            parse(&[0xC0]),
            Err(DescriptorError::UnbalancedCollection { offset: 0 })
        );
        assert_eq!(parse(&[0xB4]), Err(DescriptorError::PopWithoutPush { offset: 0 }));
        assert_eq!(
            parse(&[0xFE, 0x00, 0x00]),
            Err(DescriptorError::LongItem { offset: 0 })
        );
        assert!(matches!(
            parse(&[0x75, 0x40, 0x95, 0x01, 0x09, 0x30, 0x81, 0x02]),
            Err(DescriptorError::FieldTooWide { bits: 64, .. })
        ));
    }

    #[test]
    fn oversized_report_counts_are_rejected() {
        // Report Size (16), Report Count (0xFFFF_FFFF), Input (Const).
        assert_eq!(
            parse(&[0x75, 0x10, 0x97, 0xFF, 0xFF, 0xFF, 0xFF, 0x81, 0x01]),
            Err(DescriptorError::ReportTooLong { offset: 7 })
        );
        // Report Size (8), Report Count (65535), Usage (X), Input (Data, Var).
        assert_eq!(
            parse(&[0x75, 0x08, 0x96, 0xFF, 0xFF, 0x09, 0x30, 0x81, 0x02]),
            Err(DescriptorError::ReportTooLong { offset: 7 })
        );
        // Each item fits on its own, together they do not.
        let half = [0x75, 0x08, 0x96, 0x00, 0x10, 0x81, 0x01];
        let bytes: Vec<u8> = half.iter().chain(half.iter()).copied().collect();
        assert_eq!(
            parse(&bytes),
            Err(DescriptorError::ReportTooLong { offset: 12 })
        );
    }

    #[test]
    fn usage_range_shorter_than_count_repeats_its_maximum() {
        // Usage Min (0xFFFE), Usage Max (0xFFFF), four 1-bit fields.
        let bytes = [
            0x05, 0x09, 0x1A, 0xFE, 0xFF, 0x2A, 0xFF, 0xFF, 0x75, 0x01, 0x95, 0x04, 0x81, 0x02,
        ];
        let d = parse(&bytes).unwrap();
        let usages: Vec<u16> = d.elements.iter().map(|e| e.usage).collect();
        assert_eq!(usages, vec![0xFFFE, 0xFFFF, 0xFFFF, 0xFFFF]);
    }
}
