//! HID usage tables used by the multi-axis pipeline.
//!
//! Only the handful of pages and usages this crate interprets are modelled.
//! Conversions from raw codes never fail: unknown codes map to the
//! `Undefined` variant and callers ignore them.

use serde::{Deserialize, Serialize};

/// Usage page of a HID element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsagePage {
    Undefined,
    GenericDesktop,
    Led,
    Button,
}

impl UsagePage {
    pub const GENERIC_DESKTOP: u16 = 0x01;
    pub const LED: u16 = 0x08;
    pub const BUTTON: u16 = 0x09;

    /// Raw page code (`0x00` for `Undefined`).
    pub fn code(self) -> u16 {
        match self {
            UsagePage::Undefined => 0x00,
            UsagePage::GenericDesktop => Self::GENERIC_DESKTOP,
            UsagePage::Led => Self::LED,
            UsagePage::Button => Self::BUTTON,
        }
    }
}

impl From<u16> for UsagePage {
    fn from(code: u16) -> Self {
        match code {
            Self::GENERIC_DESKTOP => UsagePage::GenericDesktop,
            Self::LED => UsagePage::Led,
            Self::BUTTON => UsagePage::Button,
            _ => UsagePage::Undefined,
        }
    }
}

/// Axis usages on the Generic Desktop page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericDesktopUsage {
    Undefined,
    X,
    Y,
    Z,
    RotationX,
    RotationY,
    RotationZ,
}

impl GenericDesktopUsage {
    /// Raw usage code (`0x00` for `Undefined`).
    pub fn code(self) -> u16 {
        match self {
            GenericDesktopUsage::Undefined => 0x00,
            GenericDesktopUsage::X => 0x30,
            GenericDesktopUsage::Y => 0x31,
            GenericDesktopUsage::Z => 0x32,
            GenericDesktopUsage::RotationX => 0x33,
            GenericDesktopUsage::RotationY => 0x34,
            GenericDesktopUsage::RotationZ => 0x35,
        }
    }

    /// Short label in HID usage-table spelling (`"X"`, `"Rz"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            GenericDesktopUsage::Undefined => "Undefined",
            GenericDesktopUsage::X => "X",
            GenericDesktopUsage::Y => "Y",
            GenericDesktopUsage::Z => "Z",
            GenericDesktopUsage::RotationX => "Rx",
            GenericDesktopUsage::RotationY => "Ry",
            GenericDesktopUsage::RotationZ => "Rz",
        }
    }
}

impl From<u16> for GenericDesktopUsage {
    fn from(code: u16) -> Self {
        match code {
            0x30 => GenericDesktopUsage::X,
            0x31 => GenericDesktopUsage::Y,
            0x32 => GenericDesktopUsage::Z,
            0x33 => GenericDesktopUsage::RotationX,
            0x34 => GenericDesktopUsage::RotationY,
            0x35 => GenericDesktopUsage::RotationZ,
            _ => GenericDesktopUsage::Undefined,
        }
    }
}

/// Generic Desktop usage of a multi-axis controller application collection.
pub const MULTI_AXIS_CONTROLLER: u16 = 0x08;

/// Device matching filter handed to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub usage_page: u16,
    pub usage: u16,
}

impl MatchCriteria {
    /// Generic Desktop / Multi-axis Controller. The only class this crate opens.
    pub const MULTI_AXIS: MatchCriteria = MatchCriteria {
        usage_page: UsagePage::GENERIC_DESKTOP,
        usage: MULTI_AXIS_CONTROLLER,
    };

    #[inline]
    pub fn matches(&self, usage_page: u16, usage: u16) -> bool {
        self.usage_page == usage_page && self.usage == usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pages_round_trip_their_codes() {
        for page in [UsagePage::GenericDesktop, UsagePage::Led, UsagePage::Button] {
            assert_eq!(UsagePage::from(page.code()), page);
        }
    }

    #[test]
    fn unknown_codes_are_undefined() {
        assert_eq!(UsagePage::from(0x0C), UsagePage::Undefined);
        assert_eq!(UsagePage::from(0xFF00), UsagePage::Undefined);
        assert_eq!(GenericDesktopUsage::from(0x39), GenericDesktopUsage::Undefined);
        assert_eq!(GenericDesktopUsage::from(0x00), GenericDesktopUsage::Undefined);
    }

    #[test]
    fn rotation_z_is_0x35() {
        assert_eq!(GenericDesktopUsage::from(0x35), GenericDesktopUsage::RotationZ);
        assert_eq!(GenericDesktopUsage::RotationZ.name(), "Rz");
    }

    #[test]
    fn multi_axis_criteria() {
        let c = MatchCriteria::MULTI_AXIS;
        assert!(c.matches(0x01, 0x08));
        assert!(!c.matches(0x01, 0x04)); // joystick
        assert!(!c.matches(0x0C, 0x08));
    }
}
