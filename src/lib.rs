//! multiaxis: USB HID multi-axis controller input for Rust.
//!
//! Discovers 3D mice (Generic Desktop / Multi-axis Controller), follows them
//! through attach and detach, decodes their input reports and publishes one
//! 6-DoF [`MotionState`] with the device's axis convention applied.
//!
//! Start with [`MultiAxisDevice`] over a backend: [`backends::hid`] for real
//! hardware (feature `hid`) or [`backends::virtual_input`] for tests.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod eventbus;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod motion;
pub mod snapshot;
pub mod usage;
pub mod value;

pub use config::Config;
pub use device::{DeviceDelegate, DeviceStatus, HidDevice};
pub use error::{DescriptorError, Error};
pub use eventbus::{AxisFilter, ListenerId, MotionBus, MotionEvent, MotionListener};
pub use logger::Logger;
pub use manager::{DelegateToken, HidManager, ManagerDelegate};
pub use metadata::DeviceMeta;
pub use motion::{AxisMap, Mode, MotionState, MultiAxisDevice, StateAxis, SPACE_MOUSE_AXIS_MAP};
pub use snapshot::StateHandle;
pub use value::{Calibration, RawValue, ScaleType};
