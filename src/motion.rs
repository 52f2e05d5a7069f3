//! Multi-axis state aggregation.
//!
//! [`MultiAxisDevice`] is the application-facing side of the crate. It owns a
//! [`HidManager`], installs itself as the manager's delegate, and turns
//! Generic Desktop axis values into a published 6-DoF [`MotionState`].
//!
//! # Axis convention
//! Devices report X left/right, Y front/back and Z up/down. The state uses
//! depth on `z` and height on `y`, so the SpaceMouse map swaps the two
//! translation axes:
//!
//! | device usage | state field |
//! |---|---|
//! | X | `x` |
//! | Y | `z` |
//! | Z | `y` |
//! | Rx | `pitch` |
//! | Ry | `roll` |
//! | Rz | `yaw` |
//!
//! Button page values are received and dropped (reserved); other pages and
//! unmapped Generic Desktop usages are ignored.
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "hid")]
//! # fn main() -> Result<(), multiaxis::Error> {
//! use multiaxis::backends::hid::HidapiBackend;
//! use multiaxis::{AxisFilter, Config, MultiAxisDevice};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = Config::default();
//! let mut mouse = MultiAxisDevice::with_config(HidapiBackend::new(&config)?, &config);
//! mouse.subscribe(|e: &multiaxis::MotionEvent| println!("{:?}", e.state), AxisFilter::All, None);
//! mouse.run(&AtomicBool::new(false));
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "hid"))]
//! # fn main() {}
//! ```

use crate::backends::HidBackend;
use crate::config::Config;
use crate::device::HidDevice;
use crate::eventbus::{AxisFilter, ListenerId, MotionBus, MotionEvent, MotionListener};
use crate::manager::{HidManager, ManagerDelegate};
use crate::snapshot::StateHandle;
use crate::usage::{GenericDesktopUsage, UsagePage};
use crate::value::{RawValue, ScaleType};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Six degrees of freedom. All zero by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// How consumers should interpret the state. The aggregator never acts on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Motion drives the camera.
    #[default]
    Camera,
    /// Motion drives the selected model.
    Model,
}

/// One field of [`MotionState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAxis {
    X,
    Y,
    Z,
    Pitch,
    Yaw,
    Roll,
}

impl StateAxis {
    pub fn is_translation(self) -> bool {
        matches!(self, StateAxis::X | StateAxis::Y | StateAxis::Z)
    }

    pub fn is_rotation(self) -> bool {
        !self.is_translation()
    }

    pub fn get(self, state: &MotionState) -> f32 {
        match self {
            StateAxis::X => state.x,
            StateAxis::Y => state.y,
            StateAxis::Z => state.z,
            StateAxis::Pitch => state.pitch,
            StateAxis::Yaw => state.yaw,
            StateAxis::Roll => state.roll,
        }
    }

    pub fn set(self, state: &mut MotionState, value: f32) {
        let field = match self {
            StateAxis::X => &mut state.x,
            StateAxis::Y => &mut state.y,
            StateAxis::Z => &mut state.z,
            StateAxis::Pitch => &mut state.pitch,
            StateAxis::Yaw => &mut state.yaw,
            StateAxis::Roll => &mut state.roll,
        };
        *field = value;
    }
}

impl fmt::Display for StateAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateAxis::X => "x",
            StateAxis::Y => "y",
            StateAxis::Z => "z",
            StateAxis::Pitch => "pitch",
            StateAxis::Yaw => "yaw",
            StateAxis::Roll => "roll",
        })
    }
}

/// Device axis to state field table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisMap(&'static [(GenericDesktopUsage, StateAxis)]);

impl AxisMap {
    pub const fn new(table: &'static [(GenericDesktopUsage, StateAxis)]) -> Self {
        Self(table)
    }

    /// State field driven by `usage`, if any.
    pub fn target(&self, usage: GenericDesktopUsage) -> Option<StateAxis> {
        self.0
            .iter()
            .find(|(from, _)| *from == usage)
            .map(|&(_, to)| to)
    }
}

/// Axis convention of 3Dconnexion SpaceMouse devices.
pub const SPACE_MOUSE_AXIS_MAP: AxisMap = AxisMap::new(&[
    (GenericDesktopUsage::X, StateAxis::X),
    (GenericDesktopUsage::Y, StateAxis::Z),
    (GenericDesktopUsage::Z, StateAxis::Y),
    (GenericDesktopUsage::RotationX, StateAxis::Pitch),
    (GenericDesktopUsage::RotationY, StateAxis::Roll),
    (GenericDesktopUsage::RotationZ, StateAxis::Yaw),
]);

/// The manager's delegate: resolves axis values and publishes.
struct AxisMapper {
    map: AxisMap,
    state: StateHandle,
    bus: Arc<Mutex<MotionBus>>,
}

impl ManagerDelegate for AxisMapper {
    fn device_value_received(&mut self, device: &HidDevice, value: &RawValue) {
        if value.page() != UsagePage::GenericDesktop {
            // Button page is reserved, everything else is ignored.
            return;
        }
        let Some(axis) = self.map.target(GenericDesktopUsage::from(value.usage())) else {
            return;
        };

        let reading = value.scaled(ScaleType::Calibrated) as f32;
        let state = self.state.update(|s| axis.set(s, reading));
        self.bus.lock().emit(&MotionEvent {
            device: device.path().to_string(),
            axis,
            state,
        });
    }
}

/// A multi-axis controller as seen by the application.
///
/// Aggregates every attached controller into one [`MotionState`]. One per
/// backend; construct it on the thread that will run the event loop.
pub struct MultiAxisDevice<B: HidBackend> {
    manager: HidManager<B>,
    state: StateHandle,
    bus: Arc<Mutex<MotionBus>>,
    mode: Mode,
    poll_interval: Duration,
}

impl<B: HidBackend> MultiAxisDevice<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &Config::default())
    }

    pub fn with_config(backend: B, config: &Config) -> Self {
        Self::with_axis_map(backend, config, SPACE_MOUSE_AXIS_MAP)
    }

    pub fn with_axis_map(backend: B, config: &Config, map: AxisMap) -> Self {
        let state = StateHandle::default();
        let bus = Arc::new(Mutex::new(MotionBus::new()));
        let mut manager = HidManager::new(backend);
        manager.set_delegate(Box::new(AxisMapper {
            map,
            state: state.clone(),
            bus: Arc::clone(&bus),
        }));
        Self {
            manager,
            state,
            bus,
            mode: config.mode,
            poll_interval: config.poll_interval(),
        }
    }

    /// Run one event-loop turn. Returns the number of values dispatched.
    pub fn poll(&mut self) -> usize {
        self.manager.poll()
    }

    /// Poll every `poll_interval` until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.poll();
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Latest published state.
    pub fn state(&self) -> MotionState {
        self.state.get()
    }

    /// Reader for the published state, usable from other threads.
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Register an observer. `device` restricts it to one device path.
    pub fn subscribe(
        &mut self,
        listener: impl MotionListener + 'static,
        filter: AxisFilter,
        device: Option<String>,
    ) -> ListenerId {
        self.bus.lock().add_listener(listener, filter, device)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.lock().remove_listener(id)
    }

    pub fn enable(&mut self, id: ListenerId) -> bool {
        self.bus.lock().enable(id)
    }

    pub fn disable(&mut self, id: ListenerId) -> bool {
        self.bus.lock().disable(id)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn manager(&self) -> &HidManager<B> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_mouse_map_swaps_y_and_z() {
        let map = SPACE_MOUSE_AXIS_MAP;
        assert_eq!(map.target(GenericDesktopUsage::X), Some(StateAxis::X));
        assert_eq!(map.target(GenericDesktopUsage::Y), Some(StateAxis::Z));
        assert_eq!(map.target(GenericDesktopUsage::Z), Some(StateAxis::Y));
        assert_eq!(map.target(GenericDesktopUsage::RotationX), Some(StateAxis::Pitch));
        assert_eq!(map.target(GenericDesktopUsage::RotationY), Some(StateAxis::Roll));
        assert_eq!(map.target(GenericDesktopUsage::RotationZ), Some(StateAxis::Yaw));
        assert_eq!(map.target(GenericDesktopUsage::Undefined), None);
    }

    #[test]
    fn set_touches_one_field() {
        let mut state = MotionState::default();
        StateAxis::Roll.set(&mut state, 0.5);
        assert_eq!(
            state,
            MotionState {
                roll: 0.5,
                ..MotionState::default()
            }
        );
        assert_eq!(StateAxis::Roll.get(&state), 0.5);
    }

    #[test]
    fn axis_classes() {
        assert!(StateAxis::Z.is_translation());
        assert!(StateAxis::Pitch.is_rotation());
        assert_eq!(StateAxis::Yaw.to_string(), "yaw");
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Model).unwrap(), "\"model\"");
        assert_eq!(Mode::default(), Mode::Camera);
    }
}
