//! The HID manager.
//!
//! [`HidManager`] owns the backend's enumeration context, the fixed match
//! criteria and the live device set. It is the single point of truth for
//! which controllers are attached, and the single chokepoint every decoded
//! value passes through on its way to the delegate.
//!
//! # Lifecycle
//! One manager per backend, constructed explicitly and owned by whoever runs
//! the event loop (normally a [`MultiAxisDevice`](crate::MultiAxisDevice)).
//! Nothing here is process-global; tests construct as many isolated managers
//! as they like. Dropping the manager closes every device first and the
//! enumeration context last.
//!
//! # Event loop
//! [`poll`](HidManager::poll) is one turn: attach/detach notifications are
//! applied in order, then every live device is drained and its values are
//! handed to the delegate in device order.
//!
//! # Attach/detach policy
//! - A second attach for a path that is already tracked is ignored.
//! - A detach closes and removes every tracked entry for that path; a detach
//!   for an unknown path does nothing.

use crate::backends::{HidBackend, HotplugEvent, NativeDevice};
use crate::device::{DeviceDelegate, HidDevice};
use crate::usage::MatchCriteria;
use crate::value::RawValue;
use tracing::{debug, info, warn};

/// Receives every value produced by any device of the manager.
pub trait ManagerDelegate {
    fn device_value_received(&mut self, device: &HidDevice, value: &RawValue);
}

/// Registration token returned by [`HidManager::set_delegate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DelegateToken(u64);

struct Registered {
    token: DelegateToken,
    delegate: Box<dyn ManagerDelegate>,
}

pub struct HidManager<B: HidBackend> {
    backend: B,
    devices: Vec<HidDevice>,
    delegate: Option<Registered>,
    next_token: u64,
}

impl<B: HidBackend> HidManager<B> {
    /// Take ownership of `backend` and restrict it to multi-axis controllers.
    ///
    /// Devices already present are reported by the backend as attach
    /// notifications and picked up on the first [`poll`](Self::poll).
    pub fn new(mut backend: B) -> Self {
        backend.set_device_matching(MatchCriteria::MULTI_AXIS);
        Self {
            backend,
            devices: Vec::new(),
            delegate: None,
            next_token: 0,
        }
    }

    /// Install the delegate, replacing any previous one.
    pub fn set_delegate(&mut self, delegate: Box<dyn ManagerDelegate>) -> DelegateToken {
        let token = DelegateToken(self.next_token);
        self.next_token += 1;
        self.delegate = Some(Registered { token, delegate });
        token
    }

    /// Remove the delegate if `token` still names it.
    pub fn clear_delegate(&mut self, token: DelegateToken) -> bool {
        match &self.delegate {
            Some(registered) if registered.token == token => {
                self.delegate = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /// Live devices, in attach order.
    pub fn devices(&self) -> &[HidDevice] {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, path: &str) -> Option<&HidDevice> {
        self.devices.iter().find(|d| d.path() == path)
    }

    /// Run one event-loop turn. Returns the number of values dispatched.
    ///
    /// A failed hotplug scan is logged and skipped for this turn; the live
    /// devices are still serviced.
    pub fn poll(&mut self) -> usize {
        match self.backend.poll_hotplug() {
            Ok(events) => {
                for event in events {
                    match event {
                        HotplugEvent::Attached(native) => self.device_attached(native),
                        HotplugEvent::Detached(native) => self.device_detached(&native),
                    }
                }
            }
            Err(e) => warn!("hotplug scan failed: {}", e),
        }

        let mut fanout = Fanout {
            delegate: self.delegate.as_mut().map(|r| &mut r.delegate),
        };
        let mut dispatched = 0;
        for device in self.devices.iter_mut() {
            dispatched += device.service(&mut fanout);
        }
        dispatched
    }

    fn device_attached(&mut self, native: NativeDevice) {
        if self.devices.iter().any(|d| d.native() == &native) {
            debug!("ignoring duplicate attach for {}", native);
            return;
        }
        info!("attached {}", native);
        let device = HidDevice::open(&mut self.backend, native);
        self.devices.push(device);
    }

    fn device_detached(&mut self, native: &NativeDevice) {
        let mut removed = 0;
        for device in self.devices.iter_mut().filter(|d| d.native() == native) {
            device.close();
            removed += 1;
        }
        if removed == 0 {
            debug!("detach for untracked device {}", native);
            return;
        }
        self.devices.retain(|d| d.native() != native);
        info!("detached {}", native);
    }
}

impl<B: HidBackend> Drop for HidManager<B> {
    fn drop(&mut self) {
        for device in self.devices.iter_mut() {
            device.close();
        }
        self.devices.clear();
        self.backend.close();
        debug!("HID manager closed");
    }
}

/// Device-side delegate that forwards to the manager's delegate unchanged.
struct Fanout<'a> {
    delegate: Option<&'a mut Box<dyn ManagerDelegate>>,
}

impl DeviceDelegate for Fanout<'_> {
    fn value_received(&mut self, device: &HidDevice, value: &RawValue) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.device_value_received(device, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{VirtualBackend, VirtualDevice, VirtualHub};
    use crate::device::DeviceStatus;
    use crate::usage::GenericDesktopUsage;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Seen = Rc<RefCell<Vec<(String, u16, f64)>>>;

    struct Collect(Seen);

    impl ManagerDelegate for Collect {
        fn device_value_received(&mut self, device: &HidDevice, value: &RawValue) {
            self.0
                .borrow_mut()
                .push((device.path().to_string(), value.usage(), value.calibrated()));
        }
    }

    fn manager() -> (HidManager<VirtualBackend>, VirtualHub, Seen) {
        let (backend, hub) = VirtualBackend::new();
        let mut manager = HidManager::new(backend);
        let seen = Seen::default();
        manager.set_delegate(Box::new(Collect(Rc::clone(&seen))));
        (manager, hub, seen)
    }

    #[test]
    fn attach_then_detach_restores_count() {
        let (mut manager, hub, seen) = manager();
        manager.poll();
        assert_eq!(manager.device_count(), 0);

        let dev = hub.attach(VirtualDevice::space_mouse("virtual:0"));
        manager.poll();
        assert_eq!(manager.device_count(), 1);
        assert_eq!(hub.open_connections("virtual:0"), 1);

        hub.set_axis(&dev, GenericDesktopUsage::X, 0.25);
        assert_eq!(manager.poll(), 1);

        hub.detach(&dev);
        manager.poll();
        assert_eq!(manager.device_count(), 0);
        assert_eq!(hub.open_connections("virtual:0"), 0);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn duplicate_attach_is_ignored() {
        let (mut manager, hub, _) = manager();
        hub.attach(VirtualDevice::space_mouse("virtual:0"));
        let dev = hub.attach(VirtualDevice::space_mouse("virtual:0"));
        manager.poll();
        assert_eq!(manager.device_count(), 1);
        assert_eq!(hub.open_connections("virtual:0"), 1);

        hub.detach(&dev);
        manager.poll();
        assert_eq!(manager.device_count(), 0);
    }

    #[test]
    fn unknown_detach_is_a_no_op() {
        let (mut manager, hub, _) = manager();
        hub.attach(VirtualDevice::space_mouse("virtual:0"));
        manager.poll();
        hub.detach(&VirtualDevice::space_mouse("virtual:9").native());
        manager.poll();
        assert_eq!(manager.device_count(), 1);
    }

    #[test]
    fn failed_open_is_tracked() {
        let (mut manager, hub, seen) = manager();
        let dev = hub.attach(VirtualDevice::space_mouse("virtual:0").failing_open("0xe00002e2"));
        manager.poll();
        let device = manager.device("virtual:0").unwrap();
        assert!(matches!(device.status(), DeviceStatus::OpenFailed { .. }));

        hub.set_axis(&dev, GenericDesktopUsage::Y, 1.0);
        assert_eq!(manager.poll(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn values_pass_through_unchanged() {
        let (mut manager, hub, seen) = manager();
        let a = hub.attach(VirtualDevice::space_mouse("virtual:a"));
        let b = hub.attach(VirtualDevice::space_mouse("virtual:b"));
        manager.poll();

        hub.press_button(&a, 2);
        hub.set_value(&b, 0x08, 0x4b, 1.0);
        assert_eq!(manager.poll(), 2);
        let seen = seen.borrow();
        assert_eq!(seen[0], ("virtual:a".to_string(), 2, 1.0));
        assert_eq!(seen[1], ("virtual:b".to_string(), 0x4b, 1.0));
    }

    #[test]
    fn failed_scan_still_services_devices() {
        let (mut manager, hub, seen) = manager();
        let dev = hub.attach(VirtualDevice::space_mouse("virtual:0"));
        manager.poll();

        let late = hub.attach(VirtualDevice::space_mouse("virtual:1"));
        hub.fail_next_scan("enumeration busy");
        hub.set_axis(&dev, GenericDesktopUsage::Z, 0.5);
        assert_eq!(manager.poll(), 1);
        assert_eq!(manager.device_count(), 1);
        assert_eq!(seen.borrow().len(), 1);

        // The attach notification is still pending for the next turn.
        hub.set_axis(&late, GenericDesktopUsage::X, 0.5);
        assert_eq!(manager.poll(), 1);
        assert_eq!(manager.device_count(), 2);
    }

    #[test]
    fn stale_token_does_not_clear() {
        let (backend, _hub) = VirtualBackend::new();
        let mut manager = HidManager::new(backend);
        let first = manager.set_delegate(Box::new(Collect(Seen::default())));
        let second = manager.set_delegate(Box::new(Collect(Seen::default())));
        assert!(!manager.clear_delegate(first));
        assert!(manager.has_delegate());
        assert!(manager.clear_delegate(second));
        assert!(!manager.has_delegate());
    }

    #[test]
    fn drop_closes_devices_then_context() {
        let (mut manager, hub, _) = manager();
        hub.attach(VirtualDevice::space_mouse("virtual:0"));
        manager.poll();
        assert_eq!(hub.open_connections("virtual:0"), 1);
        drop(manager);
        assert_eq!(hub.open_connections("virtual:0"), 0);
        assert!(hub.is_closed());
    }
}
