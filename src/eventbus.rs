//! Observer registry for published motion updates.
//!
//! Observers are boxed [`MotionListener`]s owned by the bus and addressed by
//! the [`ListenerId`] returned at registration. Nothing in the crate keeps a
//! reference back to the observer's owner; revoking the id is the only way a
//! registration ends (besides dropping the aggregator).

use crate::motion::{MotionState, StateAxis};
use serde::Serialize;
use std::collections::BTreeMap;

/// One published update: which device moved which state axis, and the full
/// state after the change.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MotionEvent {
    /// Path of the source device.
    pub device: String,
    pub axis: StateAxis,
    pub state: MotionState,
}

/// Trait for reacting to motion updates.
pub trait MotionListener: Send {
    fn on_motion(&mut self, event: &MotionEvent);
}

impl<F> MotionListener for F
where
    F: FnMut(&MotionEvent) + Send,
{
    fn on_motion(&mut self, event: &MotionEvent) {
        self(event)
    }
}

/// Determines which updates a listener wants to receive.
#[derive(Debug, Clone, Copy)]
pub enum AxisFilter {
    All,
    Translation,
    Rotation,
    Custom(fn(&MotionEvent) -> bool),
}

impl AxisFilter {
    fn passes(&self, event: &MotionEvent) -> bool {
        match self {
            AxisFilter::All => true,
            AxisFilter::Translation => event.axis.is_translation(),
            AxisFilter::Rotation => event.axis.is_rotation(),
            AxisFilter::Custom(f) => f(event),
        }
    }
}

/// Subscription token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    listener: Box<dyn MotionListener>,
    enabled: bool,
    filter: AxisFilter,
    tag: Option<String>, // device path
}

#[derive(Default)]
pub struct MotionBus {
    next_id: u64,
    listeners: BTreeMap<ListenerId, ListenerEntry>,
}

impl MotionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener with a filter and an optional device path tag.
    pub fn add_listener(
        &mut self,
        listener: impl MotionListener + 'static,
        filter: AxisFilter,
        tag: Option<String>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                tag,
            },
        );
        id
    }

    /// Unregisters a listener. Returns `false` if `id` was already gone.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Enables a previously registered listener.
    pub fn enable(&mut self, id: ListenerId) -> bool {
        self.set_enabled(id, true)
    }

    /// Disables (mutes) a listener without removing it.
    pub fn disable(&mut self, id: ListenerId) -> bool {
        self.set_enabled(id, false)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn set_enabled(&mut self, id: ListenerId, enabled: bool) -> bool {
        match self.listeners.get_mut(&id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Emits one event to all active and matching listeners, in registration order.
    pub fn emit(&mut self, event: &MotionEvent) {
        for entry in self.listeners.values_mut() {
            if !entry.enabled {
                continue;
            }
            if let Some(ref wanted) = entry.tag {
                if event.device != *wanted {
                    continue;
                }
            }
            if entry.filter.passes(event) {
                entry.listener.on_motion(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn event(device: &str, axis: StateAxis) -> MotionEvent {
        MotionEvent {
            device: device.to_string(),
            axis,
            state: MotionState::default(),
        }
    }

    fn recorder(
        bus: &mut MotionBus,
        filter: AxisFilter,
        tag: Option<&str>,
    ) -> (ListenerId, Arc<Mutex<Vec<StateAxis>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = bus.add_listener(
            move |e: &MotionEvent| sink.lock().push(e.axis),
            filter,
            tag.map(str::to_string),
        );
        (id, seen)
    }

    #[test]
    fn filters_by_axis_kind() {
        let mut bus = MotionBus::new();
        let (_, moves) = recorder(&mut bus, AxisFilter::Translation, None);
        let (_, turns) = recorder(&mut bus, AxisFilter::Rotation, None);
        let (_, yaw_only) =
            recorder(&mut bus, AxisFilter::Custom(|e| e.axis == StateAxis::Yaw), None);

        for axis in [StateAxis::X, StateAxis::Yaw, StateAxis::Z, StateAxis::Pitch] {
            bus.emit(&event("a", axis));
        }
        assert_eq!(*moves.lock(), vec![StateAxis::X, StateAxis::Z]);
        assert_eq!(*turns.lock(), vec![StateAxis::Yaw, StateAxis::Pitch]);
        assert_eq!(*yaw_only.lock(), vec![StateAxis::Yaw]);
    }

    #[test]
    fn tag_selects_device() {
        let mut bus = MotionBus::new();
        let (_, seen) = recorder(&mut bus, AxisFilter::All, Some("b"));
        bus.emit(&event("a", StateAxis::X));
        bus.emit(&event("b", StateAxis::Y));
        assert_eq!(*seen.lock(), vec![StateAxis::Y]);
    }

    #[test]
    fn disable_enable_remove() {
        let mut bus = MotionBus::new();
        let (id, seen) = recorder(&mut bus, AxisFilter::All, None);

        assert!(bus.disable(id));
        bus.emit(&event("a", StateAxis::X));
        assert!(seen.lock().is_empty());

        assert!(bus.enable(id));
        bus.emit(&event("a", StateAxis::Roll));
        assert_eq!(*seen.lock(), vec![StateAxis::Roll]);

        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
        assert!(!bus.enable(id));
        bus.emit(&event("a", StateAxis::X));
        assert_eq!(seen.lock().len(), 1);
        assert!(bus.is_empty());
    }
}
