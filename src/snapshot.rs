//! Published motion state.
//!
//! [`StateHandle`] is the slot the aggregator publishes into. Every update
//! replaces the whole [`MotionState`] under one write lock, so a reader on any
//! thread sees either the previous snapshot or the next one, never a mix.
//!
//! # Examples
//! Read the latest state from another thread:
//! ```no_run
//! use multiaxis::StateHandle;
//!
//! fn spawn_reader(handle: StateHandle) {
//!     std::thread::spawn(move || loop {
//!         let s = handle.get();
//!         println!("x={:.2} yaw={:.2}", s.x, s.yaw);
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     });
//! }
//! ```

use crate::motion::MotionState;
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable, thread-safe reader of the published state.
#[derive(Clone, Debug, Default)]
pub struct StateHandle(Arc<RwLock<MotionState>>);

impl StateHandle {
    /// Copy of the latest published state.
    #[inline]
    pub fn get(&self) -> MotionState {
        *self.0.read()
    }

    /// Read-modify-write: copy the current state, let `f` change it, publish
    /// the result as the new state and return it.
    pub(crate) fn update(&self, f: impl FnOnce(&mut MotionState)) -> MotionState {
        let mut slot = self.0.write();
        let mut next = *slot;
        f(&mut next);
        *slot = next;
        next
    }
}
