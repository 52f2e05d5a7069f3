//! Tracing-backed motion listener.

use crate::eventbus::{MotionEvent, MotionListener};
use tracing::debug;

/// A simple listener that logs every motion update.
#[derive(Debug, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Logger
    }
}

impl MotionListener for Logger {
    fn on_motion(&mut self, event: &MotionEvent) {
        let s = &event.state;
        debug!(
            device = %event.device,
            axis = %event.axis,
            "x={:.3} y={:.3} z={:.3} pitch={:.3} yaw={:.3} roll={:.3}",
            s.x,
            s.y,
            s.z,
            s.pitch,
            s.yaw,
            s.roll
        );
    }
}
