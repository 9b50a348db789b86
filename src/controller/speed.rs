use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared fast-mode switch.
///
/// Clones control the same switch, so one can be handed to another task while the controller
/// is busy with a move. A move reads the switch once, when its duration is planned.
#[derive(Debug, Clone, Default)]
pub struct SpeedSelector(Arc<AtomicBool>);

impl SpeedSelector {
    pub fn set_fast(&self, fast: bool) {
        self.0.store(fast, Ordering::Relaxed);
    }

    pub fn is_fast(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
