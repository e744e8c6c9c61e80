//! Per-frame animation loop bookkeeping.
//!
//! egui calls `update` once per displayed frame while continuous repaint is
//! requested. The driver turns those frames into ticks for the one loop that
//! is currently running, and owns the animation phase the node jitter is
//! derived from.

/// Identifies one started loop. A handle whose loop was stopped never ticks again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopHandle {
    id: u64,
}

#[derive(Debug, Default)]
pub struct AnimationDriver {
    phase: u64,
    active: Option<u64>,
    next_loop_id: u64,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a loop. Any loop that is still running is cancelled first, so at
    /// most one loop exists at a time.
    pub fn start(&mut self) -> LoopHandle {
        if let Some(previous) = self.active.take() {
            log::debug!("Animation loop {} replaced", previous);
        }
        self.next_loop_id += 1;
        self.active = Some(self.next_loop_id);
        LoopHandle { id: self.next_loop_id }
    }

    /// Stop the loop behind `handle`. Returns false if it was not running.
    pub fn stop(&mut self, handle: LoopHandle) -> bool {
        if self.active == Some(handle.id) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Advance the phase by one for a running loop and return the new phase.
    /// Cancelled handles get `None` and leave the phase untouched.
    pub fn tick(&mut self, handle: LoopHandle) -> Option<u64> {
        if self.active != Some(handle.id) {
            return None;
        }
        self.phase = self.phase.wrapping_add(1);
        Some(self.phase)
    }

    pub fn phase(&self) -> u64 {
        self.phase
    }

    #[cfg(test)]
    pub fn is_running(&self, handle: LoopHandle) -> bool {
        self.active == Some(handle.id)
    }

    #[cfg(test)]
    pub fn running_loops(&self) -> usize {
        usize::from(self.active.is_some())
    }
}
