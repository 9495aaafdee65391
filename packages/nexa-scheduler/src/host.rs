use crate::Host;
use crate::error::HostError;
use crate::queue::{Callback, TaskQueue};
use std::time::Instant;

/// A deterministic, in-process host event loop.
///
/// One turn runs pending microtasks, then at most one macrotask, then one
/// render if an animation frame was requested. A microtask checkpoint follows
/// every macrotask and every animation-frame callback.
pub struct LocalHost {
    microtasks: TaskQueue,
    macrotasks: TaskQueue,
    animation_frames: TaskQueue,
    started: Instant,
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHost {
    pub fn new() -> Self {
        Self {
            microtasks: TaskQueue::new(),
            macrotasks: TaskQueue::new(),
            animation_frames: TaskQueue::new(),
            started: Instant::now(),
        }
    }

    /// Runs microtask callbacks until none remain. Returns how many ran.
    pub fn perform_microtask_checkpoint(&self) -> usize {
        let mut ran = 0;
        while let Some(callback) = self.microtasks.pop() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Runs the oldest macrotask callback, then a microtask checkpoint.
    pub fn run_macrotask(&self) -> bool {
        match self.macrotasks.pop() {
            Some(callback) => {
                callback();
                self.perform_microtask_checkpoint();
                true
            }
            None => false,
        }
    }

    /// Runs the animation-frame callbacks requested before this call.
    /// Callbacks requested while rendering wait for the next render.
    pub fn render(&self) -> usize {
        let batch = self.animation_frames.take_batch();
        let ran = batch.len();
        for callback in batch {
            callback();
            self.perform_microtask_checkpoint();
        }
        ran
    }

    /// Runs one host-loop turn. Returns whether work is still pending.
    pub fn tick(&self) -> bool {
        self.perform_microtask_checkpoint();
        self.run_macrotask();
        if self.has_pending_frame() {
            self.render();
        }
        !self.is_idle()
    }

    /// Turns the loop until idle. Returns the number of turns taken.
    pub fn run_until_idle(&self, max_turns: usize) -> Result<usize, HostError> {
        let mut turns = 0;
        while !self.is_idle() {
            if turns == max_turns {
                return Err(HostError::TurnLimitExceeded(max_turns));
            }
            self.tick();
            turns += 1;
        }
        Ok(turns)
    }

    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.macrotasks.is_empty() && self.animation_frames.is_empty()
    }

    pub fn has_pending_frame(&self) -> bool {
        !self.animation_frames.is_empty()
    }

    pub fn pending_macrotasks(&self) -> usize {
        self.macrotasks.len()
    }

    pub fn pending_animation_frames(&self) -> usize {
        self.animation_frames.len()
    }

    /// Milliseconds since the host was created.
    pub fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Host for LocalHost {
    fn request_microtask(&self, callback: Callback) {
        self.microtasks.push(callback);
    }

    fn request_macrotask(&self, callback: Callback) {
        self.macrotasks.push(callback);
    }

    fn request_animation_frame(&self, callback: Callback) {
        self.animation_frames.push(callback);
    }
}
