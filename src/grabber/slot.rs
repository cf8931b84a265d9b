//! Single-slot frame mailbox.
//!
//! The producer (the command queue thread) overwrites the slot with each new
//! frame; consumers read the latest frame, take it once per update tick, or
//! wait for one captured after a given instant. Only the newest frame is
//! kept.

use crate::capture::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct SlotInner {
    frame: Option<Arc<Frame>>,
    new_frame_waiting: bool,
}

/// Holds the most recent frame behind one lock.
#[derive(Default)]
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    arrived: Condvar,
    overwritten: AtomicU64,
}

impl FrameSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the held frame and flags it as waiting.
    pub fn set_frame(&self, frame: Arc<Frame>) {
        let mut inner = self.lock();
        if inner.new_frame_waiting {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        inner.frame = Some(frame);
        inner.new_frame_waiting = true;
        self.arrived.notify_all();
    }

    /// Returns the latest frame, if any.
    pub fn get_frame(&self) -> Option<Arc<Frame>> {
        self.lock().frame.clone()
    }

    /// Returns true if a frame arrived since the last [`take_new`](Self::take_new).
    pub fn has_new_frame(&self) -> bool {
        self.lock().new_frame_waiting
    }

    /// Takes the waiting frame, clearing the waiting flag.
    ///
    /// Returns `None` if nothing arrived since the previous call. The frame
    /// stays in the slot for [`get_frame`](Self::get_frame).
    pub fn take_new(&self) -> Option<Arc<Frame>> {
        let mut inner = self.lock();
        if !inner.new_frame_waiting {
            return None;
        }
        inner.new_frame_waiting = false;
        inner.frame.clone()
    }

    /// Waits until the slot holds a frame captured at or after `since`.
    ///
    /// Returns `None` once `timeout` elapses without such a frame. The
    /// waiting flag is left untouched, so the next update tick still sees
    /// the frame as new.
    pub fn wait_for_fresh(&self, since: Instant, timeout: Duration) -> Option<Arc<Frame>> {
        let mut inner = self.lock();
        // A timeout past the end of the clock means no deadline
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(frame) = inner.frame.as_ref().filter(|f| f.is_fresh_since(since)) {
                return Some(Arc::clone(frame));
            }
            inner = match deadline {
                Some(deadline) => {
                    let remaining = deadline.checked_duration_since(Instant::now())?;
                    if remaining.is_zero() {
                        return None;
                    }
                    self.arrived
                        .wait_timeout(inner, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .arrived
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Number of frames replaced before any consumer took them.
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
