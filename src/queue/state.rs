//! Device lifecycle state.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Current phase of the device behind a grabber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No device session.
    Closed,
    /// Open command running.
    Opening,
    /// Open and idle, not streaming.
    Open,
    /// Open with free-run capture active.
    Capturing,
    /// Close command running.
    Closing,
    /// The owning grabber is being dropped. Terminal.
    Deleting,
}

impl DeviceState {
    /// Returns true while the device is open, streaming or not.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open | Self::Capturing)
    }

    /// Numeric code exported as a metrics gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Opening => 1,
            Self::Open => 2,
            Self::Capturing => 3,
            Self::Closing => 4,
            Self::Deleting => 5,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Capturing => "capturing",
            Self::Closing => "closing",
            Self::Deleting => "deleting",
        };
        f.write_str(name)
    }
}

/// Lock-guarded lifecycle state shared by the grabber and its worker.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<DeviceState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState::Closed),
        }
    }

    pub(crate) fn get(&self) -> DeviceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next` unless teardown has begun. Returns whether the
    /// transition happened.
    pub(crate) fn transition(&self, next: DeviceState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == DeviceState::Deleting {
            return false;
        }
        if *state != next {
            tracing::info!(from = %*state, to = %next, "device state changed");
            *state = next;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_closed() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), DeviceState::Closed);
        assert!(!cell.get().is_open());
    }

    #[test]
    fn test_deleting_is_terminal() {
        let cell = StateCell::new();
        assert!(cell.transition(DeviceState::Capturing));
        assert!(cell.get().is_open());

        assert!(cell.transition(DeviceState::Deleting));
        assert!(!cell.transition(DeviceState::Closed));
        assert_eq!(cell.get(), DeviceState::Deleting);
    }
}
