//! Detects volume and mute changes of the default playback device

use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use self::windows::VolumeWatcher;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not supported on this platform")]
    Unsupported,
    #[error("No default playback device")]
    NoDevice,
    #[cfg(windows)]
    #[error("{operation} failed: {source}")]
    Windows {
        operation: &'static str,
        #[source]
        source: ::windows::core::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeState {
    pub muted: bool,
    pub volume_percent: f32,
}

impl VolumeState {
    /// `scalar` is the master volume in the range 0.0 to 1.0
    pub fn from_scalar(muted: bool, scalar: f32) -> Self {
        Self {
            muted,
            volume_percent: scalar.clamp(0.0, 1.0) * 100.0,
        }
    }
}

impl Display for VolumeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.muted {
            write!(f, "Volume is muted.")
        } else {
            write!(f, "Volume changed: {:.0}%", self.volume_percent)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VolumeEvent {
    Changed(VolumeState),
    /// The default playback device was replaced, the watcher must be rebound
    DefaultDeviceChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_to_percent() {
        let state = VolumeState::from_scalar(false, 0.5);
        assert_eq!(state.volume_percent, 50.0);
        assert_eq!(VolumeState::from_scalar(false, 1.7).volume_percent, 100.0);
    }

    #[test]
    fn display_text() {
        assert_eq!(
            VolumeState::from_scalar(true, 0.3).to_string(),
            "Volume is muted."
        );
        assert_eq!(
            VolumeState::from_scalar(false, 0.42).to_string(),
            "Volume changed: 42%"
        );
    }
}
