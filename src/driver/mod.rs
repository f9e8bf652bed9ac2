//! Brightness control channels
//!
//! A channel is one OS facility that can read and write monitor brightness:
//! - DDC/CI through the monitor configuration API (Windows)
//! - The WMI brightness methods used by laptop panels (Windows)
//! - The `brightness` crate backlight devices (other platforms)

use crate::config::BcConfig;
use crate::display::scale::NativeRange;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[cfg(test)]
pub mod mock;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        pub mod windows;
        use self::windows as platform;
    } else {
        pub mod backlight;
        use self::backlight as platform;
    }
}

pub use platform::create_channels;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No devices found")]
    NoDevices,
    #[error("Not supported on this platform")]
    Unsupported,
    #[error("Missing property '{0}'")]
    MissingProperty(&'static str),
    #[cfg(windows)]
    #[error("{operation} failed: {source}")]
    Windows {
        operation: &'static str,
        #[source]
        source: ::windows::core::Error,
    },
    #[cfg(not(windows))]
    #[error(transparent)]
    Backlight(#[from] brightness::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Ddc,
    Wmi,
    Backlight,
}

impl Display for ChannelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChannelKind::Ddc => "DDC/CI",
            ChannelKind::Wmi => "WMI",
            ChannelKind::Backlight => "Backlight",
        })
    }
}

/// A raw reading from the primary device of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub range: NativeRange,
    pub current: u32,
}

impl Reading {
    pub fn percent(&self) -> u32 {
        self.range.to_percent(self.current)
    }
}

/// The result of writing brightness to a single device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOutcome {
    pub device: String,
    pub native_value: Option<u32>,
    pub error: Option<String>,
}

impl DeviceOutcome {
    pub fn success(device: String, native_value: u32) -> Self {
        Self {
            device,
            native_value: Some(native_value),
            error: None,
        }
    }

    pub fn failure<E: std::error::Error>(device: String, error: &E) -> Self {
        Self {
            device,
            native_value: None,
            error: Some(error.to_string()),
        }
    }
}

pub trait Channel {
    fn kind(&self) -> ChannelKind;

    /// Reads the range and current value of the primary device in native units
    fn read(&mut self) -> Result<Reading, Error>;

    /// Writes the brightness to every device of this channel.
    /// Failures of individual devices are reported in the outcomes.
    fn write(&mut self, percent: u32) -> Result<Vec<DeviceOutcome>, Error>;
}

/// Channel settings taken from the config
#[derive(Debug, Clone, Copy)]
pub struct ChannelOptions {
    pub wmi_range: NativeRange,
}

impl From<&BcConfig> for ChannelOptions {
    fn from(config: &BcConfig) -> Self {
        Self {
            wmi_range: NativeRange::new(0, config.wmi_reported_max),
        }
    }
}
