//! "Start with Windows", stored as a value of the current user's `Run` key

use std::path::Path;
use thiserror::Error;

pub const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

pub const VALUE_NAME: &str = "BrightnessControl";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not supported on this platform")]
    Unsupported,
    #[error("Unable to determine the executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[cfg(windows)]
    #[error("Unable to access the registry: {0}")]
    Registry(#[source] ::windows::core::Error),
}

/// Whether a `Run` value launches `exe`
pub fn launches(value: Option<&str>, exe: &Path) -> bool {
    value.map_or(false, |v| Path::new(v) == exe)
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        use crate::registry::RegKey;

        fn current_exe() -> Result<std::path::PathBuf, Error> {
            std::env::current_exe().map_err(Error::CurrentExe)
        }

        pub fn is_enabled() -> Result<bool, Error> {
            let exe = current_exe()?;
            let key = RegKey::open_read(RUN_KEY).map_err(Error::Registry)?;
            let value = key.get_string(VALUE_NAME).map_err(Error::Registry)?;
            Ok(launches(value.as_deref(), &exe))
        }

        pub fn set_enabled(enabled: bool) -> Result<(), Error> {
            let key = RegKey::open_write(RUN_KEY).map_err(Error::Registry)?;
            if enabled {
                let exe = current_exe()?;
                key.set_string(VALUE_NAME, &exe.to_string_lossy())
                    .map_err(Error::Registry)?;
            } else {
                key.delete_value(VALUE_NAME).map_err(Error::Registry)?;
            }
            log::info!("Start with Windows {}", if enabled { "enabled" } else { "disabled" });
            Ok(())
        }
    } else {
        pub fn is_enabled() -> Result<bool, Error> {
            Err(Error::Unsupported)
        }

        pub fn set_enabled(_enabled: bool) -> Result<(), Error> {
            Err(Error::Unsupported)
        }
    }
}

/// Toggles the setting, returning the state that is now in effect
pub fn toggle(currently_enabled: bool) -> bool {
    let wanted = !currently_enabled;
    match set_enabled(wanted) {
        Ok(()) => wanted,
        Err(e) => {
            log::error!("Unable to change start with Windows: {}", e);
            currently_enabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn value_must_match_executable() {
        let exe = PathBuf::from(r"C:\Program Files\Brightness Control\bc.exe");
        assert!(launches(
            Some(r"C:\Program Files\Brightness Control\bc.exe"),
            &exe
        ));
        assert!(!launches(Some(r"C:\Other\bc.exe"), &exe));
        assert!(!launches(None, &exe));
    }

    #[cfg(not(windows))]
    #[test]
    fn toggle_keeps_state_when_unsupported() {
        assert!(!toggle(false));
        assert!(toggle(true));
    }
}
