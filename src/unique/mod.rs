//! Utility to ensure a single instance of Brightness Control is running per session

use thiserror::Error;
use win32_utils::instance::UniqueInstance;

const APP_ID: &str = "brightness-control";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to check if Brightness Control is already running: {0}")]
    PlatformError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Brightness Control is already running")]
    AlreadyRunning,
}

/// Held for the lifetime of the application
#[allow(dead_code)]
pub struct BcUniqueInstance(UniqueInstance);

impl BcUniqueInstance {
    pub fn try_acquire() -> Result<Self, Error> {
        match UniqueInstance::acquire_unique_to_session(APP_ID) {
            Ok(u) => Ok(BcUniqueInstance(u)),
            Err(win32_utils::instance::Error::AlreadyExists) => Err(Error::AlreadyRunning),
            Err(e) => Err(Error::PlatformError(Box::new(e))),
        }
    }
}
