pub mod ddc;
pub mod wmi;

use crate::driver::{Channel, ChannelOptions, Error};
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::Security::PSECURITY_DESCRIPTOR;
use windows::Win32::System::Com::{
    CoInitializeEx, CoInitializeSecurity, COINIT_MULTITHREADED, EOAC_NONE,
    RPC_C_AUTHN_LEVEL_DEFAULT, RPC_C_IMP_LEVEL_IMPERSONATE,
};

pub(crate) trait ResultExt<T> {
    fn op(self, operation: &'static str) -> Result<T, Error>;
}

impl<T> ResultExt<T> for windows::core::Result<T> {
    fn op(self, operation: &'static str) -> Result<T, Error> {
        self.map_err(|source| Error::Windows { operation, source })
    }
}

/// Joins the multithreaded apartment on the calling thread
pub fn initialize_com() -> Result<(), Error> {
    match unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) } {
        Err(e) if e.code() == RPC_E_CHANGED_MODE => {
            log::debug!("COM already initialized with a different apartment model");
            Ok(())
        }
        r => r.op("CoInitializeEx"),
    }
}

/// Process wide COM security, required for WMI event callbacks. Must run before any
/// other COM call in the process; later calls are ignored.
pub fn initialize_com_security() {
    let result = unsafe {
        CoInitializeSecurity(
            PSECURITY_DESCRIPTOR::default(),
            -1,
            None,
            None,
            RPC_C_AUTHN_LEVEL_DEFAULT,
            RPC_C_IMP_LEVEL_IMPERSONATE,
            None,
            EOAC_NONE,
            None,
        )
    };
    if let Err(e) = result {
        log::warn!("CoInitializeSecurity failed: {}", e);
    }
}

/// DDC/CI first, it is the preferred source of the current brightness
pub fn create_channels(options: ChannelOptions) -> Vec<Box<dyn Channel>> {
    if let Err(e) = initialize_com() {
        log::error!("{}", e);
    }
    let mut channels: Vec<Box<dyn Channel>> = vec![Box::new(ddc::DdcChannel)];
    match wmi::WmiChannel::connect(options.wmi_range) {
        Ok(wmi) => channels.push(Box::new(wmi)),
        Err(e) => log::warn!("WMI brightness channel unavailable: {}", e),
    }
    channels
}
