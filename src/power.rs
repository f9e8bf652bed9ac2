//! Turning the screens off

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        use windows::Win32::Foundation::{LPARAM, WPARAM};
        use windows::Win32::UI::WindowsAndMessaging::{
            SendMessageW, HWND_BROADCAST, SC_MONITORPOWER, WM_SYSCOMMAND,
        };

        /// `SC_MONITORPOWER` argument that powers the displays off
        const MONITOR_OFF: isize = 2;

        pub fn turn_off_screens() -> anyhow::Result<()> {
            log::info!("Turning off screens");
            unsafe {
                SendMessageW(
                    HWND_BROADCAST,
                    WM_SYSCOMMAND,
                    WPARAM(SC_MONITORPOWER as usize),
                    LPARAM(MONITOR_OFF),
                );
            }
            Ok(())
        }
    } else {
        pub fn turn_off_screens() -> anyhow::Result<()> {
            anyhow::bail!("Turning off screens is not supported on this platform")
        }
    }
}
