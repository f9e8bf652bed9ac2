use crate::config::BcConfig;
use crate::controller::{BrightnessController, Message};
use crate::driver::windows::initialize_com;
use crate::driver::windows::wmi::BrightnessEventWatcher;
use crate::driver::ChannelOptions;
use anyhow::anyhow;
use std::sync::mpsc;
use std::sync::mpsc::sync_channel;
use std::thread::JoinHandle;
use win32_utils::error::{check_error, CheckError};
use win32_utils::window::WindowDataExtension;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, KillTimer, PostQuitMessage,
    RegisterClassW, SendMessageW, SetTimer, SetWindowLongPtrW, CW_USEDEFAULT, GWLP_USERDATA, MSG,
    WINDOW_EX_STYLE, WINDOW_STYLE, WM_APP, WM_DISPLAYCHANGE, WM_TIMER, WNDCLASSW,
};

const EXIT_LOOP: u32 = WM_APP + 999;
const DISPLAY_CHANGE_TIMER: usize = 1;

pub struct EventWatcher {
    thread: Option<JoinHandle<()>>,
    hwnd: HWND,
}

impl EventWatcher {
    pub fn start(controller: &BrightnessController, config: &BcConfig) -> anyhow::Result<Self> {
        let sender = controller.sender.clone();
        let delay_ms = config.display_change_delay_ms.min(u32::MAX as u64) as u32;
        let wmi_range = ChannelOptions::from(config).wmi_range;
        let (tx, rx) = sync_channel(0);

        let thread = std::thread::spawn(move || {
            if let Err(e) = initialize_com() {
                log::error!("{}", e);
            }

            // Brightness changes made elsewhere, e.g. by laptop hotkeys
            let events_sender = sender.clone();
            let _brightness_events = BrightnessEventWatcher::start(wmi_range, move |percent| {
                let _ = events_sender.send(Message::Changed(percent, "WmiMonitorBrightnessEvent"));
            })
            .map_err(|e| log::warn!("Unable to watch WMI brightness events: {}", e))
            .ok();

            let mut window_data = Box::new(WindowData { sender, delay_ms });
            let hwnd = match unsafe { create_window(&mut window_data) } {
                Ok(hwnd) => hwnd,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };
            let _ = tx.send(Ok(hwnd));

            unsafe {
                let mut message = MSG::default();
                while GetMessageW(&mut message, None, 0, 0).into() {
                    DispatchMessageW(&message);
                }
            }
            log::debug!("EventWatcher thread exiting");
        });

        let hwnd = rx
            .recv()
            .map_err(|_| anyhow!("EventWatcher thread exited unexpectedly"))??;
        Ok(EventWatcher {
            thread: Some(thread),
            hwnd,
        })
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        log::info!("Stopping EventWatcher");
        unsafe { SendMessageW(self.hwnd, EXIT_LOOP, None, None) };
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("EventWatcher thread panicked");
            }
        }
    }
}

struct WindowData {
    sender: mpsc::Sender<Message>,
    delay_ms: u32,
}

unsafe fn create_window(window_data: &mut WindowData) -> anyhow::Result<HWND> {
    // Create Window Class
    let instance = GetModuleHandleW(None)?;
    let window_class = WNDCLASSW {
        hInstance: instance.into(),
        lpszClassName: w!("bc_event_watcher"),
        lpfnWndProc: Some(wndproc),
        ..Default::default()
    };
    let atom = check_error(|| RegisterClassW(&window_class))
        .map_err(|e| anyhow!("RegisterClassW failed: {:?}", e))?;

    // Create window
    let hwnd = CreateWindowExW(
        WINDOW_EX_STYLE::default(),
        PCWSTR(atom as *const u16),
        None,
        WINDOW_STYLE::default(),
        CW_USEDEFAULT,
        CW_USEDEFAULT,
        CW_USEDEFAULT,
        CW_USEDEFAULT,
        None,
        None,
        instance,
        None,
    )
    .check_error()
    .map_err(|e| anyhow!("CreateWindowExW failed: {:?}", e))?;

    // Register Window data
    check_error(|| SetWindowLongPtrW(hwnd, GWLP_USERDATA, window_data as *mut _ as isize))
        .map_err(|e| anyhow!("SetWindowLongPtrW failed: {:?}", e))?;
    Ok(hwnd)
}

unsafe extern "system" fn wndproc(
    window: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if let Some(window_data) = window.get_user_data::<WindowData>() {
        match message {
            WM_DISPLAYCHANGE => {
                // Monitors take a moment to become reachable, repeated changes restart the timer
                log::info!("Detected possible display change (WM_DISPLAYCHANGE)");
                SetTimer(window, DISPLAY_CHANGE_TIMER, window_data.delay_ms, None);
            }
            WM_TIMER if wparam.0 == DISPLAY_CHANGE_TIMER => {
                let _ = KillTimer(window, DISPLAY_CHANGE_TIMER);
                let _ = window_data
                    .sender
                    .send(Message::Refresh("WM_DISPLAYCHANGE"));
            }
            EXIT_LOOP => {
                PostQuitMessage(0);
            }
            _ => {}
        }
    }
    DefWindowProcW(window, message, wparam, lparam)
}
