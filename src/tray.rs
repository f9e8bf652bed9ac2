//! The notification area icon, its context menu and mouse handling

use crate::common::APP_NAME;
use crate::config::BcConfig;
use crate::controller::{BrightnessController, DisplayState, Message};
use crate::display::levels::Direction;
use crate::icon::{read_icon, render, system_theme, Theme};
use crate::{power, startup};
use anyhow::{anyhow, Context};
use image::RgbaImage;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, RwLock};
use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
use win32_utils::error::{check_error, CheckError};
use win32_utils::window::WindowDataExtension;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyState, VK_SHIFT};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    PostMessageW, PostQuitMessage, RegisterClassW, SetWindowLongPtrW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, GWLP_USERDATA, HHOOK, HWND_MESSAGE, MSG,
    MSLLHOOKSTRUCT, WH_MOUSE_LL, WINDOW_EX_STYLE, WINDOW_STYLE, WM_APP, WM_MOUSEWHEEL, WNDCLASSW,
};

/// Posted to the [NotifyWindow] whenever the controller published a new state
const STATE_CHANGED: u32 = WM_APP + 1;

/// Where wheel events over the icon are sent
struct WheelTarget {
    rect: Option<tray_icon::Rect>,
    sender: Sender<Message>,
    step: u32,
}

impl WheelTarget {
    fn contains(&self, x: i32, y: i32) -> bool {
        self.rect.map_or(false, |r| {
            let (x, y) = (x as f64, y as f64);
            x >= r.position.x
                && x < r.position.x + r.size.width as f64
                && y >= r.position.y
                && y < r.position.y + r.size.height as f64
        })
    }
}

static WHEEL_TARGET: Mutex<Option<WheelTarget>> = Mutex::new(None);

unsafe extern "system" fn mouse_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 && wparam.0 as u32 == WM_MOUSEWHEEL {
        let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        let delta = (info.mouseData >> 16) as u16 as i16;
        if let Ok(target) = WHEEL_TARGET.lock() {
            if let Some(target) = target.as_ref() {
                if delta != 0 && target.contains(info.pt.x, info.pt.y) {
                    let change = delta.signum() as i32 * target.step as i32;
                    let _ = target.sender.send(Message::Adjust(change));
                }
            }
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

struct NotifyData {
    target: Option<(Rc<RefCell<Tray>>, Arc<RwLock<DisplayState>>)>,
    /// A state change arrived that has not been drawn yet
    pending: bool,
}

impl NotifyData {
    fn redraw(&mut self) {
        self.pending = true;
        let Some((tray, state)) = &self.target else {
            return;
        };
        if let Ok(mut tray) = tray.try_borrow_mut() {
            let state = state.read().unwrap().clone();
            if let Err(e) = tray.update_look(&state) {
                log::error!("Unable to update the tray icon: {:#}", e);
            }
            self.pending = false;
        }
    }
}

/// Message-only window on the tray thread.
/// Its messages queue up before the tray icon exists and are still dispatched while a modal
/// loop (the open context menu) runs, thread messages are not.
pub struct NotifyWindow {
    hwnd: HWND,
    data: Box<NotifyData>,
}

impl NotifyWindow {
    /// Must be called on the thread that will call [run]
    pub fn create() -> anyhow::Result<Self> {
        let mut data = Box::new(NotifyData {
            target: None,
            pending: false,
        });
        let hwnd = unsafe { create_notify_window(&mut data)? };
        Ok(Self { hwnd, data })
    }

    /// Callback for the controller, asks the tray to redraw from any thread
    pub fn waker(&self) -> impl Fn() + Send + 'static {
        let hwnd = self.hwnd;
        move || {
            if let Err(e) = unsafe { PostMessageW(hwnd, STATE_CHANGED, WPARAM(0), LPARAM(0)) } {
                log::debug!("Unable to notify the tray: {}", e);
            }
        }
    }

    fn attach(&mut self, tray: Rc<RefCell<Tray>>, state: Arc<RwLock<DisplayState>>) {
        self.data.target = Some((tray, state));
    }

    fn redraw_if_pending(&mut self) {
        if self.data.pending {
            self.data.redraw();
        }
    }
}

impl Drop for NotifyWindow {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            log::warn!("Unable to destroy the tray notification window: {}", e);
        }
    }
}

unsafe fn create_notify_window(data: &mut NotifyData) -> anyhow::Result<HWND> {
    let instance = GetModuleHandleW(None)?;
    let window_class = WNDCLASSW {
        hInstance: instance.into(),
        lpszClassName: w!("bc_tray_notify"),
        lpfnWndProc: Some(notify_wndproc),
        ..Default::default()
    };
    let atom = check_error(|| RegisterClassW(&window_class))
        .map_err(|e| anyhow!("RegisterClassW failed: {:?}", e))?;

    let hwnd = CreateWindowExW(
        WINDOW_EX_STYLE::default(),
        PCWSTR(atom as *const u16),
        None,
        WINDOW_STYLE::default(),
        0,
        0,
        0,
        0,
        HWND_MESSAGE,
        None,
        instance,
        None,
    )
    .check_error()
    .map_err(|e| anyhow!("CreateWindowExW failed: {:?}", e))?;

    check_error(|| SetWindowLongPtrW(hwnd, GWLP_USERDATA, data as *mut _ as isize))
        .map_err(|e| anyhow!("SetWindowLongPtrW failed: {:?}", e))?;
    Ok(hwnd)
}

unsafe extern "system" fn notify_wndproc(
    window: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if message == STATE_CHANGED {
        if let Some(data) = window.get_user_data::<NotifyData>() {
            data.redraw();
        }
        return LRESULT(0);
    }
    DefWindowProcW(window, message, wparam, lparam)
}

fn shift_pressed() -> bool {
    unsafe { GetKeyState(VK_SHIFT.0 as i32) < 0 }
}

fn tooltip(current: Option<u32>) -> String {
    match current {
        Some(n) => format!("{APP_NAME} - {n}%"),
        None => APP_NAME.to_owned(),
    }
}

struct TrayMenu {
    levels: Vec<(u32, CheckMenuItem)>,
    turn_off: MenuId,
    startup: CheckMenuItem,
    about: MenuId,
    exit: MenuId,
}

impl TrayMenu {
    /// Levels are listed highest first
    fn build(
        levels: &[u32],
        current: Option<u32>,
        startup_enabled: bool,
    ) -> anyhow::Result<(Menu, Self)> {
        let menu = Menu::new();
        let mut level_items = vec![];
        for level in levels.iter().rev() {
            let item = CheckMenuItem::new(format!("{level}%"), true, Some(*level) == current, None);
            menu.append(&item)?;
            level_items.push((*level, item));
        }
        menu.append(&PredefinedMenuItem::separator())?;
        let turn_off = MenuItem::new("Turn off screen", true, None);
        menu.append(&turn_off)?;
        menu.append(&PredefinedMenuItem::separator())?;
        let startup = CheckMenuItem::new("Start with Windows", true, startup_enabled, None);
        menu.append(&startup)?;
        let about = MenuItem::new("About...", true, None);
        menu.append(&about)?;
        let exit = MenuItem::new("Exit", true, None);
        menu.append(&exit)?;
        Ok((
            menu,
            Self {
                levels: level_items,
                turn_off: turn_off.id().clone(),
                startup,
                about: about.id().clone(),
                exit: exit.id().clone(),
            },
        ))
    }

    fn check_current(&self, current: Option<u32>) {
        for (level, item) in &self.levels {
            item.set_checked(Some(*level) == current);
        }
    }
}

struct Tray {
    icon: TrayIcon,
    menu: TrayMenu,
    menu_levels: Vec<u32>,
    startup_enabled: bool,
    theme: Theme,
    base: RgbaImage,
    /// The brightness the icon was last drawn for
    drawn: Option<Option<u32>>,
}

impl Tray {
    fn create(state: &DisplayState) -> anyhow::Result<Self> {
        let startup_enabled = startup::is_enabled().unwrap_or_else(|e| {
            log::warn!("Unable to read start with Windows: {}", e);
            false
        });
        let (menu, tray_menu) = TrayMenu::build(&state.levels, state.current, startup_enabled)?;
        let theme = system_theme();
        let base = read_icon(theme)?;
        let icon = TrayIconBuilder::new()
            .with_icon(to_icon(render(&base, state.current))?)
            .with_tooltip(tooltip(state.current))
            .with_menu(Box::new(menu))
            .with_menu_on_left_click(false)
            .build()
            .context("Unable to create tray icon")?;
        Ok(Self {
            icon,
            menu: tray_menu,
            menu_levels: state.levels.clone(),
            startup_enabled,
            theme,
            base,
            drawn: Some(state.current),
        })
    }

    fn update_look(&mut self, state: &DisplayState) -> anyhow::Result<()> {
        if state.levels != self.menu_levels {
            let (menu, tray_menu) =
                TrayMenu::build(&state.levels, state.current, self.startup_enabled)?;
            self.icon.set_menu(Some(Box::new(menu)));
            self.menu = tray_menu;
            self.menu_levels = state.levels.clone();
        }
        self.menu.check_current(state.current);
        self.icon.set_tooltip(Some(tooltip(state.current)))?;

        let theme = system_theme();
        if theme != self.theme {
            self.base = read_icon(theme)?;
            self.theme = theme;
            self.drawn = None;
        }
        if self.drawn != Some(state.current) {
            self.icon
                .set_icon(Some(to_icon(render(&self.base, state.current))?))?;
            self.drawn = Some(state.current);
        }
        Ok(())
    }

    /// Returns false once the user chose to exit
    fn handle_menu(
        &mut self,
        event: MenuEvent,
        controller: &BrightnessController,
        config: &BcConfig,
    ) -> bool {
        let id = event.id;
        if let Some((level, _)) = self.menu.levels.iter().find(|(_, item)| *item.id() == id) {
            controller.send(Message::Set(*level, "tray menu"));
        } else if id == self.menu.turn_off {
            if let Err(e) = power::turn_off_screens() {
                log::error!("{:#}", e);
            }
        } else if id == *self.menu.startup.id() {
            self.startup_enabled = startup::toggle(self.startup_enabled);
            self.menu.startup.set_checked(self.startup_enabled);
        } else if id == self.menu.about {
            if let Err(e) = open::that(&config.about_url) {
                log::error!("Unable to open {}: {}", config.about_url, e);
            }
        } else if id == self.menu.exit {
            log::info!("Exit requested from the tray menu");
            return false;
        }
        // Check items toggle themselves when clicked
        self.menu.check_current(controller.current());
        true
    }
}

fn to_icon(image: RgbaImage) -> anyhow::Result<Icon> {
    let (width, height) = image.dimensions();
    Icon::from_rgba(image.into_raw(), width, height).context("Invalid icon image")
}

/// Blocking call, runs the message loop on this thread.
/// `notify` must have been created on this thread and its [NotifyWindow::waker] given to
/// `controller`.
pub fn run(
    controller: &BrightnessController,
    config: Arc<RwLock<BcConfig>>,
    mut notify: NotifyWindow,
) -> anyhow::Result<()> {
    let state = controller.state.read().unwrap().clone();
    let tray = Rc::new(RefCell::new(Tray::create(&state)?));
    notify.attach(tray.clone(), controller.state.clone());

    *WHEEL_TARGET.lock().unwrap() = Some(WheelTarget {
        rect: tray.borrow().icon.rect(),
        sender: controller.sender.clone(),
        step: config.read().unwrap().wheel_step,
    });
    let hook = unsafe {
        let module = GetModuleHandleW(None)?;
        SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook), module, 0)
    }
    .context("Unable to install the mouse wheel hook")?;

    let result = message_loop(&tray, &mut notify, controller, &config);

    unsafe {
        if let Err(e) = UnhookWindowsHookEx(hook) {
            log::warn!("Unable to remove the mouse wheel hook: {}", e);
        }
    }
    *WHEEL_TARGET.lock().unwrap() = None;
    result
}

fn message_loop(
    tray: &RefCell<Tray>,
    notify: &mut NotifyWindow,
    controller: &BrightnessController,
    config: &RwLock<BcConfig>,
) -> anyhow::Result<()> {
    let mut message = MSG::default();
    loop {
        match unsafe { GetMessageW(&mut message, None, 0, 0) }.0 {
            -1 => return Err(anyhow!("GetMessageW failed")),
            0 => return Ok(()),
            _ => unsafe {
                TranslateMessage(&message);
                DispatchMessageW(&message);
            },
        }

        while let Ok(event) = TrayIconEvent::receiver().try_recv() {
            if let TrayIconEvent::Click {
                button,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                let cycle = config.read().unwrap().cycle;
                let direction = match button {
                    MouseButton::Left => Direction::from_forward(!shift_pressed()),
                    MouseButton::Middle => Direction::Backward,
                    _ => continue,
                };
                controller.send(Message::Step { direction, cycle });
            }
        }

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            let config = config.read().unwrap().clone();
            if !tray.borrow_mut().handle_menu(event, controller, &config) {
                unsafe { PostQuitMessage(0) };
            }
        }

        notify.redraw_if_pending();

        // The icon can move when the taskbar changes
        if let Ok(mut target) = WHEEL_TARGET.lock() {
            if let Some(target) = target.as_mut() {
                target.rect = tray.borrow().icon.rect();
                target.step = config.read().unwrap().wheel_step;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use windows::Win32::UI::WindowsAndMessaging::{PeekMessageW, PM_REMOVE};

    #[test]
    fn state_change_from_another_thread_reaches_the_window() {
        let window = NotifyWindow::create().unwrap();
        let wake = window.waker();
        std::thread::spawn(wake).join().unwrap();
        assert!(!window.data.pending);
        unsafe {
            let mut message = MSG::default();
            while PeekMessageW(&mut message, None, 0, 0, PM_REMOVE).into() {
                DispatchMessageW(&message);
            }
        }
        // No tray attached yet, so the redraw is kept for later
        assert!(window.data.pending);
    }

    #[test]
    fn tooltip_text() {
        assert_eq!(tooltip(Some(40)), "Brightness Control - 40%");
        assert_eq!(tooltip(None), "Brightness Control");
    }
}
