//! DDC/CI through the high level monitor configuration API (dxva2)

use crate::display::scale::NativeRange;
use crate::driver::windows::ResultExt;
use crate::driver::{Channel, ChannelKind, DeviceOutcome, Error, Reading};
use windows::Win32::Devices::Display::{
    DestroyPhysicalMonitor, GetMonitorBrightness, GetNumberOfPhysicalMonitorsFromHMONITOR,
    GetPhysicalMonitorsFromHMONITOR, SetMonitorBrightness, PHYSICAL_MONITOR,
};
use windows::Win32::Foundation::{BOOL, HANDLE, LPARAM, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOF_PRIMARY,
};

pub struct DdcChannel;

/// Handle is released on drop
struct PhysicalMonitor {
    handle: HANDLE,
    description: String,
}

impl PhysicalMonitor {
    fn read(&self) -> Result<Reading, Error> {
        let (mut min, mut current, mut max) = (0, 0, 0);
        unsafe {
            BOOL(GetMonitorBrightness(
                self.handle,
                &mut min,
                &mut current,
                &mut max,
            ))
            .ok()
            .op("GetMonitorBrightness")?;
        }
        Ok(Reading {
            range: NativeRange::new(min, max),
            current,
        })
    }

    fn write(&self, percent: u32) -> Result<u32, Error> {
        let native = self.read()?.range.from_percent(percent);
        unsafe {
            BOOL(SetMonitorBrightness(self.handle, native))
                .ok()
                .op("SetMonitorBrightness")?;
        }
        Ok(native)
    }
}

impl Drop for PhysicalMonitor {
    fn drop(&mut self) {
        let _ = unsafe { DestroyPhysicalMonitor(self.handle) };
    }
}

unsafe extern "system" fn enum_monitors(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let monitors = &mut *(data.0 as *mut Vec<HMONITOR>);
    monitors.push(hmonitor);
    TRUE
}

fn is_primary(hmonitor: HMONITOR) -> bool {
    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    unsafe { GetMonitorInfoW(hmonitor, &mut info).as_bool() }
        && info.dwFlags & MONITORINFOF_PRIMARY != 0
}

fn physical_monitors_of(hmonitor: HMONITOR) -> Result<Vec<PhysicalMonitor>, Error> {
    let mut count = 0;
    unsafe {
        BOOL(GetNumberOfPhysicalMonitorsFromHMONITOR(hmonitor, &mut count))
            .ok()
            .op("GetNumberOfPhysicalMonitorsFromHMONITOR")?;
    }
    let mut raw = vec![PHYSICAL_MONITOR::default(); count as usize];
    if !raw.is_empty() {
        unsafe {
            BOOL(GetPhysicalMonitorsFromHMONITOR(hmonitor, &mut raw))
                .ok()
                .op("GetPhysicalMonitorsFromHMONITOR")?;
        }
    }
    Ok(raw
        .into_iter()
        .map(|p| PhysicalMonitor {
            handle: p.hPhysicalMonitor,
            description: String::from_utf16_lossy(&p.szPhysicalMonitorDescription)
                .trim_end_matches('\0')
                .to_owned(),
        })
        .collect())
}

/// Every physical monitor, those of the primary display first
fn physical_monitors() -> Result<Vec<PhysicalMonitor>, Error> {
    let mut hmonitors = Vec::<HMONITOR>::new();
    let ok = unsafe {
        EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(enum_monitors),
            LPARAM(&mut hmonitors as *mut _ as isize),
        )
    };
    ok.ok().op("EnumDisplayMonitors")?;
    hmonitors.sort_by_key(|h| !is_primary(*h));

    let mut monitors = vec![];
    for hmonitor in hmonitors {
        match physical_monitors_of(hmonitor) {
            Ok(p) => monitors.extend(p),
            Err(e) => log::warn!("Skipping display monitor {:?}: {}", hmonitor, e),
        }
    }
    log::debug!(
        "Physical monitors: {:?}",
        monitors.iter().map(|m| &m.description).collect::<Vec<_>>()
    );
    Ok(monitors)
}

impl Channel for DdcChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Ddc
    }

    fn read(&mut self) -> Result<Reading, Error> {
        physical_monitors()?
            .first()
            .ok_or(Error::NoDevices)?
            .read()
    }

    fn write(&mut self, percent: u32) -> Result<Vec<DeviceOutcome>, Error> {
        let monitors = physical_monitors()?;
        if monitors.is_empty() {
            return Err(Error::NoDevices);
        }
        Ok(monitors
            .iter()
            .map(|m| match m.write(percent) {
                Ok(native) => DeviceOutcome::success(m.description.clone(), native),
                Err(e) => DeviceOutcome::failure(m.description.clone(), &e),
            })
            .collect())
    }
}
