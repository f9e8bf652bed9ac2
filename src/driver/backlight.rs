use crate::driver::{Channel, ChannelKind, ChannelOptions, DeviceOutcome, Error, Reading};
use crate::display::scale::NativeRange;
use brightness::blocking::{Brightness, BrightnessDevice};

pub fn create_channels(_options: ChannelOptions) -> Vec<Box<dyn Channel>> {
    vec![Box::new(BacklightChannel)]
}

/// Devices exposed by the `brightness` crate, which already speak percent
pub struct BacklightChannel;

fn devices() -> Vec<BrightnessDevice> {
    let mut devices = vec![];
    brightness::blocking::brightness_devices().for_each(|d| match d {
        Ok(d) => devices.push(d),
        Err(e) => log::warn!("Unable to open backlight device: {}", e),
    });
    devices
}

impl Channel for BacklightChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Backlight
    }

    fn read(&mut self) -> Result<Reading, Error> {
        let device = devices().into_iter().next().ok_or(Error::NoDevices)?;
        let current = device.get()?;
        log::debug!(
            "Backlight '{}' reports {}%",
            device.device_name().unwrap_or_default(),
            current
        );
        Ok(Reading {
            range: NativeRange::PERCENT,
            current,
        })
    }

    fn write(&mut self, percent: u32) -> Result<Vec<DeviceOutcome>, Error> {
        let devices = devices();
        if devices.is_empty() {
            return Err(Error::NoDevices);
        }
        Ok(devices
            .into_iter()
            .map(|d| {
                let name = d.device_name().unwrap_or_default();
                match d.set(percent) {
                    Ok(()) => DeviceOutcome::success(name, percent),
                    Err(e) => DeviceOutcome::failure(name, &e),
                }
            })
            .collect())
    }
}
