//! Reconciles the brightness channels into a single 0-100% brightness value

pub mod levels;
pub mod scale;

use crate::config::BcConfig;
use crate::display::levels::{Capabilities, Direction};
use crate::driver::{Channel, ChannelKind, DeviceOutcome, Reading};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Brightness events caused by our own writes arrive shortly after them, converted from a
/// coarser scale. Events within this period of a write are not recorded.
pub const OWN_WRITE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    pub devices: Vec<DeviceOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetReport {
    pub brightness: u32,
    pub channels: Vec<ChannelReport>,
}

impl SetReport {
    /// Whether at least one device accepted the new brightness
    pub fn succeeded(&self) -> bool {
        self.channels
            .iter()
            .flat_map(|c| c.devices.iter())
            .any(|d| d.error.is_none())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub channel: ChannelKind,
    pub reading: Option<Reading>,
    pub percent: Option<u32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayStatus {
    pub capabilities: Capabilities,
    pub channels: Vec<ChannelStatus>,
}

pub struct Display {
    channels: Vec<Box<dyn Channel>>,
    capabilities: Capabilities,
    last_write: Option<Instant>,
}

impl Display {
    /// Channels are consulted in order, the first one is the preferred source of the
    /// current brightness
    pub fn probe(channels: Vec<Box<dyn Channel>>) -> Self {
        let mut display = Self {
            channels,
            capabilities: Capabilities::default(),
            last_write: None,
        };
        display.refresh();
        display
    }

    /// Re-reads every channel. DDC/CI monitors that do not support brightness report 0, so a
    /// DDC/CI value is only trusted when it is non-zero.
    pub fn refresh(&mut self) -> DisplayStatus {
        let mut current = None;
        let statuses: Vec<ChannelStatus> = self
            .channels
            .iter_mut()
            .map(|channel| match channel.read() {
                Ok(reading) => {
                    let percent = reading.percent();
                    log::debug!(
                        "{} reading: {:?} ({}%)",
                        channel.kind(),
                        reading,
                        percent
                    );
                    if current.is_none() && (percent > 0 || channel.kind() != ChannelKind::Ddc) {
                        current = Some(percent);
                    }
                    ChannelStatus {
                        channel: channel.kind(),
                        reading: Some(reading),
                        percent: Some(percent),
                        error: None,
                    }
                }
                Err(e) => {
                    log::warn!("Unable to read brightness via {}: {}", channel.kind(), e);
                    ChannelStatus {
                        channel: channel.kind(),
                        reading: None,
                        percent: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();
        self.capabilities = Capabilities {
            current,
            ..Capabilities::default()
        };
        match current {
            Some(c) => log::info!("Current brightness is {}%", c),
            None => log::warn!("Unable to determine the current brightness"),
        }
        self.status_with(statuses)
    }

    fn status_with(&self, channels: Vec<ChannelStatus>) -> DisplayStatus {
        DisplayStatus {
            capabilities: self.capabilities,
            channels,
        }
    }

    /// Snapshot of the capabilities and a fresh reading of every channel
    pub fn status(&mut self) -> DisplayStatus {
        self.refresh()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn current(&self) -> Option<u32> {
        self.capabilities.current
    }

    pub fn levels(&self, config: &BcConfig) -> Vec<u32> {
        match config.level_count {
            Some(count) => levels::evenly_spaced(&self.capabilities, count),
            None => levels::default_levels(&config.levels, &self.capabilities),
        }
    }

    /// Writes through every channel. The value is recorded as current even if all channels fail.
    pub fn set(&mut self, percent: u32) -> SetReport {
        let percent = percent.clamp(self.capabilities.minimum, self.capabilities.maximum);
        self.capabilities.current = Some(percent);
        self.last_write = Some(Instant::now());
        let channels = self
            .channels
            .iter_mut()
            .map(|channel| {
                let kind = channel.kind();
                match channel.write(percent) {
                    Ok(devices) => {
                        for d in &devices {
                            match &d.error {
                                None => log::info!(
                                    "Set {} brightness of '{}' to {}% ({:?})",
                                    kind,
                                    d.device,
                                    percent,
                                    d.native_value
                                ),
                                Some(e) => log::error!(
                                    "Failed to set {} brightness of '{}': {}",
                                    kind,
                                    d.device,
                                    e
                                ),
                            }
                        }
                        ChannelReport {
                            channel: kind,
                            devices,
                            error: None,
                        }
                    }
                    Err(e) => {
                        log::warn!("Unable to set brightness via {}: {}", kind, e);
                        ChannelReport {
                            channel: kind,
                            devices: vec![],
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();
        SetReport {
            brightness: percent,
            channels,
        }
    }

    pub fn step(&mut self, levels: &[u32], direction: Direction, cycle: bool) -> Option<SetReport> {
        let target = levels::next_level(levels, self.current(), direction, cycle)?;
        Some(self.set(target))
    }

    pub fn adjust(&mut self, delta: i32) -> SetReport {
        let target = levels::adjust(self.current(), delta);
        self.set(target)
    }

    /// Records a brightness change made outside this application.
    /// Returns false when it was ignored as the echo of our own write.
    pub fn external_change(&mut self, percent: u32) -> bool {
        self.external_change_at(percent, Instant::now())
    }

    fn external_change_at(&mut self, percent: u32, now: Instant) -> bool {
        if let Some(written) = self.last_write {
            if now.saturating_duration_since(written) < OWN_WRITE_GRACE {
                log::debug!("Ignoring brightness event ({percent}%) following our own write");
                return false;
            }
        }
        self.capabilities.current = Some(percent.min(self.capabilities.maximum));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::scale::NativeRange;
    use crate::driver::mock::MockChannel;

    fn ddc(current: Option<u32>) -> MockChannel {
        MockChannel::new(ChannelKind::Ddc, NativeRange::PERCENT, current)
    }

    fn wmi(current: Option<u32>) -> MockChannel {
        MockChannel::new(ChannelKind::Wmi, NativeRange::new(0, 48), current)
    }

    #[test]
    fn prefers_ddc_reading() {
        let (a, _) = ddc(Some(70)).boxed();
        let (b, _) = wmi(Some(12)).boxed();
        let display = Display::probe(vec![a, b]);
        assert_eq!(display.current(), Some(70));
    }

    #[test]
    fn falls_back_to_wmi_when_ddc_is_zero() {
        let (a, _) = ddc(Some(0)).boxed();
        let (b, _) = wmi(Some(24)).boxed();
        let display = Display::probe(vec![a, b]);
        assert_eq!(display.current(), Some(50));
    }

    #[test]
    fn falls_back_to_wmi_when_ddc_fails() {
        let (a, _) = ddc(None).boxed();
        let (b, _) = wmi(Some(48)).boxed();
        let mut display = Display::probe(vec![a, b]);
        assert_eq!(display.current(), Some(100));
        let status = display.status();
        assert!(status.channels[0].error.is_some());
        assert_eq!(status.channels[1].percent, Some(100));
    }

    #[test]
    fn unknown_when_every_channel_fails() {
        let (a, _) = ddc(Some(0)).boxed();
        let (b, _) = wmi(None).boxed();
        let display = Display::probe(vec![a, b]);
        assert_eq!(display.current(), None);
    }

    #[test]
    fn ddc_zero_without_wmi_is_unknown() {
        let (a, _) = ddc(Some(0)).boxed();
        let display = Display::probe(vec![a]);
        assert_eq!(display.current(), None);
    }

    #[test]
    fn wmi_and_backlight_accept_zero() {
        let (a, _) = ddc(Some(0)).boxed();
        let (b, _) = wmi(Some(0)).boxed();
        assert_eq!(Display::probe(vec![a, b]).current(), Some(0));
        let (c, _) =
            MockChannel::new(ChannelKind::Backlight, NativeRange::PERCENT, Some(0)).boxed();
        assert_eq!(Display::probe(vec![c]).current(), Some(0));
    }

    #[test]
    fn set_writes_every_channel() {
        let (a, ddc_state) = ddc(Some(40)).boxed();
        let (b, wmi_state) = wmi(Some(10)).boxed();
        let mut display = Display::probe(vec![a, b]);
        let report = display.set(60);
        assert!(report.succeeded());
        assert_eq!(report.brightness, 60);
        assert_eq!(ddc_state.lock().unwrap().writes, vec![60]);
        assert_eq!(wmi_state.lock().unwrap().writes, vec![60]);
        assert_eq!(wmi_state.lock().unwrap().current, Some(28));
        assert_eq!(display.current(), Some(60));
    }

    #[test]
    fn set_survives_channel_failure() {
        let (a, ddc_state) = ddc(Some(40)).boxed();
        let (b, wmi_state) = wmi(Some(10)).boxed();
        ddc_state.lock().unwrap().fail_writes = true;
        let mut display = Display::probe(vec![a, b]);
        let report = display.set(30);
        assert!(report.succeeded());
        assert!(report.channels[0].error.is_some());
        assert!(report.channels[1].error.is_none());
        assert_eq!(wmi_state.lock().unwrap().writes.len(), 1);
    }

    #[test]
    fn failed_set_still_records_value() {
        let (a, ddc_state) = ddc(Some(40)).boxed();
        ddc_state.lock().unwrap().fail_writes = true;
        let mut display = Display::probe(vec![a]);
        let report = display.set(90);
        assert!(!report.succeeded());
        assert_eq!(display.current(), Some(90));
    }

    #[test]
    fn set_clamps_to_capabilities() {
        let (a, _) = ddc(Some(40)).boxed();
        let mut display = Display::probe(vec![a]);
        assert_eq!(display.set(250).brightness, 100);
    }

    #[test]
    fn step_and_adjust() {
        let (a, ddc_state) = ddc(Some(30)).boxed();
        let mut display = Display::probe(vec![a]);
        let levels = [0, 10, 30, 60, 100];
        display.step(&levels, Direction::Forward, false).unwrap();
        assert_eq!(display.current(), Some(60));
        display.step(&levels, Direction::Backward, false).unwrap();
        assert_eq!(display.current(), Some(30));
        display.adjust(-10);
        assert_eq!(display.current(), Some(20));
        assert_eq!(ddc_state.lock().unwrap().writes, vec![60, 30, 20]);
    }

    #[test]
    fn levels_follow_config() {
        let (a, _) = ddc(Some(30)).boxed();
        let display = Display::probe(vec![a]);
        let mut config = BcConfig::default();
        assert_eq!(display.levels(&config), vec![0, 10, 30, 60, 100]);
        config.level_count = Some(6);
        assert_eq!(display.levels(&config), vec![0, 20, 40, 60, 80, 100]);
    }

    #[test]
    fn external_change_updates_current() {
        let (a, _) = ddc(Some(30)).boxed();
        let mut display = Display::probe(vec![a]);
        assert!(display.external_change(75));
        assert_eq!(display.current(), Some(75));
    }

    #[test]
    fn own_write_echo_is_ignored() {
        let (a, ddc_state) = ddc(Some(30)).boxed();
        let (b, _) = wmi(Some(14)).boxed();
        let mut display = Display::probe(vec![a, b]);
        display.set(10);
        // WMI reports the write back on its 0..48 scale
        let echoed = NativeRange::new(0, 48).to_percent(5);
        assert_eq!(echoed, 11);
        assert!(!display.external_change(echoed));
        assert_eq!(display.current(), Some(10));
        display
            .step(&[0, 10, 30, 60, 100], Direction::Backward, false)
            .unwrap();
        assert_eq!(display.current(), Some(0));
        assert_eq!(ddc_state.lock().unwrap().writes, vec![10, 0]);
    }

    #[test]
    fn external_change_after_grace_is_recorded() {
        let (a, _) = ddc(Some(30)).boxed();
        let mut display = Display::probe(vec![a]);
        display.set(10);
        let later = Instant::now() + OWN_WRITE_GRACE + Duration::from_millis(100);
        assert!(display.external_change_at(40, later));
        assert_eq!(display.current(), Some(40));
    }
}
