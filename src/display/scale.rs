//! Conversion between a channel's native brightness units and percent

use serde::Serialize;

/// The inclusive range of raw brightness values a device reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NativeRange {
    pub min: u32,
    pub max: u32,
}

impl NativeRange {
    pub const PERCENT: NativeRange = NativeRange { min: 0, max: 100 };

    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    fn span(&self) -> u32 {
        self.max.saturating_sub(self.min)
    }

    /// Rounds up, so the smallest non-zero raw value never shows as 0%
    pub fn to_percent(&self, raw: u32) -> u32 {
        let span = self.span() as u64;
        if span == 0 {
            return 0;
        }
        let offset = (raw.clamp(self.min, self.max) - self.min) as u64;
        ((100 * offset + span - 1) / span) as u32
    }

    pub fn from_percent(&self, percent: u32) -> u32 {
        let span = self.span() as u64;
        let percent = percent.min(100) as u64;
        self.min + (percent * span / 100) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_range_is_identity() {
        for p in [0, 1, 37, 99, 100] {
            assert_eq!(NativeRange::PERCENT.to_percent(p), p);
            assert_eq!(NativeRange::PERCENT.from_percent(p), p);
        }
    }

    #[test]
    fn wmi_scale_rounds_up() {
        let range = NativeRange::new(0, 48);
        assert_eq!(range.to_percent(0), 0);
        assert_eq!(range.to_percent(1), 3);
        assert_eq!(range.to_percent(24), 50);
        assert_eq!(range.to_percent(25), 53);
        assert_eq!(range.to_percent(48), 100);
    }

    #[test]
    fn raw_values_outside_range_are_clamped() {
        let range = NativeRange::new(10, 60);
        assert_eq!(range.to_percent(0), 0);
        assert_eq!(range.to_percent(200), 100);
        assert_eq!(range.from_percent(250), 60);
    }

    #[test]
    fn offset_range() {
        let range = NativeRange::new(20, 70);
        assert_eq!(range.from_percent(0), 20);
        assert_eq!(range.from_percent(50), 45);
        assert_eq!(range.from_percent(100), 70);
        assert_eq!(range.to_percent(45), 50);
    }

    #[test]
    fn degenerate_range() {
        let range = NativeRange::new(5, 5);
        assert_eq!(range.to_percent(5), 0);
        assert_eq!(range.from_percent(80), 5);
        let inverted = NativeRange::new(9, 3);
        assert_eq!(inverted.to_percent(4), 0);
    }
}
