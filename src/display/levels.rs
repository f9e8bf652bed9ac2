//! Brightness level lists and stepping between them

use itertools::Itertools;
use serde::Serialize;

/// Brightness capabilities in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub minimum: u32,
    pub current: Option<u32>,
    pub maximum: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            minimum: 0,
            current: None,
            maximum: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn from_forward(forward: bool) -> Self {
        if forward {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// The candidates that fall within the capabilities, ascending and without duplicates
pub fn default_levels(candidates: &[u32], caps: &Capabilities) -> Vec<u32> {
    candidates
        .iter()
        .copied()
        .filter(|l| *l >= caps.minimum && *l <= caps.maximum)
        .sorted()
        .dedup()
        .collect()
}

pub fn evenly_spaced(caps: &Capabilities, count: usize) -> Vec<u32> {
    if count <= 1 {
        return vec![caps.minimum];
    }
    let step = caps.maximum.saturating_sub(caps.minimum) / (count as u32 - 1);
    (0..count as u32).map(|i| caps.minimum + i * step).collect()
}

/// Picks the level to apply when stepping through `levels` (ascending).
/// When there is no level in that direction the current value is returned so it gets
/// re-applied, unless `cycle` wraps around to the other end.
/// Returns `None` when there is nothing to apply.
pub fn next_level(
    levels: &[u32],
    current: Option<u32>,
    direction: Direction,
    cycle: bool,
) -> Option<u32> {
    let value = current.map(i64::from).unwrap_or(-1);
    let found = match direction {
        Direction::Forward => levels.iter().find(|l| i64::from(**l) > value),
        Direction::Backward => levels.iter().rev().find(|l| i64::from(**l) < value),
    };
    if let Some(level) = found {
        return Some(*level);
    }
    if cycle && !levels.is_empty() {
        return match direction {
            Direction::Forward => levels.first().copied(),
            Direction::Backward => levels.last().copied(),
        };
    }
    current
}

/// Relative change, clamped to 0..=100. Unknown brightness counts as 0.
pub fn adjust(current: Option<u32>, delta: i32) -> u32 {
    (i64::from(current.unwrap_or(0)) + i64::from(delta)).clamp(0, 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [u32; 5] = [0, 10, 30, 60, 100];

    #[test]
    fn filters_and_sorts_candidates() {
        let caps = Capabilities {
            minimum: 10,
            current: None,
            maximum: 60,
        };
        assert_eq!(default_levels(&[100, 30, 0, 10, 60, 30], &caps), vec![10, 30, 60]);
        assert_eq!(
            default_levels(&LEVELS, &Capabilities::default()),
            LEVELS.to_vec()
        );
    }

    #[test]
    fn evenly_spaced_levels() {
        let caps = Capabilities::default();
        assert_eq!(evenly_spaced(&caps, 6), vec![0, 20, 40, 60, 80, 100]);
        assert_eq!(evenly_spaced(&caps, 4), vec![0, 33, 66, 99]);
        assert_eq!(evenly_spaced(&caps, 1), vec![0]);
        let narrow = Capabilities {
            minimum: 20,
            current: None,
            maximum: 70,
        };
        assert_eq!(evenly_spaced(&narrow, 3), vec![20, 45, 70]);
    }

    #[test]
    fn forward_steps_to_next_level() {
        assert_eq!(next_level(&LEVELS, Some(10), Direction::Forward, false), Some(30));
        assert_eq!(next_level(&LEVELS, Some(45), Direction::Forward, false), Some(60));
    }

    #[test]
    fn backward_steps_to_previous_level() {
        assert_eq!(next_level(&LEVELS, Some(30), Direction::Backward, false), Some(10));
        assert_eq!(next_level(&LEVELS, Some(45), Direction::Backward, false), Some(30));
    }

    #[test]
    fn end_of_list_reapplies_current_without_cycle() {
        assert_eq!(next_level(&LEVELS, Some(100), Direction::Forward, false), Some(100));
        assert_eq!(next_level(&LEVELS, Some(0), Direction::Backward, false), Some(0));
    }

    #[test]
    fn end_of_list_wraps_with_cycle() {
        assert_eq!(next_level(&LEVELS, Some(100), Direction::Forward, true), Some(0));
        assert_eq!(next_level(&LEVELS, Some(0), Direction::Backward, true), Some(100));
    }

    #[test]
    fn unknown_current() {
        assert_eq!(next_level(&LEVELS, None, Direction::Forward, false), Some(0));
        assert_eq!(next_level(&LEVELS, None, Direction::Backward, false), None);
        assert_eq!(next_level(&LEVELS, None, Direction::Backward, true), Some(100));
    }

    #[test]
    fn empty_levels() {
        assert_eq!(next_level(&[], Some(40), Direction::Forward, true), Some(40));
        assert_eq!(next_level(&[], None, Direction::Forward, true), None);
    }

    #[test]
    fn adjust_clamps() {
        assert_eq!(adjust(Some(50), 10), 60);
        assert_eq!(adjust(Some(95), 10), 100);
        assert_eq!(adjust(Some(5), -10), 0);
        assert_eq!(adjust(None, 10), 10);
    }
}
