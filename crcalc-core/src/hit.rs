//! Hit type for pixel detector data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single recorded charge deposit.
///
/// Hits arrive ordered by `sm_event_num`, which groups them into
/// SM events. `event_number` and `relative_bcid` are carried through from
/// the interpreted hit table but play no part in reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Source file number.
    pub file_num: u32,
    /// Raw readout event number.
    pub event_number: i64,
    /// Time over threshold (charge proxy).
    pub tot: u8,
    /// Bunch crossing relative to the trigger.
    pub relative_bcid: u8,
    /// SM event this hit belongs to (segmentation key).
    pub sm_event_num: i64,
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Z position (depth).
    pub z: f64,
}

impl Hit {
    /// Creates a hit with the fields reconstruction uses.
    #[inline]
    #[must_use]
    pub fn new(sm_event_num: i64, x: f64, y: f64, z: f64, tot: u8) -> Self {
        Self {
            file_num: 0,
            event_number: 0,
            tot,
            relative_bcid: 0,
            sm_event_num,
            x,
            y,
            z,
        }
    }

    /// Sets the source file number.
    #[inline]
    #[must_use]
    pub fn with_file_num(mut self, file_num: u32) -> Self {
        self.file_num = file_num;
        self
    }

    /// Returns the position as `[x, y, z]`.
    #[inline]
    #[must_use]
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_hit_new() {
        let hit = Hit::new(7, 1.0, 2.0, 3.0, 12).with_file_num(101);
        assert_eq!(hit.sm_event_num, 7);
        assert_eq!(hit.file_num, 101);
        assert_eq!(hit.tot, 12);
        assert_eq!(hit.position(), [1.0, 2.0, 3.0]);
    }
}
