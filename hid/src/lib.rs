//! HID report codec for the hidpad BLE peripheral.
//!
//! Converts mouse, keyboard, and media-control state into the fixed-size input
//! reports described by the report map that the peripheral advertises. All
//! encoders are pure functions; the only state is the [`kbd::KeyboardReport`]
//! that callers keep between key presses.

#![no_std]
#![warn(unused_crate_dependencies)]

extern crate alloc;

use core::fmt;

pub mod combined;
pub mod descriptor;
pub mod kbd;
pub mod media;
pub mod mouse;
pub mod usage;

/// HID report type (\[HIDS\] Section 3.6.2, Report Reference descriptor).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum ReportType {
    Input = 0x01,
    Output = 0x02,
    Feature = 0x03,
}

impl ReportType {
    /// Returns whether this is an input report.
    #[inline(always)]
    #[must_use]
    pub const fn is_input(self) -> bool {
        matches!(self, Self::Input)
    }
}

/// Error returned when a key press does not fit into the 6-key rollover
/// report. The keyboard state is left unchanged.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ReportFull;

impl fmt::Display for ReportFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("keyboard report full")
    }
}

/// Clamps a relative movement to the `[-127, 127]` range declared by the
/// report map.
#[allow(clippy::cast_possible_truncation)]
#[inline]
#[must_use]
pub(crate) const fn clamp7(v: i32) -> i8 {
    (if v > 127 {
        127
    } else if v < -127 {
        -127
    } else {
        v
    }) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp() {
        assert_eq!(clamp7(0), 0);
        assert_eq!(clamp7(127), 127);
        assert_eq!(clamp7(128), 127);
        assert_eq!(clamp7(-127), -127);
        assert_eq!(clamp7(-128), -127);
        assert_eq!(clamp7(i32::MIN), -127);
        assert_eq!(clamp7(i32::MAX), 127);
    }

    #[test]
    fn report_type() {
        assert_eq!(ReportType::try_from(1).ok(), Some(ReportType::Input));
        assert!(ReportType::try_from(0).is_err());
        assert!(ReportType::Input.is_input());
        assert!(!ReportType::Output.is_input());
    }
}
