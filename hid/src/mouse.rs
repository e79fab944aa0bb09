//! Mouse reports.

use alloc::vec;
use alloc::vec::Vec;

use super::descriptor::{Collection, Flag, Item, ReportDescriptor};
use super::usage::{GenericDesktop, Page};
use super::clamp7;

/// Input report length: buttons, X, Y, and wheel.
pub const IN_LEN: usize = 4;

bitflags::bitflags! {
    /// Mouse buttons.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Button: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// Mouse input report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MouseReport {
    pub buttons: Button,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
}

impl MouseReport {
    /// Creates a report, clamping movement to `[-127, 127]`.
    #[must_use]
    pub const fn new(buttons: Button, dx: i32, dy: i32, wheel: i32) -> Self {
        Self {
            buttons,
            dx: clamp7(dx),
            dy: clamp7(dy),
            wheel: clamp7(wheel),
        }
    }

    /// Encodes the report as `[buttons, dx, dy, wheel]`.
    #[allow(clippy::cast_sign_loss)]
    #[must_use]
    pub const fn encode(&self) -> [u8; IN_LEN] {
        [
            self.buttons.bits(),
            self.dx as u8,
            self.dy as u8,
            self.wheel as u8,
        ]
    }

    /// Decodes an input report. Undefined button bits are dropped.
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub const fn decode(v: &[u8; IN_LEN]) -> Self {
        Self {
            buttons: Button::from_bits_truncate(v[0]),
            dx: v[1] as i8,
            dy: v[2] as i8,
            wheel: v[3] as i8,
        }
    }
}

/// Encodes a mouse input report. Movement and wheel values outside of
/// `[-127, 127]` are clamped.
#[inline]
#[must_use]
pub const fn encode_mouse(buttons: Button, dx: i32, dy: i32, wheel: i32) -> [u8; IN_LEN] {
    MouseReport::new(buttons, dx, dy, wheel).encode()
}

/// Decodes a mouse input report.
#[inline]
#[must_use]
pub const fn decode_mouse(v: &[u8; IN_LEN]) -> MouseReport {
    MouseReport::decode(v)
}

/// Splits a relative movement into steps that each fit into a single report.
/// Both axes advance together until each one is exhausted. A zero movement
/// yields no steps.
#[inline]
#[must_use]
pub const fn split_move(dx: i32, dy: i32) -> SplitMove {
    SplitMove { dx, dy }
}

/// Iterator returned by [`split_move`].
#[derive(Clone, Copy, Debug)]
pub struct SplitMove {
    dx: i32,
    dy: i32,
}

impl Iterator for SplitMove {
    type Item = (i8, i8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.dx == 0 && self.dy == 0 {
            return None;
        }
        let (x, y) = (clamp7(self.dx), clamp7(self.dy));
        self.dx -= i32::from(x);
        self.dy -= i32::from(y);
        Some((x, y))
    }
}

impl core::iter::FusedIterator for SplitMove {}

/// Returns the mouse report map fragment for report `id`.
#[must_use]
pub fn report_descriptor(id: u8) -> ReportDescriptor {
    use Item::*;
    let mut items = vec![GReportId(id)];
    items.extend(pointer_items(true));
    ReportDescriptor::new([
        GUsagePage(Page::GenericDesktop),
        LUsage(GenericDesktop::Mouse as _),
        Collection::application(items),
    ])
}

/// Pointer collection with three buttons, X and Y axes, and an optional wheel.
pub(crate) fn pointer_items(wheel: bool) -> Vec<Item> {
    use Item::*;
    let mut axes = vec![
        GUsagePage(Page::GenericDesktop),
        LUsage(GenericDesktop::X as _),
        LUsage(GenericDesktop::Y as _),
    ];
    if wheel {
        axes.push(LUsage(GenericDesktop::Wheel as _));
    }
    axes.extend([
        GLogicalMin(-127),
        GLogicalMax(127),
        GReportSize(8),
        GReportCount(if wheel { 3 } else { 2 }),
        MInput(Flag::VAR | Flag::REL),
    ]);
    let mut items = vec![
        GUsagePage(Page::Button),
        LUsageMin(1),
        LUsageMax(3),
        GLogicalMin(0),
        GLogicalMax(1),
        GReportCount(3),
        GReportSize(1),
        MInput(Flag::VAR),
        GReportCount(1),
        GReportSize(5),
        MInput(Flag::CONST),
    ];
    items.extend(axes);
    vec![
        GUsagePage(Page::GenericDesktop),
        LUsage(GenericDesktop::Pointer as _),
        Collection::physical(items),
    ]
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::ReportType;

    #[test]
    fn encode() {
        assert_eq!(encode_mouse(Button::LEFT, 5, -3, 0), [0x01, 0x05, 0xFD, 0x00]);
        assert_eq!(encode_mouse(Button::empty(), 300, -300, 1), [0x00, 0x7F, 0x81, 0x01]);
        assert_eq!(
            encode_mouse(Button::LEFT | Button::MIDDLE, 0, 0, -1000),
            [0x05, 0x00, 0x00, 0x81]
        );
        let r = decode_mouse(&[0xFF, 0x81, 0x7F, 0x00]);
        assert_eq!(r.buttons, Button::all());
        assert_eq!((r.dx, r.dy, r.wheel), (-127, 127, 0));
    }

    #[test]
    fn split() {
        assert_eq!(split_move(0, 0).count(), 0);
        assert_eq!(split_move(10, -2).collect::<Vec<_>>(), [(10, -2)]);
        assert_eq!(
            split_move(300, -130).collect::<Vec<_>>(),
            [(127, -127), (127, -3), (46, 0)]
        );
        let (x, y) = split_move(-1000, 999).fold((0, 0), |(x, y), (dx, dy)| {
            (x + i32::from(dx), y + i32::from(dy))
        });
        assert_eq!((x, y), (-1000, 999));
    }

    #[test]
    fn descriptor() {
        let rd = report_descriptor(2);
        assert_eq!(rd.report_bits(2, ReportType::Input), IN_LEN as u32 * 8);
        assert_eq!(rd.report_bits(1, ReportType::Input), 0);
        assert_eq!(rd.as_ref()[..4], [0x05, 0x01, 0x09, 0x02]);
    }
}
