//! HID report descriptor encoder (\[HID\] Section 5.2, 6.2.2).
//!
//! The report map exposed through the GATT Report Map characteristic is built
//! from typed [`Item`]s instead of a hand-written byte array, so that the
//! declared report sizes can be checked against the codec in tests.

use alloc::vec::Vec;
use core::iter::FusedIterator;

use crate::usage::Page;
use crate::ReportType;

/// An encoded HID report descriptor.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReportDescriptor(Vec<u8>);

impl ReportDescriptor {
    /// Creates a new report descriptor.
    #[inline]
    pub fn new(items: impl AsRef<[Item]>) -> Self {
        let mut this = Self(Vec::with_capacity(128));
        this.extend(items);
        this
    }

    /// Appends the contents of another report descriptor to this one.
    #[inline]
    pub fn append(&mut self, other: &Self) {
        self.0.extend_from_slice(&other.0);
    }

    /// Appends all `items` to the report descriptor.
    #[inline]
    pub fn extend(&mut self, items: impl AsRef<[Item]>) {
        for v in items.as_ref() {
            self.push(v);
        }
    }

    /// Returns an iterator over report descriptor items.
    #[inline(always)]
    #[must_use]
    pub fn iter(&self) -> Iter {
        Iter(&self.0)
    }

    /// Returns the number of bits in the report with the specified ID and
    /// type, or zero if the descriptor does not declare such a report. Report
    /// size and count are tracked as global state, so this follows the same
    /// rules as a host-side parser for descriptors without push/pop items.
    #[must_use]
    pub fn report_bits(&self, id: u8, typ: ReportType) -> u32 {
        let (mut cur, mut size, mut count, mut bits) = (0_u8, 0, 0, 0);
        for (t, _, v) in self {
            match t {
                Tag::ReportId => cur = u8::try_from(v).unwrap_or(0),
                Tag::ReportSize => size = v,
                Tag::ReportCount => count = v,
                Tag::Input | Tag::Output | Tag::Feature => {
                    if cur == id && t.as_report_type() == Some(typ) {
                        bits += size * count;
                    }
                }
                _ => {}
            }
        }
        bits
    }

    /// Appends item `v` to the descriptor.
    fn push(&mut self, v: &Item) {
        use {Item::*, Tag::*};
        match *v {
            MInput(v) => self.u32(Input, u32::from(v.bits())),
            MOutput(v) => self.u32(Output, u32::from(v.bits())),
            MCollection(typ, ref v) => {
                self.u32(Collection, typ as _);
                self.extend(v);
                self.0.push(EndCollection as _);
            }
            GUsagePage(v) => self.u32(UsagePage, v as _),
            GLogicalMin(v) => self.i32(LogicalMin, v),
            GLogicalMax(v) => self.i32(LogicalMax, v),
            GReportSize(v) => self.u32(ReportSize, v),
            GReportId(v) => {
                if v != 0 {
                    self.u32(ReportId, u32::from(v));
                }
            }
            GReportCount(v) => self.u32(ReportCount, v),
            LUsage(v) => self.u32(Usage, v),
            LUsageMin(v) => self.u32(UsageMin, v),
            LUsageMax(v) => self.u32(UsageMax, v),
        }
    }

    /// Appends a short signed item using the smallest of 1, 2, or 4 bytes.
    fn i32(&mut self, t: Tag, v: i32) {
        let n = if i8::try_from(v).is_ok() {
            1
        } else if i16::try_from(v).is_ok() {
            2
        } else {
            4
        };
        self.put(t, v.to_le_bytes(), n);
    }

    /// Appends a short unsigned item using the smallest of 1, 2, or 4 bytes.
    fn u32(&mut self, t: Tag, v: u32) {
        let n = if u8::try_from(v).is_ok() {
            1
        } else if u16::try_from(v).is_ok() {
            2
        } else {
            4
        };
        self.put(t, v.to_le_bytes(), n);
    }

    /// Appends `n` bytes of a short value. Windows does not handle some
    /// zero-size items correctly, so `n` is always 1, 2, or 4.
    #[inline]
    fn put(&mut self, t: Tag, v: [u8; 4], n: usize) {
        #[allow(clippy::cast_possible_truncation)]
        let hdr = t as u8 | (n.trailing_zeros() as u8 + 1);
        self.0.push(hdr);
        self.0.extend_from_slice(&v[..n]);
    }
}

impl AsRef<[u8]> for ReportDescriptor {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ReportDescriptor {
    type Item = <Iter<'a> as Iterator>::Item;
    type IntoIter = Iter<'a>;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Report descriptor iterator. Yields `(tag, size, data)` values for short
/// items and stops at the first malformed or long item.
#[derive(Clone, Debug)]
pub struct Iter<'a>(&'a [u8]);

impl Iterator for Iter<'_> {
    type Item = (Tag, usize, u32);

    fn next(&mut self) -> Option<Self::Item> {
        use num_enum::TryFromPrimitive;
        let (&t, tail) = self.0.split_first()?;
        let n = 4 >> (3 - (t & 3));
        let t = Tag::try_from_primitive(t & !3).ok()?;
        if n > tail.len() {
            return None;
        }
        let mut v = [0_u8; 4];
        let (data, tail) = tail.split_at(n);
        v[..n].copy_from_slice(data);
        self.0 = tail;
        Some((t, n, u32::from_le_bytes(v)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.0.len()))
    }
}

impl FusedIterator for Iter<'_> {}

/// Report descriptor item.
///
/// Variants are prefixed with `M`, `G`, or `L` for Main, Global, or Local type,
/// respectively. Global items apply to all subsequent Main items, while Local
/// items only describe the next Main item.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Item {
    /// Data from one or more similar controls on a device.
    MInput(Flag),
    /// Data to one or more similar controls on a device, such as LEDs.
    MOutput(Flag),
    /// A meaningful grouping of Input, Output, and Feature items.
    MCollection(Collection, Vec<Item>),
    /// Current Usage Page.
    GUsagePage(Page),
    /// Minimum value that a variable or array item will report.
    GLogicalMin(i32),
    /// Maximum value that a variable or array item will report.
    GLogicalMax(i32),
    /// Size of the report fields in bits.
    GReportSize(u32),
    /// Report ID. Bluetooth reports carry the ID in the Report Reference
    /// descriptor rather than as a payload prefix. ID zero is omitted.
    GReportId(u8),
    /// Number of fields in the report for the next Main item.
    GReportCount(u32),
    /// Suggested usage for the next item or collection.
    LUsage(u32),
    /// First usage of an array or bitmap.
    LUsageMin(u32),
    /// Last usage of an array or bitmap.
    LUsageMax(u32),
}

/// Item tag (\[HID\] Section 6.2.2.4, 6.2.2.7, 6.2.2.8).
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::TryFromPrimitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Tag {
    // Main
    Input = 0b1000_00 << 2,
    Output = 0b1001_00 << 2,
    Feature = 0b1011_00 << 2,
    Collection = 0b1010_00 << 2,
    EndCollection = 0b1100_00 << 2,

    // Global
    UsagePage = 0b0000_01 << 2,
    LogicalMin = 0b0001_01 << 2,
    LogicalMax = 0b0010_01 << 2,
    ReportSize = 0b0111_01 << 2,
    ReportId = 0b1000_01 << 2,
    ReportCount = 0b1001_01 << 2,

    // Local
    Usage = 0b0000_10 << 2,
    UsageMin = 0b0001_10 << 2,
    UsageMax = 0b0010_10 << 2,
}

impl Tag {
    /// Returns the report type of an Input, Output, or Feature tag.
    #[inline]
    #[must_use]
    pub const fn as_report_type(self) -> Option<ReportType> {
        match self {
            Self::Input => Some(ReportType::Input),
            Self::Output => Some(ReportType::Output),
            Self::Feature => Some(ReportType::Feature),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Input, Output, and Feature item data flags (\[HID\] Section 6.2.2.5).
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Flag: u16 {
        /// Constant field (padding).
        const CONST = 1 << 0;
        /// Variable field, one bit or value per control, instead of an array
        /// of pressed control indices.
        const VAR = 1 << 1;
        /// Relative data, such as mouse movement.
        const REL = 1 << 2;
    }
}

/// Collection type (\[HID\] Section 6.2.2.6).
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(u8)]
pub enum Collection {
    /// Data points collected at one geometric point, such as pointer axes.
    Physical = 0x00,
    /// Group of items familiar to applications, such as a mouse or keyboard.
    Application = 0x01,
}

impl Collection {
    /// Defines a physical collection.
    #[inline(always)]
    #[must_use]
    pub fn physical(items: impl AsRef<[Item]>) -> Item {
        Item::MCollection(Self::Physical, items.as_ref().to_vec())
    }

    /// Defines an application collection.
    #[inline(always)]
    #[must_use]
    pub fn application(items: impl AsRef<[Item]>) -> Item {
        Item::MCollection(Self::Application, items.as_ref().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::usage::{GenericDesktop, Page};

    use super::*;

    /// Mouse report descriptor (\[HID\] Section E.10).
    #[test]
    fn mouse_report_descriptor_e10() {
        use Item::*;
        assert_eq!(
            ReportDescriptor::new([
                GUsagePage(Page::GenericDesktop),
                LUsage(GenericDesktop::Mouse as _),
                Collection::application([
                    LUsage(GenericDesktop::Pointer as _),
                    Collection::physical([
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
                        GUsagePage(Page::GenericDesktop),
                        LUsage(GenericDesktop::X as _),
                        LUsage(GenericDesktop::Y as _),
                        GLogicalMin(-127),
                        GLogicalMax(127),
                        GReportSize(8),
                        GReportCount(2),
                        MInput(Flag::VAR | Flag::REL),
                    ]),
                ]),
            ]),
            ReportDescriptor(vec![
                0x05, 0x01, // Usage Page (Generic Desktop)
                0x09, 0x02, // Usage (Mouse)
                0xA1, 0x01, // Collection (Application)
                0x09, 0x01, // Usage (Pointer)
                0xA1, 0x00, // Collection (Physical)
                0x05, 0x09, // Usage Page (Buttons)
                0x19, 0x01, // Usage Minimum (01)
                0x29, 0x03, // Usage Maximum (03)
                0x15, 0x00, // Logical Minimum (0)
                0x25, 0x01, // Logical Maximum (1)
                0x95, 0x03, // Report Count (3)
                0x75, 0x01, // Report Size (1)
                0x81, 0x02, // Input (Data, Variable, Absolute)
                0x95, 0x01, // Report Count (1)
                0x75, 0x05, // Report Size (5)
                0x81, 0x01, // Input (Constant)
                0x05, 0x01, // Usage Page (Generic Desktop)
                0x09, 0x30, // Usage (X)
                0x09, 0x31, // Usage (Y)
                0x15, 0x81, // Logical Minimum (-127)
                0x25, 0x7F, // Logical Maximum (127)
                0x75, 0x08, // Report Size (8)
                0x95, 0x02, // Report Count (2)
                0x81, 0x06, // Input (Data, Variable, Relative)
                0xC0, // End Collection
                0xC0, // End Collection
            ])
        );
    }

    #[test]
    fn int_sizes() {
        use Item::*;
        assert_eq!(
            ReportDescriptor::new([
                GLogicalMin(-1),
                GLogicalMin(i32::from(i8::MIN) - 1),
                GLogicalMin(i32::from(i16::MAX) + 1),
                LUsageMax(u32::from(u8::MAX)),
                LUsageMax(u32::from(u8::MAX) + 1),
                LUsageMax(u32::MAX),
                GReportId(0),
            ])
            .as_ref(),
            &[
                0x15, 0xFF, // -1
                0x16, 0x7F, 0xFF, // i8::MIN - 1
                0x17, 0x00, 0x80, 0x00, 0x00, // i16::MAX + 1
                0x29, 0xFF, // u8::MAX
                0x2A, 0x00, 0x01, // u8::MAX + 1
                0x2B, 0xFF, 0xFF, 0xFF, 0xFF, // u32::MAX
            ]
        );
    }

    #[test]
    fn iter() {
        use Item::*;
        let d = ReportDescriptor::new([
            GUsagePage(Page::GenericDesktop),
            LUsage(GenericDesktop::Keyboard as _),
            Collection::application([GLogicalMin(0), GLogicalMax(0x80), MInput(Flag::VAR)]),
        ]);
        let want: [(Tag, usize, u32); 7] = [
            (Tag::UsagePage, 1, Page::GenericDesktop as _),
            (Tag::Usage, 1, GenericDesktop::Keyboard as _),
            (Tag::Collection, 1, Collection::Application as _),
            (Tag::LogicalMin, 1, 0),
            (Tag::LogicalMax, 2, 0x80),
            (Tag::Input, 1, u32::from(Flag::VAR.bits())),
            (Tag::EndCollection, 0, 0),
        ];
        assert_eq!(d.iter().collect::<Vec<_>>().as_slice(), &want);

        // Truncated item
        let d = ReportDescriptor(vec![0x05, 0x01, 0x16, 0x00]);
        assert_eq!(d.iter().count(), 1);
    }

    #[test]
    fn report_bits() {
        use Item::*;
        let d = ReportDescriptor::new([
            GReportId(1),
            GReportSize(8),
            GReportCount(2),
            MInput(Flag::VAR),
            MOutput(Flag::VAR),
            GReportId(2),
            GReportSize(1),
            GReportCount(3),
            MInput(Flag::VAR),
        ]);
        assert_eq!(d.report_bits(1, ReportType::Input), 16);
        assert_eq!(d.report_bits(1, ReportType::Output), 16);
        assert_eq!(d.report_bits(2, ReportType::Input), 3);
        assert_eq!(d.report_bits(3, ReportType::Input), 0);
    }
}
