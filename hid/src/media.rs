//! Consumer control (media key) reports.

use alloc::vec;
use alloc::vec::Vec;

use super::descriptor::{Collection, Flag, Item, ReportDescriptor};
use super::usage::{Consumer, Page};

/// Input report length.
pub const IN_LEN: usize = 1;

bitflags::bitflags! {
    /// Media control keys. Bit order matches the usages declared by
    /// [`report_descriptor`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct MediaKey: u8 {
        const PLAY_PAUSE = 1 << 0;
        const NEXT_TRACK = 1 << 1;
        const PREV_TRACK = 1 << 2;
        const VOLUME_UP = 1 << 3;
        const VOLUME_DOWN = 1 << 4;
        const MUTE = 1 << 5;
    }
}

impl MediaKey {
    /// Consumer usages in bit order.
    const USAGES: [Consumer; 6] = [
        Consumer::PlayPause,
        Consumer::ScanNextTrack,
        Consumer::ScanPreviousTrack,
        Consumer::VolumeIncrement,
        Consumer::VolumeDecrement,
        Consumer::Mute,
    ];

    /// Returns the consumer usages of all set bits.
    pub fn usages(self) -> impl Iterator<Item = Consumer> {
        (Self::USAGES.into_iter().enumerate())
            .filter(move |&(i, _)| self.bits() & (1 << i) != 0)
            .map(|(_, u)| u)
    }
}

/// Encodes a media input report. Only the six defined bits are kept.
#[inline]
#[must_use]
pub const fn encode_media(keys: MediaKey) -> [u8; IN_LEN] {
    [keys.bits() & MediaKey::all().bits()]
}

/// Decodes a media input report.
#[inline]
#[must_use]
pub const fn decode_media(v: &[u8; IN_LEN]) -> MediaKey {
    MediaKey::from_bits_truncate(v[0])
}

/// Returns the consumer control report map fragment for report `id`.
#[must_use]
pub fn report_descriptor(id: u8) -> ReportDescriptor {
    use Item::*;
    let mut items = vec![GReportId(id)];
    items.extend(control_items());
    ReportDescriptor::new([
        GUsagePage(Page::Consumer),
        LUsage(Consumer::ConsumerControl as _),
        Collection::application(items),
    ])
}

/// One bit per media key followed by padding.
pub(crate) fn control_items() -> Vec<Item> {
    use Item::*;
    let mut items = vec![
        GUsagePage(Page::Consumer),
        GLogicalMin(0),
        GLogicalMax(1),
        GReportSize(1),
        GReportCount(MediaKey::USAGES.len() as _),
    ];
    items.extend(MediaKey::USAGES.iter().map(|&u| LUsage(u as _)));
    items.extend([
        MInput(Flag::VAR),
        GReportCount(8 - MediaKey::USAGES.len() as u32),
        MInput(Flag::CONST),
    ]);
    items
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::ReportType;

    #[test]
    fn encode() {
        assert_eq!(encode_media(MediaKey::PLAY_PAUSE), [0x01]);
        assert_eq!(encode_media(MediaKey::VOLUME_UP | MediaKey::MUTE), [0x28]);
        assert_eq!(encode_media(MediaKey::from_bits_retain(0xC0)), [0x00]);
        assert_eq!(decode_media(&[0xFF]), MediaKey::all());
    }

    #[test]
    fn usages() {
        let u: Vec<_> = (MediaKey::NEXT_TRACK | MediaKey::MUTE).usages().collect();
        assert_eq!(u, [Consumer::ScanNextTrack, Consumer::Mute]);
        assert_eq!(MediaKey::empty().usages().count(), 0);
    }

    #[test]
    fn descriptor() {
        let rd = report_descriptor(3);
        assert_eq!(rd.report_bits(3, ReportType::Input), IN_LEN as u32 * 8);
        assert_eq!(rd.as_ref()[..4], [0x05, 0x0C, 0x09, 0x01]);
    }
}
