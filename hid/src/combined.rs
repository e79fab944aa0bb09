//! Single report multiplexing media keys, mouse, and keyboard.
//!
//! Layout: `[media, buttons, dx, dy, modifiers, 0, key0..key5]`. There is no
//! wheel field.

use alloc::vec;

use super::descriptor::{Collection, Item, ReportDescriptor};
use super::kbd::{self, KeyboardReport};
use super::media::{self, MediaKey};
use super::mouse::{self, Button};
use super::usage::{GenericDesktop, Page};
use super::clamp7;

/// Input report length.
pub const IN_LEN: usize = media::IN_LEN + 3 + kbd::IN_LEN;

/// Decoded combined report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CombinedReport {
    pub media: MediaKey,
    pub buttons: Button,
    pub dx: i8,
    pub dy: i8,
    pub kbd: KeyboardReport,
}

/// Encodes a combined input report. Movement is clamped to `[-127, 127]`.
#[allow(clippy::cast_sign_loss)]
#[must_use]
pub fn encode_combined(
    media: MediaKey,
    buttons: Button,
    dx: i32,
    dy: i32,
    kbd: &KeyboardReport,
) -> [u8; IN_LEN] {
    let mut v = [0; IN_LEN];
    v[0] = media::encode_media(media)[0];
    v[1] = buttons.bits();
    v[2] = clamp7(dx) as u8;
    v[3] = clamp7(dy) as u8;
    v[4..].copy_from_slice(&kbd.encode());
    v
}

/// Decodes a combined input report.
#[allow(clippy::cast_possible_wrap)]
#[must_use]
pub fn decode_combined(v: &[u8; IN_LEN]) -> CombinedReport {
    let mut k = [0; kbd::IN_LEN];
    k.copy_from_slice(&v[4..]);
    CombinedReport {
        media: media::decode_media(&[v[0]]),
        buttons: Button::from_bits_truncate(v[1]),
        dx: v[2] as i8,
        dy: v[3] as i8,
        kbd: KeyboardReport::decode(&k),
    }
}

/// Returns the report map for the combined report `id`. All fields are
/// declared in one application collection in report byte order.
#[must_use]
pub fn report_descriptor(id: u8) -> ReportDescriptor {
    use Item::*;
    let mut items = vec![GReportId(id)];
    items.extend(media::control_items());
    items.extend(mouse::pointer_items(false));
    items.extend(kbd::modifier_items());
    items.extend(kbd::key_items());
    ReportDescriptor::new([
        GUsagePage(Page::GenericDesktop),
        LUsage(GenericDesktop::Keyboard as _),
        Collection::application(items),
    ])
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::descriptor::Tag;
    use crate::usage::Key;
    use crate::ReportType;

    #[test]
    fn encode() {
        let mut k = KeyboardReport::new();
        k.press(Key::LeftShift).unwrap();
        k.press(Key::H).unwrap();
        let v = encode_combined(MediaKey::MUTE, Button::RIGHT, 200, -5, &k);
        assert_eq!(v, [0x20, 0x02, 0x7F, 0xFB, 0x02, 0, 0x0B, 0, 0, 0, 0, 0]);
        let r = decode_combined(&v);
        assert_eq!(r.media, MediaKey::MUTE);
        assert_eq!(r.buttons, Button::RIGHT);
        assert_eq!((r.dx, r.dy), (127, -5));
        assert_eq!(r.kbd, k);

        let zero = encode_combined(
            MediaKey::empty(),
            Button::empty(),
            0,
            0,
            &KeyboardReport::new(),
        );
        assert_eq!(zero, [0; IN_LEN]);
    }

    #[test]
    fn descriptor() {
        let rd = report_descriptor(1);
        assert_eq!(rd.report_bits(1, ReportType::Input), IN_LEN as u32 * 8);
        assert_eq!(rd.report_bits(1, ReportType::Output), 0);
    }

    /// Returns the usage page and usage in effect at each collection.
    fn collections(rd: &ReportDescriptor) -> Vec<(u32, Option<u32>)> {
        let (mut page, mut usage, mut v) = (0, None, Vec::new());
        for (t, _, d) in rd {
            match t {
                Tag::UsagePage => page = d,
                Tag::Usage => usage = Some(d),
                Tag::Collection => v.push((page, usage.take())),
                Tag::Input | Tag::Output | Tag::Feature => usage = None,
                _ => {}
            }
        }
        v
    }

    #[test]
    fn collection_usages() {
        let gd = Page::GenericDesktop as u32;
        assert_eq!(
            collections(&report_descriptor(1)),
            [
                (gd, Some(GenericDesktop::Keyboard as u32)),
                (gd, Some(GenericDesktop::Pointer as u32)),
            ]
        );
        assert_eq!(
            collections(&mouse::report_descriptor(2)),
            [
                (gd, Some(GenericDesktop::Mouse as u32)),
                (gd, Some(GenericDesktop::Pointer as u32)),
            ]
        );
    }
}
