//! Keyboard reports with 6-key rollover.

use alloc::vec;
use alloc::vec::Vec;

use super::descriptor::{Collection, Flag, Item, ReportDescriptor};
use super::usage::{self, GenericDesktop, Page};
use super::ReportFull;

/// Input report length: modifiers, reserved byte, and key slots.
pub const IN_LEN: usize = 2 + MAX_KEYS;

/// Output report length (LED indicators).
pub const OUT_LEN: usize = 1;

/// Maximum number of simultaneously pressed non-modifier keys.
pub const MAX_KEYS: usize = 6;

bitflags::bitflags! {
    /// Key modifier flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct KeyMod: u8 {
        /// Left Ctrl
        const LCTRL = 1 << 0;
        /// Left Shift
        const LSHIFT = 1 << 1;
        /// Left Alt
        const LALT = 1 << 2;
        /// Left GUI ("Windows key" / Command)
        const LGUI = 1 << 3;
        /// Right Ctrl
        const RCTRL = 1 << 4;
        /// Right Shift
        const RSHIFT = 1 << 5;
        /// Right Alt
        const RALT = 1 << 6;
        /// Right GUI ("Windows key" / Command)
        const RGUI = 1 << 7;
    }
}

impl KeyMod {
    /// Returns the modifier flag for a modifier key usage or an empty set for
    /// any other key.
    #[inline]
    #[must_use]
    pub const fn from_usage(u: usage::Key) -> Self {
        if u.is_modifier() {
            Self::from_bits_truncate(1 << (u as u8 - usage::Key::LeftCtrl as u8))
        } else {
            Self::empty()
        }
    }
}

bitflags::bitflags! {
    /// Keyboard LED indicators written by the host in the output report.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Led: u8 {
        const NUM_LOCK = 1 << 0;
        const CAPS_LOCK = 1 << 1;
        const SCROLL_LOCK = 1 << 2;
        const COMPOSE = 1 << 3;
        const KANA = 1 << 4;
    }
}

/// A single key press with optional modifier keys.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Key {
    m: KeyMod,
    u: usage::Key,
}

impl From<usage::Key> for Key {
    fn from(u: usage::Key) -> Self {
        Self {
            m: KeyMod::empty(),
            u,
        }
    }
}

impl Key {
    /// Returns a combination of left shift and key.
    #[must_use]
    pub fn shift(u: usage::Key) -> Self {
        Self::from(u).with(KeyMod::LSHIFT)
    }

    /// Adds a modifier key to an existing key press.
    #[must_use]
    pub fn with(self, m: KeyMod) -> Self {
        Self {
            m: m | self.m,
            ..self
        }
    }

    /// Returns the modifier keys.
    #[inline(always)]
    #[must_use]
    pub const fn modifiers(self) -> KeyMod {
        self.m
    }

    /// Returns the key usage.
    #[inline(always)]
    #[must_use]
    pub const fn usage(self) -> usage::Key {
        self.u
    }

    /// Returns true if the key and modifier are empty.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::default()
    }
}

/// Keyboard input report state. Pressed keys occupy the leading slots in press
/// order without gaps.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KeyboardReport {
    m: KeyMod,
    keys: [u8; MAX_KEYS],
}

impl KeyboardReport {
    /// Creates an empty report with no keys pressed.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            m: KeyMod::empty(),
            keys: [0; MAX_KEYS],
        }
    }

    /// Returns the current modifier flags.
    #[inline(always)]
    #[must_use]
    pub const fn modifiers(&self) -> KeyMod {
        self.m
    }

    /// Replaces the modifier flags.
    #[inline(always)]
    pub fn set_modifiers(&mut self, m: KeyMod) {
        self.m = m;
    }

    /// Returns the pressed key codes in slot order.
    #[inline]
    #[must_use]
    pub fn held(&self) -> &[u8] {
        &self.keys[..self.len()]
    }

    /// Returns the number of pressed non-modifier keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.iter().take_while(|&&k| k != 0).count()
    }

    /// Returns whether no keys or modifiers are pressed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.m.is_empty() && self.keys[0] == 0
    }

    /// Adds a key to the report. Modifier usages set the corresponding
    /// modifier flag. Pressing a key that is already held has no effect.
    /// Returns [`ReportFull`] without changing the report if all slots are
    /// taken.
    pub fn press(&mut self, k: usage::Key) -> Result<(), ReportFull> {
        if k.is_none() {
            return Ok(());
        }
        if k.is_modifier() {
            self.m |= KeyMod::from_usage(k);
            return Ok(());
        }
        let (u, n) = (u8::from(k), self.len());
        if self.keys[..n].contains(&u) {
            return Ok(());
        }
        if n == MAX_KEYS {
            return Err(ReportFull);
        }
        self.keys[n] = u;
        Ok(())
    }

    /// Adds a key and its modifiers to the report. Nothing is changed if the
    /// key does not fit.
    pub fn press_key(&mut self, k: Key) -> Result<(), ReportFull> {
        self.press(k.u)?;
        self.m |= k.m;
        Ok(())
    }

    /// Removes a key from the report, shifting later keys left to fill the
    /// freed slot. Returns whether the key was held.
    pub fn release(&mut self, k: usage::Key) -> bool {
        if k.is_modifier() {
            let m = KeyMod::from_usage(k);
            let held = self.m.contains(m);
            self.m.remove(m);
            return held;
        }
        let (u, n) = (u8::from(k), self.len());
        let Some(i) = self.keys[..n].iter().position(|&v| v == u) else {
            return false;
        };
        self.keys.copy_within(i + 1..n, i);
        self.keys[n - 1] = 0;
        true
    }

    /// Releases all keys and modifiers.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Encodes the report as `[modifiers, 0, key0..key5]`.
    #[must_use]
    pub fn encode(&self) -> [u8; IN_LEN] {
        let mut v = [0; IN_LEN];
        v[0] = self.m.bits();
        v[2..].copy_from_slice(&self.keys);
        v
    }

    /// Decodes an input report, compacting any empty slots.
    #[must_use]
    pub fn decode(v: &[u8; IN_LEN]) -> Self {
        let mut this = Self {
            m: KeyMod::from_bits_retain(v[0]),
            keys: [0; MAX_KEYS],
        };
        for (dst, &k) in this.keys.iter_mut().zip(v[2..].iter().filter(|&&k| k != 0)) {
            *dst = k;
        }
        this
    }
}

/// Encodes a keyboard input report from modifiers and up to [`MAX_KEYS`] key
/// codes. Zero entries are skipped so that the result has no gaps.
pub fn encode_keyboard(m: KeyMod, keys: &[u8]) -> Result<[u8; IN_LEN], ReportFull> {
    let mut r = KeyboardReport::new();
    r.set_modifiers(m);
    let mut n = 0;
    for &k in keys.iter().filter(|&&k| k != 0) {
        if n == MAX_KEYS {
            return Err(ReportFull);
        }
        r.keys[n] = k;
        n += 1;
    }
    Ok(r.encode())
}

/// Returns the keyboard report map fragment for report `id`. The LED output
/// report is included if `leds` is set.
#[must_use]
pub fn report_descriptor(id: u8, leds: bool) -> ReportDescriptor {
    use Item::*;
    let mut items = vec![GReportId(id)];
    items.extend(modifier_items());
    if leds {
        items.extend(led_items());
    }
    items.extend(key_items());
    ReportDescriptor::new([
        GUsagePage(Page::GenericDesktop),
        LUsage(GenericDesktop::Keyboard as _),
        Collection::application(items),
    ])
}

/// Modifier byte followed by the reserved byte.
#[rustfmt::skip]
pub(crate) fn modifier_items() -> Vec<Item> {
    use Item::*;
    vec![
        GUsagePage(Page::Key),
        GReportSize(1),
        GReportCount(8),
        GLogicalMin(0),
        GLogicalMax(1),
        LUsageMin(usage::Key::LeftCtrl as _),
        LUsageMax(usage::Key::RightGui as _),
        MInput(Flag::VAR),

        GReportSize(8),
        GReportCount(1),
        MInput(Flag::CONST),
    ]
}

/// LED output bits with padding.
#[rustfmt::skip]
fn led_items() -> Vec<Item> {
    use Item::*;
    vec![
        GUsagePage(Page::Led),
        GReportSize(1),
        GReportCount(5),
        GLogicalMin(0),
        GLogicalMax(1),
        LUsageMin(usage::Led::NumLock as _),
        LUsageMax(usage::Led::Kana as _),
        MOutput(Flag::VAR),

        GReportSize(3),
        GReportCount(1),
        MOutput(Flag::CONST),
    ]
}

/// Key code array.
#[rustfmt::skip]
pub(crate) fn key_items() -> Vec<Item> {
    use Item::*;
    let max = usage::Key::MAX_ARRAY as u8;
    vec![
        GUsagePage(Page::Key),
        GReportSize(8),
        GReportCount(MAX_KEYS as _),
        GLogicalMin(0),
        GLogicalMax(i32::from(max)),
        LUsageMin(0),
        LUsageMax(u32::from(max)),
        MInput(Flag::empty()),
    ]
}

/// An interface for converting characters into key presses. This is the
/// inverse of what the host does when it receives an input report, so the maps
/// on both sides have to match.
pub trait KeyMap {
    /// Converts a character into a [`Key`] or returns [`None`] if the
    /// character cannot be typed.
    fn key(&self, c: char) -> Option<Key>;
}

/// US keyboard map.
#[derive(Clone, Copy, Debug, Default)]
pub struct UsKeyMap;

impl KeyMap for UsKeyMap {
    fn key(&self, c: char) -> Option<Key> {
        use usage::Key as U;
        let offset = |base: U, first: u8| U::from(base as u8 + (c as u8 - first));
        Some(match c {
            'a'..='z' => Key::from(offset(U::A, b'a')),
            'A'..='Z' => Key::shift(offset(U::A, b'A')),
            '1'..='9' => Key::from(offset(U::Num1, b'1')),
            '0' => Key::from(U::Num0),
            '\n' => Key::from(U::Enter),
            '\u{1B}' => Key::from(U::Esc),
            '\u{08}' => Key::from(U::Backspace),
            '\t' => Key::from(U::Tab),
            ' ' => Key::from(U::Space),
            '\u{7F}' => Key::from(U::Delete),
            _ => return Self::symbol(c),
        })
    }
}

impl UsKeyMap {
    /// Punctuation and shifted symbols.
    fn symbol(c: char) -> Option<Key> {
        use usage::Key as U;
        // Unshifted and shifted character for each key
        const TAB: [(U, char, char); 11] = [
            (U::Minus, '-', '_'),
            (U::Equals, '=', '+'),
            (U::LeftBracket, '[', '{'),
            (U::RightBracket, ']', '}'),
            (U::Backslash, '\\', '|'),
            (U::Semicolon, ';', ':'),
            (U::Quote, '\'', '"'),
            (U::Backquote, '`', '~'),
            (U::Comma, ',', '<'),
            (U::Period, '.', '>'),
            (U::Slash, '/', '?'),
        ];
        const DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];
        if let Some(i) = DIGITS.iter().position(|&v| v == c) {
            let u = if i == 0 {
                U::Num0
            } else {
                #[allow(clippy::cast_possible_truncation)]
                U::from(U::Num1 as u8 + i as u8 - 1)
            };
            return Some(Key::shift(u));
        }
        TAB.iter().find_map(|&(u, lo, hi)| {
            if c == lo {
                Some(Key::from(u))
            } else if c == hi {
                Some(Key::shift(u))
            } else {
                None
            }
        })
    }
}

/// Converts a character into a key press using the US keyboard map.
#[inline]
#[must_use]
pub fn char_to_key(c: char) -> Option<Key> {
    UsKeyMap.key(c)
}
