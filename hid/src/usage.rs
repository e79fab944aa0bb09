//! HID usage tables (\[HUT\]) for the pages used by the report map.

/// Usage page IDs (\[HUT\] Section 3).
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(u16)]
pub enum Page {
    /// Generic Desktop Page.
    GenericDesktop = 0x01,
    /// Keyboard/Keypad Page.
    Key = 0x07,
    /// LED Page.
    Led = 0x08,
    /// Button Page.
    Button = 0x09,
    /// Consumer Page.
    Consumer = 0x0C,
}

/// Generic Desktop usage IDs (\[HUT\] Section 4).
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(u8)]
pub enum GenericDesktop {
    Pointer = 0x01,
    Mouse = 0x02,
    Keyboard = 0x06,
    X = 0x30,
    Y = 0x31,
    Wheel = 0x38,
}

/// Consumer usage IDs (\[HUT\] Section 15) for media control.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
#[repr(u16)]
pub enum Consumer {
    ConsumerControl = 0x01,
    ScanNextTrack = 0xB5,
    ScanPreviousTrack = 0xB6,
    PlayPause = 0xCD,
    Mute = 0xE2,
    VolumeIncrement = 0xE9,
    VolumeDecrement = 0xEA,
}

/// LED usage IDs (\[HUT\] Section 11).
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(u8)]
pub enum Led {
    NumLock = 0x01,
    CapsLock = 0x02,
    ScrollLock = 0x03,
    Compose = 0x04,
    Kana = 0x05,
}

/// Keyboard/Keypad usage IDs (\[HUT\] Section 10).
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::FromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum Key {
    /// No key.
    #[default]
    None = 0x00,
    ErrRollOver = 0x01,
    PostFail = 0x02,
    ErrUndefined = 0x03,

    // Letters
    A = 0x04,
    B = 0x05,
    C = 0x06,
    D = 0x07,
    E = 0x08,
    F = 0x09,
    G = 0x0A,
    H = 0x0B,
    I = 0x0C,
    J = 0x0D,
    K = 0x0E,
    L = 0x0F,
    M = 0x10,
    N = 0x11,
    O = 0x12,
    P = 0x13,
    Q = 0x14,
    R = 0x15,
    S = 0x16,
    T = 0x17,
    U = 0x18,
    V = 0x19,
    W = 0x1A,
    X = 0x1B,
    Y = 0x1C,
    Z = 0x1D,

    // Digits
    Num1 = 0x1E,
    Num2 = 0x1F,
    Num3 = 0x20,
    Num4 = 0x21,
    Num5 = 0x22,
    Num6 = 0x23,
    Num7 = 0x24,
    Num8 = 0x25,
    Num9 = 0x26,
    Num0 = 0x27,

    // Control and punctuation
    Enter = 0x28,
    Esc = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equals = 0x2E,
    LeftBracket = 0x2F,
    RightBracket = 0x30,
    Backslash = 0x31,
    NonUsPound = 0x32,
    Semicolon = 0x33,
    Quote = 0x34,
    Backquote = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,

    // Function keys
    CapsLock = 0x39,
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    Right = 0x4F,
    Left = 0x50,
    Down = 0x51,
    Up = 0x52,

    // Keypad
    PadNumLock = 0x53,
    PadSlash = 0x54,
    PadMultiply = 0x55,
    PadMinus = 0x56,
    PadPlus = 0x57,
    PadEnter = 0x58,
    Pad1 = 0x59,
    Pad2 = 0x5A,
    Pad3 = 0x5B,
    Pad4 = 0x5C,
    Pad5 = 0x5D,
    Pad6 = 0x5E,
    Pad7 = 0x5F,
    Pad8 = 0x60,
    Pad9 = 0x61,
    Pad0 = 0x62,
    PadPeriod = 0x63,

    // Extra
    NonUsBackslash = 0x64,
    Application = 0x65,

    // Modifiers
    LeftCtrl = 0xE0,
    LeftShift = 0xE1,
    LeftAlt = 0xE2,
    LeftGui = 0xE3,
    RightCtrl = 0xE4,
    RightShift = 0xE5,
    RightAlt = 0xE6,
    RightGui = 0xE7,
}


impl Key {
    /// Largest non-modifier usage declared by the keyboard report map.
    pub const MAX_ARRAY: Self = Self::Application;

    /// Returns whether the key is `None`.
    #[inline(always)]
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns whether the key is a modifier (`LeftCtrl..=RightGui`), which is
    /// reported in the modifier byte instead of a key slot.
    #[inline]
    #[must_use]
    pub const fn is_modifier(self) -> bool {
        let u = self as u8;
        Self::LeftCtrl as u8 <= u && u <= Self::RightGui as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key() {
        assert!(Key::None.is_none());
        assert!(!Key::A.is_none());
        assert!(Key::LeftCtrl.is_modifier());
        assert!(Key::RightGui.is_modifier());
        assert!(!Key::Application.is_modifier());
        assert_eq!(u8::from(Key::Num0), 0x27);
        assert_eq!(Key::from(0x04), Key::A);
        assert_eq!(Key::from(0xE8), Key::None);
    }
}
