use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

/// Bluetooth Base UUID ([Vol 3] Part B, Section 2.5.1).
const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;
const SHIFT: u32 = u128::BITS - u32::BITS;

/// 16-bit Bluetooth SIG UUID.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Uuid16(NonZeroU16);

impl Uuid16 {
    /// Creates a 16-bit SIG UUID from a `u16`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        match NonZeroU16::new(v) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Returns the raw 16-bit UUID value.
    #[inline(always)]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0.get()
    }

    /// Returns the 128-bit UUID derived from the Bluetooth Base UUID, for
    /// transports that only accept full UUIDs.
    #[inline]
    #[must_use]
    pub const fn to_u128(self) -> u128 {
        (self.0.get() as u128) << SHIFT | BASE
    }

    /// Returns the UUID as a little-endian byte array.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.get().to_le_bytes()
    }
}

impl Debug for Uuid16 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.0.get())
    }
}

impl Display for Uuid16 {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<Uuid16> for u16 {
    #[inline(always)]
    fn from(u: Uuid16) -> Self {
        u.raw()
    }
}

macro_rules! uuid16_enum {
    ($($(#[$meta:meta])* $vis:vis enum $name:ident { $($(#[$vmeta:meta])* $var:ident = $val:literal,)+ })+) => {$(
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            num_enum::IntoPrimitive,
            num_enum::TryFromPrimitive,
        )]
        #[non_exhaustive]
        #[repr(u16)]
        $vis enum $name {
            $($(#[$vmeta])* $var = $val,)+
        }

        impl $name {
            /// Returns the 16-bit UUID.
            #[inline]
            #[must_use]
            pub const fn uuid(self) -> Uuid16 {
                // SAFETY: All discriminants are non-zero
                Uuid16(unsafe { NonZeroU16::new_unchecked(self as u16) })
            }
        }

        impl From<$name> for Uuid16 {
            #[inline(always)]
            fn from(v: $name) -> Self {
                v.uuid()
            }
        }

        impl PartialEq<$name> for Uuid16 {
            #[inline(always)]
            fn eq(&self, rhs: &$name) -> bool {
                *self == rhs.uuid()
            }
        }
    )+};
}

uuid16_enum! {
    /// GATT services ([Assigned Numbers] Section 3.4.2).
    pub enum Service {
        HumanInterfaceDevice = 0x1812,
    }

    /// GATT characteristics ([Assigned Numbers] Section 3.8.2).
    pub enum Characteristic {
        HidInformation = 0x2A4A,
        ReportMap = 0x2A4B,
        HidControlPoint = 0x2A4C,
        Report = 0x2A4D,
        ProtocolMode = 0x2A4E,
    }

    /// GATT descriptors ([Assigned Numbers] Section 3.7).
    pub enum Descriptor {
        ClientCharacteristicConfiguration = 0x2902,
        ReportReference = 0x2908,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid16() {
        assert!(Uuid16::new(0).is_none());
        let u = Characteristic::Report.uuid();
        assert_eq!(u.raw(), 0x2A4D);
        assert_eq!(u.to_bytes(), [0x4D, 0x2A]);
        assert_eq!(format!("{u}"), "0x2A4D");
        assert_eq!(u, Characteristic::Report);
        assert_eq!(
            Service::HumanInterfaceDevice.uuid().to_u128(),
            0x00001812_0000_1000_8000_00805F9B34FB
        );
        assert_eq!(Descriptor::try_from(0x2908).ok(), Some(Descriptor::ReportReference));
    }
}
