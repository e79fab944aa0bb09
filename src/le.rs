//! LE-specific types.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Bluetooth device address ([Vol 6] Part B, Section 1.3). This is the peer
/// identity used by the transport.
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Addr {
    Public(RawAddr),
    Random(RawAddr),
}

impl Addr {
    /// Returns the raw 48-bit address.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> RawAddr {
        match self {
            Self::Public(addr) | Self::Random(addr) => addr,
        }
    }
}

impl Default for Addr {
    #[inline]
    fn default() -> Self {
        Self::Public(RawAddr::default())
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Public(a) => write!(f, "Public({a})"),
            Self::Random(a) => write!(f, "Random({a})"),
        }
    }
}

/// 48-bit untyped device address stored in little-endian byte order.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct RawAddr([u8; 6]);

impl RawAddr {
    /// Creates an address from little-endian bytes.
    #[inline(always)]
    #[must_use]
    pub const fn new(v: [u8; 6]) -> Self {
        Self(v)
    }
}

impl From<[u8; 6]> for RawAddr {
    #[inline]
    fn from(v: [u8; 6]) -> Self {
        Self(v)
    }
}

impl AsRef<[u8]> for RawAddr {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for RawAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // [Vol 3] Part C, Section 3.2.1.3
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl Display for RawAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl FromStr for RawAddr {
    type Err = ();

    /// Parses the `XX:XX:XX:XX:XX:XX` display format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut v = [0; 6];
        let mut it = s.split(':');
        for b in v.iter_mut().rev() {
            let p = it.next().ok_or(())?;
            if p.len() != 2 {
                return Err(());
            }
            *b = u8::from_str_radix(p, 16).map_err(|_| ())?;
        }
        it.next().map_or(Ok(Self(v)), |_| Err(()))
    }
}

/// Advertising transmission power level. The platform maps each level to a
/// concrete dBm value.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TxPower {
    UltraLow,
    Low,
    Medium,
    #[default]
    High,
}

impl TxPower {
    /// Returns the typical power level in dBm.
    #[inline]
    #[must_use]
    pub const fn dbm(self) -> i8 {
        match self {
            Self::UltraLow => -21,
            Self::Low => -15,
            Self::Medium => -7,
            Self::High => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_addr() {
        let a = RawAddr::from([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(a.to_string(), "11:22:33:44:55:66");
        assert_eq!("11:22:33:44:55:66".parse::<RawAddr>(), Ok(a));
        assert!("11:22:33:44:55".parse::<RawAddr>().is_err());
        assert!("11:22:33:44:55:66:77".parse::<RawAddr>().is_err());
        assert!("11:22:33:44:55:6".parse::<RawAddr>().is_err());
        assert_eq!(Addr::Random(a).to_string(), "Random(11:22:33:44:55:66)");
        assert_eq!(Addr::Random(a).raw(), a);
    }

    #[test]
    fn tx_power() {
        assert_eq!(TxPower::default(), TxPower::High);
        assert!(TxPower::UltraLow < TxPower::High);
        assert_eq!(TxPower::Medium.dbm(), -7);
    }
}
