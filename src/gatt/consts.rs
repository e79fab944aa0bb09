use bitflags::bitflags;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Prop: u8 {
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permits writes of the Characteristic Value without response.
        const WRITE_CMD = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. If set, the Client Characteristic Configuration
        /// Descriptor shall exist.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        const INDICATE = 0x20;
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Cccd: u16 {
        /// The Characteristic Value shall be notified.
        const NOTIFY = 1 << 0;
        /// The Characteristic Value shall be indicated.
        const INDICATE = 1 << 1;
    }
}

impl Cccd {
    /// Parses a written descriptor value. Returns `None` if the value is not
    /// exactly two bytes long.
    #[inline]
    #[must_use]
    pub fn from_value(v: &[u8]) -> Option<Self> {
        let v: [u8; 2] = v.try_into().ok()?;
        Some(Self::from_bits_retain(u16::from_le_bytes(v)))
    }

    /// Returns the descriptor value.
    #[inline(always)]
    #[must_use]
    pub const fn to_value(self) -> [u8; 2] {
        self.bits().to_le_bytes()
    }
}

bitflags! {
    /// Attribute access permissions ([Vol 3] Part F, Section 3.2.5).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    struct Perm: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        const ENCRYPT = 1 << 2;
        const AUTHN = 1 << 3;
    }
}

/// Access permission builder.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[must_use]
#[repr(transparent)]
pub struct Access(Perm);

impl Access {
    /// No access.
    pub const NONE: Self = Self(Perm::empty());

    /// Read access permission.
    pub const READ: Self = Self(Perm::READ);

    /// Write access permission.
    pub const WRITE: Self = Self(Perm::WRITE);

    /// Read/write access permission.
    pub const READ_WRITE: Self = Self(Perm::READ_WRITE);

    /// Sets the encryption requirement.
    #[inline]
    pub const fn encrypt(self) -> Self {
        Self(self.0.union(Perm::ENCRYPT))
    }

    /// Sets the authentication requirement.
    #[inline]
    pub const fn authn(self) -> Self {
        Self(self.0.union(Perm::AUTHN))
    }

    /// Returns whether reads are permitted.
    #[inline(always)]
    #[must_use]
    pub const fn can_read(self) -> bool {
        self.0.contains(Perm::READ)
    }

    /// Returns whether writes are permitted.
    #[inline(always)]
    #[must_use]
    pub const fn can_write(self) -> bool {
        self.0.contains(Perm::WRITE)
    }

    /// Returns whether the link must be encrypted.
    #[inline(always)]
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        self.0.contains(Perm::ENCRYPT)
    }

    /// Returns whether the link must be authenticated.
    #[inline(always)]
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        self.0.contains(Perm::AUTHN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cccd() {
        assert_eq!(Cccd::from_value(&[1, 0]), Some(Cccd::NOTIFY));
        assert_eq!(Cccd::from_value(&[0, 0]), Some(Cccd::empty()));
        assert_eq!(Cccd::from_value(&[1]), None);
        assert_eq!(Cccd::INDICATE.to_value(), [2, 0]);
    }

    #[test]
    fn access() {
        const RW: Access = Access::READ_WRITE.encrypt();
        assert!(RW.can_read() && RW.can_write() && RW.is_encrypted());
        assert!(!RW.is_authenticated());
        assert!(!Access::READ.can_write());
        assert!(Access::WRITE.authn().is_authenticated());
        assert!(!Access::NONE.can_read());
    }
}
