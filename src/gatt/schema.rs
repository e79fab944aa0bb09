use smallvec::SmallVec;

use crate::att::Handle;

use super::*;

/// Primary service definition ([Vol 3] Part G, Section 3.1). Handles are
/// assigned in declaration order: service declaration, then for each
/// characteristic its declaration, value, and descriptors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceDef {
    hdl: Handle,
    end: Handle,
    uuid: Uuid16,
    chars: Vec<CharacteristicDef>,
}

impl ServiceDef {
    /// Defines a primary service starting at `first` and calls `f` to define
    /// its characteristics.
    pub fn build(first: Handle, uuid: impl Into<Uuid16>, f: impl FnOnce(&mut Builder)) -> Self {
        let mut b = Builder {
            last: first,
            chars: Vec::with_capacity(8),
        };
        f(&mut b);
        Self {
            hdl: first,
            end: b.last,
            uuid: uuid.into(),
            chars: b.chars,
        }
    }

    /// Returns the service declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the last handle of the service.
    #[inline(always)]
    #[must_use]
    pub const fn end_handle(&self) -> Handle {
        self.end
    }

    /// Returns the service UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid16 {
        self.uuid
    }

    /// Returns all characteristics in declaration order.
    #[inline(always)]
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicDef] {
        &self.chars
    }

    /// Returns the characteristic with the specified value handle.
    #[must_use]
    pub fn characteristic(&self, hdl: Handle) -> Option<&CharacteristicDef> {
        self.chars.iter().find(|c| c.val == hdl)
    }

    /// Returns the descriptor with the specified handle and its
    /// characteristic.
    #[must_use]
    pub fn descriptor(&self, hdl: Handle) -> Option<(&CharacteristicDef, &DescriptorDef)> {
        (self.chars.iter()).find_map(|c| c.descs.iter().find(|d| d.hdl == hdl).map(|d| (c, d)))
    }
}

/// Characteristic definition ([Vol 3] Part G, Section 3.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharacteristicDef {
    decl: Handle,
    val: Handle,
    uuid: Uuid16,
    props: Prop,
    access: Access,
    value: Option<Box<[u8]>>,
    descs: SmallVec<[DescriptorDef; 2]>,
}

impl CharacteristicDef {
    /// Returns the characteristic declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.decl
    }

    /// Returns the characteristic value handle.
    #[inline(always)]
    #[must_use]
    pub const fn value_handle(&self) -> Handle {
        self.val
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid16 {
        self.uuid
    }

    /// Returns the characteristic properties.
    #[inline(always)]
    #[must_use]
    pub const fn properties(&self) -> Prop {
        self.props
    }

    /// Returns the value access permissions.
    #[inline(always)]
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Returns the static value of a read-only characteristic.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Returns all characteristic descriptors.
    #[inline(always)]
    #[must_use]
    pub fn descriptors(&self) -> &[DescriptorDef] {
        &self.descs
    }

    /// Returns the first descriptor with the specified UUID.
    #[must_use]
    pub fn descriptor(&self, uuid: impl Into<Uuid16>) -> Option<&DescriptorDef> {
        let uuid = uuid.into();
        self.descs.iter().find(|d| d.uuid == uuid)
    }

    /// Returns the Client Characteristic Configuration descriptor handle.
    #[inline]
    #[must_use]
    pub fn cccd(&self) -> Option<Handle> {
        (self.descriptor(Descriptor::ClientCharacteristicConfiguration)).map(DescriptorDef::handle)
    }
}

/// Characteristic descriptor definition ([Vol 3] Part G, Section 3.3.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DescriptorDef {
    hdl: Handle,
    uuid: Uuid16,
    access: Access,
    value: Option<Box<[u8]>>,
}

impl DescriptorDef {
    /// Returns the descriptor handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the descriptor UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid16 {
        self.uuid
    }

    /// Returns the descriptor access permissions.
    #[inline(always)]
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Returns the static descriptor value, if any.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

/// Service builder used to define characteristics and descriptors.
#[derive(Debug)]
pub struct Builder {
    last: Handle,
    chars: Vec<CharacteristicDef>,
}

impl Builder {
    /// Defines a characteristic with an externally provided value. Returns the
    /// value handle.
    pub fn characteristic(
        &mut self,
        uuid: impl Into<Uuid16>,
        props: Prop,
        access: Access,
        descs: impl FnOnce(&mut DescBuilder),
    ) -> Handle {
        self.decl_value(uuid.into(), props, access, None, descs)
    }

    /// Defines a read-only characteristic with a static value. Returns the
    /// value handle.
    pub fn ro_characteristic(
        &mut self,
        uuid: impl Into<Uuid16>,
        access: Access,
        val: impl AsRef<[u8]>,
    ) -> Handle {
        let val = Some(val.as_ref().into());
        self.decl_value(uuid.into(), Prop::READ, access, val, |_| {})
    }

    /// Adds characteristic declaration and value attributes followed by any
    /// descriptors.
    fn decl_value(
        &mut self,
        uuid: Uuid16,
        props: Prop,
        access: Access,
        value: Option<Box<[u8]>>,
        descs: impl FnOnce(&mut DescBuilder),
    ) -> Handle {
        let decl = self.next_handle();
        let val = self.next_handle();
        let mut d = DescBuilder {
            last: val,
            descs: SmallVec::new(),
        };
        descs(&mut d);
        self.last = d.last;
        self.chars.push(CharacteristicDef {
            decl,
            val,
            uuid,
            props,
            access,
            value,
            descs: d.descs,
        });
        val
    }

    /// Returns the next unused handle.
    #[inline]
    fn next_handle(&mut self) -> Handle {
        self.last = self.last.next().expect("maximum handle reached");
        self.last
    }
}

/// Characteristic descriptor builder.
#[derive(Debug)]
pub struct DescBuilder {
    last: Handle,
    descs: SmallVec<[DescriptorDef; 2]>,
}

impl DescBuilder {
    /// Declares a Client Characteristic Configuration descriptor
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[inline]
    pub fn client_cfg(&mut self, access: Access) -> Handle {
        assert!(
            !(self.descs.iter()).any(|d| d.uuid == Descriptor::ClientCharacteristicConfiguration),
            "descriptor already exists"
        );
        self.attr(Descriptor::ClientCharacteristicConfiguration.uuid(), access, None)
    }

    /// Declares a read-only descriptor with a static value.
    #[inline]
    pub fn ro_descriptor(
        &mut self,
        uuid: impl Into<Uuid16>,
        access: Access,
        val: impl AsRef<[u8]>,
    ) -> Handle {
        self.attr(uuid.into(), access, Some(val.as_ref().into()))
    }

    fn attr(&mut self, uuid: Uuid16, access: Access, value: Option<Box<[u8]>>) -> Handle {
        self.last = self.last.next().expect("maximum handle reached");
        self.descs.push(DescriptorDef {
            hdl: self.last,
            uuid,
            access,
            value,
        });
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_assignment() {
        let h = |v| Handle::new(v).unwrap();
        let mut cccd = None;
        let s = ServiceDef::build(h(0x10), Service::HumanInterfaceDevice, |b| {
            let v = b.ro_characteristic(Characteristic::HidInformation, Access::READ, [1, 2]);
            assert_eq!(v, h(0x12));
            let v = b.characteristic(
                Characteristic::Report,
                Prop::READ | Prop::NOTIFY,
                Access::READ,
                |d| {
                    cccd = Some(d.client_cfg(Access::READ_WRITE));
                    d.ro_descriptor(Descriptor::ReportReference, Access::READ, [1, 1]);
                },
            );
            assert_eq!(v, h(0x14));
        });
        assert_eq!(cccd, Some(h(0x15)));
        assert_eq!((s.handle(), s.end_handle()), (h(0x10), h(0x16)));
        assert_eq!(s.uuid(), Service::HumanInterfaceDevice);

        let c = s.characteristic(h(0x12)).unwrap();
        assert_eq!(c.handle(), h(0x11));
        assert_eq!(c.properties(), Prop::READ);
        assert_eq!(c.value(), Some([1, 2].as_slice()));
        assert!(c.cccd().is_none());

        let c = s.characteristic(h(0x14)).unwrap();
        assert_eq!(c.cccd(), Some(h(0x15)));
        let (p, d) = s.descriptor(h(0x16)).unwrap();
        assert_eq!(p.value_handle(), h(0x14));
        assert_eq!(d.uuid(), Descriptor::ReportReference);
        assert_eq!(d.value(), Some([1, 1].as_slice()));
        assert!(s.characteristic(h(0x15)).is_none());
    }
}
