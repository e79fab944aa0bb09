use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::warn;

use hidpad_hid::kbd::Led;
use hidpad_hid::ReportType;

use crate::att::{ErrorCode, Handle};
use crate::conn::{Connection, ReportBuf};
use crate::gatt::{Cccd, Descriptor, IoResult, ReadReq, Service, ServiceDef, WriteReq};

use super::*;

/// Builds the transport-level HID service definition.
#[derive(Clone, Copy, Debug)]
#[must_use]
pub struct ServiceBuilder<'a> {
    table: &'a DescriptorTable,
    first: Handle,
}

impl<'a> ServiceBuilder<'a> {
    /// Creates a builder for the specified table. Handles start at `0x0001`.
    #[inline]
    pub const fn new(table: &'a DescriptorTable) -> Self {
        Self {
            table,
            first: Handle::MIN,
        }
    }

    /// Defines the primary HID service. Characteristics and descriptors are
    /// declared in the table order.
    #[must_use]
    pub fn build(&self) -> ServiceDef {
        let t = self.table;
        ServiceDef::build(self.first, Service::HumanInterfaceDevice, |b| {
            for c in t.characteristic_specs() {
                match c.role {
                    Role::Information => {
                        b.ro_characteristic(c.uuid, c.access, t.hid_information());
                    }
                    Role::ReportMap => {
                        b.ro_characteristic(c.uuid, c.access, t.report_map());
                    }
                    Role::ControlPoint | Role::ProtocolMode | Role::Report(_) => {
                        b.characteristic(c.uuid, c.props, c.access, |d| {
                            for s in &c.descs {
                                match s.value {
                                    None => d.client_cfg(s.access),
                                    Some(v) => d.ro_descriptor(s.uuid, s.access, v),
                                };
                            }
                        });
                    }
                }
            }
        })
    }
}

/// Function of a service attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Attr {
    Value(Role),
    Cccd(Handle),
    Reference([u8; 2]),
}

/// Result of a successful write that the caller must act on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WriteEffect {
    None,
    /// CCCD write for the report characteristic `hdl`.
    Notify { hdl: Handle, enabled: bool },
    /// Keyboard LED state changed.
    Led(Led),
    /// Host entered or exited suspend state.
    Suspend(bool),
}

/// HID service attribute server. Maps attribute handles to their function and
/// answers read and write requests against the connection state.
#[derive(Debug)]
pub struct HidService {
    table: Arc<DescriptorTable>,
    def: OnceCell<(Arc<ServiceDef>, BTreeMap<Handle, Attr>)>,
}

impl HidService {
    /// Protocol Mode characteristic values ([HIDS] Section 3.8).
    const BOOT_PROTOCOL: u8 = 0;
    const REPORT_PROTOCOL: u8 = 1;

    /// Creates a HID service for the specified table.
    #[inline]
    #[must_use]
    pub fn new(table: Arc<DescriptorTable>) -> Self {
        Self {
            table,
            def: OnceCell::new(),
        }
    }

    /// Returns the descriptor table.
    #[inline(always)]
    #[must_use]
    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    /// Returns the service definition, building it on first use.
    #[inline]
    #[must_use]
    pub fn def(&self) -> &Arc<ServiceDef> {
        &self.state().0
    }

    fn state(&self) -> &(Arc<ServiceDef>, BTreeMap<Handle, Attr>) {
        self.def.get_or_init(|| {
            let def = ServiceBuilder::new(&self.table).build();
            let mut attrs = BTreeMap::new();
            let chars = def.characteristics().iter();
            for (c, s) in chars.zip(self.table.characteristic_specs()) {
                attrs.insert(c.value_handle(), Attr::Value(s.role));
                for d in c.descriptors() {
                    let a = if d.uuid() == Descriptor::ClientCharacteristicConfiguration {
                        Attr::Cccd(c.value_handle())
                    } else {
                        let v = d.value().and_then(|v| v.try_into().ok());
                        Attr::Reference(v.unwrap_or_default())
                    };
                    attrs.insert(d.handle(), a);
                }
            }
            (Arc::new(def), attrs)
        })
    }

    #[inline]
    fn attr(&self, hdl: Handle) -> Option<Attr> {
        self.state().1.get(&hdl).copied()
    }

    /// Returns the value handle of the report characteristic.
    #[must_use]
    pub fn report_handle(&self, kind: ReportKind, typ: ReportType) -> Option<Handle> {
        self.state().1.iter().find_map(|(&h, a)| match *a {
            Attr::Value(Role::Report(r)) if r.kind == kind && r.typ == typ => Some(h),
            _ => None,
        })
    }

    /// Returns the reports that are sent zeroed when a host connects, in send
    /// order.
    #[must_use]
    pub fn initial_reports(&self) -> Vec<(Handle, ReportRef)> {
        (self.table.initial_reports())
            .filter_map(|r| self.report_handle(r.kind, r.typ).map(|h| (h, r)))
            .collect()
    }

    /// Returns the report characteristic value handle if `hdl` is a CCCD.
    #[inline]
    #[must_use]
    pub fn cccd_target(&self, hdl: Handle) -> Option<Handle> {
        match self.attr(hdl) {
            Some(Attr::Cccd(v)) => Some(v),
            _ => None,
        }
    }

    /// Returns the current value of a report characteristic.
    pub(crate) fn report_value(conn: Option<&Connection>, hdl: Handle, r: ReportRef) -> ReportBuf {
        match (conn, r.typ) {
            (Some(c), ReportType::Output) => ReportBuf::from_slice(&[c.led.bits()]),
            (Some(c), _) => (c.value(hdl))
                .map_or_else(|| ReportBuf::from_elem(0, r.len), ReportBuf::from_slice),
            (None, _) => ReportBuf::from_elem(0, r.len),
        }
    }

    /// Returns the current value of the report characteristic `hdl`.
    pub(crate) fn value(&self, conn: Option<&Connection>, hdl: Handle) -> Option<ReportBuf> {
        match self.attr(hdl) {
            Some(Attr::Value(Role::Report(r))) => Some(Self::report_value(conn, hdl, r)),
            _ => None,
        }
    }

    /// Handles a characteristic or non-CCCD descriptor read.
    pub(crate) fn read(&self, conn: Option<&Connection>, req: &mut ReadReq) -> IoResult {
        let hdl = req.handle();
        match self.attr(hdl).ok_or(ErrorCode::InvalidHandle)? {
            Attr::Value(Role::Information) => req.complete(self.table.hid_information()),
            Attr::Value(Role::ReportMap) => req.complete(self.table.report_map()),
            Attr::Value(Role::ControlPoint) => Err(ErrorCode::ReadNotPermitted),
            Attr::Value(Role::ProtocolMode) => req.complete([Self::REPORT_PROTOCOL]),
            Attr::Value(Role::Report(r)) => req.complete(Self::report_value(conn, hdl, r)),
            Attr::Reference(v) => req.complete(v),
            Attr::Cccd(_) => Err(ErrorCode::UnlikelyError),
        }
    }

    /// Handles a characteristic or descriptor write.
    pub(crate) fn write(
        &self,
        conn: &mut Connection,
        req: &WriteReq,
    ) -> Result<WriteEffect, ErrorCode> {
        let hdl = req.handle();
        match self.attr(hdl).ok_or(ErrorCode::InvalidHandle)? {
            Attr::Value(Role::Information | Role::ReportMap) | Attr::Reference(_) => {
                Err(ErrorCode::WriteNotPermitted)
            }
            Attr::Value(Role::ControlPoint) => {
                // [HIDS] Section 3.9
                let suspend = match req.u8()? {
                    0 => true,
                    1 => false,
                    v => {
                        warn!("Invalid HID Control Point command: {v:#04X}");
                        return Err(ErrorCode::ValueNotAllowed);
                    }
                };
                conn.suspended = suspend;
                Ok(WriteEffect::Suspend(suspend))
            }
            Attr::Value(Role::ProtocolMode) => match req.u8()? {
                Self::REPORT_PROTOCOL => Ok(WriteEffect::None),
                Self::BOOT_PROTOCOL => {
                    warn!("Boot protocol mode is not supported");
                    Err(ErrorCode::ValueNotAllowed)
                }
                _ => Err(ErrorCode::ValueNotAllowed),
            },
            Attr::Value(Role::Report(r)) if r.typ == ReportType::Output => {
                let mut v = [conn.led.bits()];
                req.update(&mut v)?;
                conn.led = Led::from_bits_truncate(v[0]);
                Ok(WriteEffect::Led(conn.led))
            }
            Attr::Value(Role::Report(r)) => {
                let mut v = Self::report_value(Some(conn), hdl, r);
                req.update(&mut v)?;
                conn.set_value(hdl, &v);
                Ok(WriteEffect::None)
            }
            Attr::Cccd(val) => {
                if req.offset() != 0 {
                    return Err(ErrorCode::InvalidOffset);
                }
                let c = Cccd::from_value(req.value())
                    .ok_or(ErrorCode::InvalidAttributeValueLength)?;
                if c.contains(Cccd::INDICATE) {
                    return Err(ErrorCode::CccdImproperlyConfigured);
                }
                Ok(WriteEffect::Notify {
                    hdl: val,
                    enabled: c.contains(Cccd::NOTIFY),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::gatt::{Characteristic, Prop, DEFAULT_MTU};
    use crate::le::Addr;

    use super::*;

    fn service(topo: Topology) -> HidService {
        HidService::new(Arc::new(DescriptorTable::new(topo, Security::Encrypted)))
    }

    fn read(s: &HidService, c: Option<&Connection>, hdl: Handle, off: u16) -> Result<Vec<u8>, ErrorCode> {
        let mut r = ReadReq::new(hdl, off, DEFAULT_MTU);
        s.read(c, &mut r).map(|_| r.value().to_vec())
    }

    fn write(s: &HidService, c: &mut Connection, hdl: Handle, v: &[u8]) -> Result<WriteEffect, ErrorCode> {
        s.write(c, &WriteReq::new(hdl, 0, v))
    }

    #[test]
    fn layout() {
        let s = service(Topology::Separate);
        let def = s.def();
        assert!(Arc::ptr_eq(def, s.def()));
        assert_eq!(def.uuid(), Service::HumanInterfaceDevice);
        let chars = def.characteristics();
        assert_eq!(chars.len(), 8);
        assert_eq!(chars[0].uuid(), Characteristic::HidInformation);
        assert_eq!(chars[0].value(), Some([0x11, 0x01, 0, 0b10].as_slice()));
        assert_eq!(chars[1].value(), Some(s.table().report_map()));
        assert_eq!(chars[2].properties(), Prop::WRITE_CMD);
        assert_eq!(chars[3].properties(), Prop::READ | Prop::WRITE_CMD);
        for c in &chars[4..] {
            assert_eq!(c.uuid(), Characteristic::Report);
            assert!(c.descriptor(Descriptor::ReportReference).is_some());
        }
        assert!(chars[4].cccd().is_some());
        assert!(chars[5].cccd().is_none());
        assert_eq!(chars[6].descriptors()[1].value(), Some([2, 1].as_slice()));

        // Handles are contiguous
        assert_eq!(u16::from(def.handle()), 1);
        assert_eq!(u16::from(chars[0].value_handle()), 3);
        let last = chars[7].descriptors()[1].handle();
        assert_eq!(def.end_handle(), last);

        let kin = s.report_handle(ReportKind::Keyboard, ReportType::Input).unwrap();
        assert_eq!(kin, chars[4].value_handle());
        assert_eq!(s.cccd_target(chars[4].cccd().unwrap()), Some(kin));
        assert_eq!(s.cccd_target(kin), None);

        let init: Vec<_> = s.initial_reports().into_iter().map(|(h, _)| h).collect();
        assert_eq!(
            init,
            [chars[7].value_handle(), chars[6].value_handle(), chars[4].value_handle()]
        );
    }

    #[test]
    fn long_read() {
        let s = service(Topology::Separate);
        let hdl = s.def().characteristics()[1].value_handle();
        let map = s.table().report_map().to_vec();
        assert!(map.len() > usize::from(DEFAULT_MTU));
        let mut got = Vec::new();
        while got.len() < map.len() {
            let off = u16::try_from(got.len()).unwrap();
            got.extend(read(&s, None, hdl, off).unwrap());
        }
        assert_eq!(got, map);
        assert_eq!(read(&s, None, hdl, u16::try_from(map.len()).unwrap()), Ok(vec![]));
        assert_eq!(
            read(&s, None, hdl, u16::try_from(map.len() + 1).unwrap()),
            Err(ErrorCode::InvalidOffset)
        );
    }

    #[test]
    fn control_and_protocol() {
        let s = service(Topology::Separate);
        let mut c = Connection::new(Addr::default());
        let chars = s.def().characteristics();
        let (cp, pm) = (chars[2].value_handle(), chars[3].value_handle());

        assert_eq!(write(&s, &mut c, cp, &[0]), Ok(WriteEffect::Suspend(true)));
        assert!(c.suspended);
        assert_eq!(write(&s, &mut c, cp, &[1]), Ok(WriteEffect::Suspend(false)));
        assert!(!c.suspended);
        assert_eq!(write(&s, &mut c, cp, &[2]), Err(ErrorCode::ValueNotAllowed));
        assert_eq!(read(&s, Some(&c), cp, 0), Err(ErrorCode::ReadNotPermitted));

        assert_eq!(read(&s, Some(&c), pm, 0), Ok(vec![1]));
        assert_eq!(write(&s, &mut c, pm, &[1]), Ok(WriteEffect::None));
        assert_eq!(write(&s, &mut c, pm, &[0]), Err(ErrorCode::ValueNotAllowed));
        assert_eq!(write(&s, &mut c, pm, &[2]), Err(ErrorCode::ValueNotAllowed));
        assert_eq!(read(&s, Some(&c), pm, 0), Ok(vec![1]));

        let info = chars[0].value_handle();
        assert_eq!(write(&s, &mut c, info, &[0]), Err(ErrorCode::WriteNotPermitted));
        let bad = Handle::new(0x0100).unwrap();
        assert_eq!(read(&s, None, bad, 0), Err(ErrorCode::InvalidHandle));
    }

    #[test]
    fn reports() {
        let s = service(Topology::Separate);
        let mut c = Connection::new(Addr::default());
        let chars = s.def().characteristics();
        let (kin, kout) = (chars[4].value_handle(), chars[5].value_handle());

        assert_eq!(read(&s, Some(&c), kin, 0), Ok(vec![0; 8]));
        assert_eq!(read(&s, None, chars[6].value_handle(), 0), Ok(vec![0; 4]));
        c.set_value(kin, &[2, 0, 4, 0, 0, 0, 0, 0]);
        assert_eq!(read(&s, Some(&c), kin, 0), Ok(vec![2, 0, 4, 0, 0, 0, 0, 0]));

        assert_eq!(
            write(&s, &mut c, kout, &[0x03]),
            Ok(WriteEffect::Led(Led::NUM_LOCK | Led::CAPS_LOCK))
        );
        assert_eq!(read(&s, Some(&c), kout, 0), Ok(vec![0x03]));
        assert_eq!(
            write(&s, &mut c, kout, &[1, 2]),
            Err(ErrorCode::InvalidAttributeValueLength)
        );

        let rref = chars[5].descriptors()[0].handle();
        assert_eq!(read(&s, None, rref, 0), Ok(vec![1, 2]));
        assert_eq!(write(&s, &mut c, rref, &[0, 0]), Err(ErrorCode::WriteNotPermitted));
    }

    #[test]
    fn cccd() {
        let s = service(Topology::Combined);
        let mut c = Connection::new(Addr::default());
        let ch = &s.def().characteristics()[4];
        let (val, cccd) = (ch.value_handle(), ch.cccd().unwrap());
        assert_eq!(
            write(&s, &mut c, cccd, &[1, 0]),
            Ok(WriteEffect::Notify { hdl: val, enabled: true })
        );
        assert_eq!(
            write(&s, &mut c, cccd, &[0, 0]),
            Ok(WriteEffect::Notify { hdl: val, enabled: false })
        );
        assert_eq!(
            write(&s, &mut c, cccd, &[2, 0]),
            Err(ErrorCode::CccdImproperlyConfigured)
        );
        assert_eq!(
            write(&s, &mut c, cccd, &[1]),
            Err(ErrorCode::InvalidAttributeValueLength)
        );
        assert_eq!(read(&s, Some(&c), val, 0), Ok(vec![0; 12]));
    }
}
