use smallvec::{smallvec, SmallVec};

use hidpad_hid::descriptor::ReportDescriptor;
use hidpad_hid::{combined, kbd, media, mouse, ReportType};

use crate::gatt::{Access, Characteristic, Descriptor, Prop};

/// Keyboard report ID in the separate report topology.
pub const KEYBOARD_ID: u8 = 1;
/// Mouse report ID in the separate report topology.
pub const MOUSE_ID: u8 = 2;
/// Media report ID in the separate report topology.
pub const MEDIA_ID: u8 = 3;
/// Report ID of the combined report.
pub const COMBINED_ID: u8 = 1;

/// Report layout declared by the report map.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    enum_iterator::Sequence,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Topology {
    /// Keyboard, mouse, and media reports with their own report IDs and
    /// characteristics.
    #[default]
    Separate,
    /// One 12-byte report multiplexing all three kinds. There is no wheel.
    Combined,
}

/// Attribute security requirements.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    enum_iterator::Sequence,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Security {
    /// All attributes require an encrypted link ([HOGP] Section 6.1).
    #[default]
    Encrypted,
    /// No link requirements.
    Open,
}

impl Security {
    /// Applies the security requirements to `a`.
    #[inline]
    pub const fn apply(self, a: Access) -> Access {
        match self {
            Self::Encrypted => a.encrypt(),
            Self::Open => a,
        }
    }
}

/// Kind of input device state carried by a report.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum ReportKind {
    Keyboard,
    Mouse,
    Media,
    Combined,
}

/// Report characteristic reference.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ReportRef {
    pub kind: ReportKind,
    pub id: u8,
    pub typ: ReportType,
    pub len: usize,
}

impl ReportRef {
    /// Returns the Report Reference descriptor value ([HIDS] Section 3.6.2).
    #[inline(always)]
    #[must_use]
    pub const fn reference(self) -> [u8; 2] {
        [self.id, self.typ as _]
    }
}

/// Function of a HID service characteristic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Role {
    Information,
    ReportMap,
    ControlPoint,
    ProtocolMode,
    Report(ReportRef),
}

/// Characteristic descriptor metadata.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DescriptorSpec {
    pub uuid: Descriptor,
    pub access: Access,
    pub value: Option<[u8; 2]>,
}

/// Characteristic metadata.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharacteristicSpec {
    pub uuid: Characteristic,
    pub props: Prop,
    pub access: Access,
    pub descs: SmallVec<[DescriptorSpec; 2]>,
    pub role: Role,
}

/// HID service layout: HID Information value, report map, and the
/// characteristics that expose them. Built once from the configuration and
/// never modified.
#[derive(Clone, Debug)]
pub struct DescriptorTable {
    topology: Topology,
    security: Security,
    map: ReportDescriptor,
    reports: Vec<ReportRef>,
    specs: Vec<CharacteristicSpec>,
}

impl DescriptorTable {
    /// Maximum Report Map length ([HIDS] Section 3.6.1).
    pub const MAX_REPORT_MAP: usize = 512;

    /// HID specification release (1.11).
    const BCD_HID: u16 = 0x0111;

    /// HID Information flags: NormallyConnectable = 1, RemoteWake = 0.
    const FLAGS: u8 = 0b10;

    /// Creates the table for the specified report topology.
    ///
    /// # Panics
    ///
    /// Panics if the report map is too long.
    #[must_use]
    pub fn new(topology: Topology, security: Security) -> Self {
        use ReportKind::*;
        use ReportType::*;
        let report = |kind, id, typ, len| ReportRef { kind, id, typ, len };
        let (map, reports) = match topology {
            Topology::Separate => {
                let mut map = kbd::report_descriptor(KEYBOARD_ID, true);
                map.append(&mouse::report_descriptor(MOUSE_ID));
                map.append(&media::report_descriptor(MEDIA_ID));
                let reports = vec![
                    report(Keyboard, KEYBOARD_ID, Input, kbd::IN_LEN),
                    report(Keyboard, KEYBOARD_ID, Output, kbd::OUT_LEN),
                    report(Mouse, MOUSE_ID, Input, mouse::IN_LEN),
                    report(Media, MEDIA_ID, Input, media::IN_LEN),
                ];
                (map, reports)
            }
            Topology::Combined => (
                combined::report_descriptor(COMBINED_ID),
                vec![report(Combined, COMBINED_ID, Input, combined::IN_LEN)],
            ),
        };
        assert!(
            map.as_ref().len() <= Self::MAX_REPORT_MAP,
            "report descriptor too long"
        );
        let specs = Self::specs(security, &reports);
        Self {
            topology,
            security,
            map,
            reports,
            specs,
        }
    }

    /// Returns the characteristic layout ([HIDS] Section 2).
    fn specs(sec: Security, reports: &[ReportRef]) -> Vec<CharacteristicSpec> {
        use Characteristic::*;
        let ro = sec.apply(Access::READ);
        let wo = sec.apply(Access::WRITE);
        let rw = sec.apply(Access::READ_WRITE);
        let spec = |uuid, props, access, role| CharacteristicSpec {
            uuid,
            props,
            access,
            descs: SmallVec::new(),
            role,
        };
        let mut v = vec![
            spec(HidInformation, Prop::READ, ro, Role::Information),
            spec(ReportMap, Prop::READ, ro, Role::ReportMap),
            spec(HidControlPoint, Prop::WRITE_CMD, wo, Role::ControlPoint),
            spec(
                ProtocolMode,
                Prop::READ | Prop::WRITE_CMD,
                rw,
                Role::ProtocolMode,
            ),
        ];
        for &r in reports {
            let rref = DescriptorSpec {
                uuid: Descriptor::ReportReference,
                access: ro,
                value: Some(r.reference()),
            };
            let (props, descs) = if r.typ.is_input() {
                let cccd = DescriptorSpec {
                    uuid: Descriptor::ClientCharacteristicConfiguration,
                    access: rw,
                    value: None,
                };
                (Prop::READ | Prop::WRITE | Prop::NOTIFY, smallvec![cccd, rref])
            } else {
                (Prop::READ | Prop::WRITE | Prop::WRITE_CMD, smallvec![rref])
            };
            v.push(CharacteristicSpec {
                descs,
                ..spec(Report, props, rw, Role::Report(r))
            });
        }
        v
    }

    /// Returns the report topology.
    #[inline(always)]
    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Returns the attribute security requirements.
    #[inline(always)]
    #[must_use]
    pub const fn security(&self) -> Security {
        self.security
    }

    /// Returns the HID Information characteristic value
    /// ([HIDS] Section 3.7): bcdHID, bCountryCode, and flags.
    #[inline]
    #[must_use]
    pub const fn hid_information(&self) -> [u8; 4] {
        let v = Self::BCD_HID.to_le_bytes();
        [v[0], v[1], 0, Self::FLAGS]
    }

    /// Returns the Report Map characteristic value.
    #[inline(always)]
    #[must_use]
    pub fn report_map(&self) -> &[u8] {
        self.map.as_ref()
    }

    /// Returns the parsed report map.
    #[inline(always)]
    #[must_use]
    pub const fn report_descriptor(&self) -> &ReportDescriptor {
        &self.map
    }

    /// Returns characteristic metadata in declaration order.
    #[inline(always)]
    #[must_use]
    pub fn characteristic_specs(&self) -> &[CharacteristicSpec] {
        &self.specs
    }

    /// Returns all reports in declaration order.
    #[inline(always)]
    #[must_use]
    pub fn reports(&self) -> &[ReportRef] {
        &self.reports
    }

    /// Returns the report of the specified kind and type.
    #[must_use]
    pub fn report(&self, kind: ReportKind, typ: ReportType) -> Option<ReportRef> {
        (self.reports.iter()).find(|r| r.kind == kind && r.typ == typ).copied()
    }

    /// Returns the input reports that are sent zeroed when a host connects.
    /// Media goes first, then mouse, then keyboard.
    pub fn initial_reports(&self) -> impl Iterator<Item = ReportRef> + '_ {
        use ReportKind::*;
        [Media, Mouse, Keyboard, Combined]
            .into_iter()
            .filter_map(|k| self.report(k, ReportType::Input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_sizes() {
        for topo in enum_iterator::all::<Topology>() {
            let t = DescriptorTable::new(topo, Security::Encrypted);
            assert!(t.report_map().len() <= DescriptorTable::MAX_REPORT_MAP);
            for r in t.reports() {
                let bits = t.report_descriptor().report_bits(r.id, r.typ);
                assert_eq!(bits as usize, r.len * 8, "{topo:?} {r:?}");
            }
        }
    }

    #[test]
    fn hid_information() {
        let t = DescriptorTable::new(Topology::Separate, Security::Encrypted);
        assert_eq!(t.hid_information(), [0x11, 0x01, 0x00, 0b10]);
    }

    #[test]
    fn separate() {
        use Characteristic::*;
        let t = DescriptorTable::new(Topology::Separate, Security::Encrypted);
        let uuids: Vec<_> = t.characteristic_specs().iter().map(|c| c.uuid).collect();
        assert_eq!(
            uuids,
            [HidInformation, ReportMap, HidControlPoint, ProtocolMode, Report, Report, Report, Report]
        );
        for c in t.characteristic_specs() {
            assert!(c.access.is_encrypted());
        }

        let refs: Vec<_> = (t.characteristic_specs().iter())
            .filter_map(|c| c.descs.iter().find_map(|d| d.value))
            .collect();
        assert_eq!(refs, [[1, 1], [1, 2], [2, 1], [3, 1]]);

        let kin = &t.characteristic_specs()[4];
        assert_eq!(kin.props, Prop::READ | Prop::WRITE | Prop::NOTIFY);
        assert_eq!(kin.descs[0].uuid, Descriptor::ClientCharacteristicConfiguration);
        let kout = &t.characteristic_specs()[5];
        assert_eq!(kout.props, Prop::READ | Prop::WRITE | Prop::WRITE_CMD);
        assert_eq!(kout.descs.len(), 1);

        let init: Vec<_> = t.initial_reports().map(|r| r.kind).collect();
        assert_eq!(init, [ReportKind::Media, ReportKind::Mouse, ReportKind::Keyboard]);
    }

    #[test]
    fn combined() {
        let t = DescriptorTable::new(Topology::Combined, Security::Open);
        assert_eq!(t.reports().len(), 1);
        assert_eq!(t.characteristic_specs().len(), 5);
        assert!(!t.characteristic_specs()[0].access.is_encrypted());
        let init: Vec<_> = t.initial_reports().collect();
        assert_eq!(init.len(), 1);
        assert_eq!(init[0].len, 12);
        assert!(t.report(ReportKind::Mouse, ReportType::Input).is_none());
    }
}
