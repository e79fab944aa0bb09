//! Connected peer state.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use hidpad_hid::kbd::{KeyboardReport, Led};
use hidpad_hid::media::MediaKey;
use hidpad_hid::mouse::Button;

use crate::att::Handle;
use crate::gatt::DEFAULT_MTU;
use crate::le::Addr;

/// Report value buffer.
pub(crate) type ReportBuf = SmallVec<[u8; 12]>;

/// Connection parameters gathered from the transport. All values except the
/// MTU are best-effort diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ConnParams {
    /// ATT MTU.
    pub mtu: u16,
    /// Last received signal strength in dBm.
    pub rssi: Option<i8>,
    /// Connection interval in 1.25 ms units.
    pub interval: Option<u16>,
    /// Peripheral latency in connection events.
    pub latency: Option<u16>,
    /// Supervision timeout in 10 ms units.
    pub timeout: Option<u16>,
}

impl Default for ConnParams {
    #[inline]
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            rssi: None,
            interval: None,
            latency: None,
            timeout: None,
        }
    }
}

/// Aggregate input device state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct InputState {
    pub kbd: KeyboardReport,
    pub buttons: Button,
    pub media: MediaKey,
}

/// State of the connected peer. Created when the peer connects and discarded
/// when it disconnects, so notification state never carries over.
#[derive(Debug)]
pub(crate) struct Connection {
    peer: Addr,
    pub input: InputState,
    pub led: Led,
    pub suspended: bool,
    pub params: ConnParams,
    client: bool,
    values: BTreeMap<Handle, ReportBuf>,
}

impl Connection {
    /// Creates state for a new connection.
    #[inline]
    #[must_use]
    pub fn new(peer: Addr) -> Self {
        Self {
            peer,
            input: InputState::default(),
            led: Led::empty(),
            suspended: false,
            params: ConnParams::default(),
            client: false,
            values: BTreeMap::new(),
        }
    }

    /// Returns the peer address.
    #[inline(always)]
    #[must_use]
    pub const fn peer(&self) -> Addr {
        self.peer
    }

    /// Returns whether the auxiliary client connection is open.
    #[inline(always)]
    #[must_use]
    pub const fn has_client(&self) -> bool {
        self.client
    }

    /// Records the auxiliary client connection state.
    #[inline(always)]
    pub fn set_client(&mut self, open: bool) {
        self.client = open;
    }

    /// Returns the last value of the report characteristic `hdl`.
    #[inline]
    #[must_use]
    pub fn value(&self, hdl: Handle) -> Option<&[u8]> {
        self.values.get(&hdl).map(SmallVec::as_slice)
    }

    /// Records the current value of the report characteristic `hdl`.
    #[inline]
    pub fn set_value(&mut self, hdl: Handle, v: &[u8]) {
        self.values.insert(hdl, ReportBuf::from_slice(v));
    }

    /// Returns a snapshot of the connection for diagnostics.
    #[must_use]
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            peer: self.peer,
            params: self.params,
            led: self.led,
            suspended: self.suspended,
            client: self.client,
        }
    }
}

/// Connection snapshot returned by [`crate::Peripheral::connection_info`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ConnectionInfo {
    pub peer: Addr,
    pub params: ConnParams,
    pub led: Led,
    pub suspended: bool,
    pub client: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values() {
        let mut c = Connection::new(Addr::default());
        let h = Handle::new(9).unwrap();
        assert!(c.value(h).is_none());
        c.set_value(h, &[1, 2, 3, 4]);
        assert_eq!(c.value(h), Some([1, 2, 3, 4].as_slice()));
        c.set_value(h, &[0; 4]);
        assert_eq!(c.value(h), Some([0; 4].as_slice()));

        let info = c.info();
        assert_eq!(info.params.mtu, DEFAULT_MTU);
        assert!(!info.suspended && !info.client);
    }
}
