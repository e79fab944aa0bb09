//! Platform BLE stack interface.
//!
//! The peripheral core never talks to a Bluetooth controller directly. Each
//! target platform provides a [`Transport`] implementation that performs GAP
//! advertising, GATT server registration, and notifications, and delivers
//! connection events and attribute requests back to [`crate::Peripheral`].

use std::fmt::Debug;

use crate::att::Handle;
use crate::gatt::{ServiceDef, Uuid16};
use crate::le::{Addr, TxPower};

/// Local adapter availability.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum AdapterState {
    #[default]
    Ready,
    /// No Bluetooth adapter.
    Missing,
    /// Adapter is present but powered off.
    Disabled,
    /// Adapter does not support the peripheral role.
    NoPeripheralMode,
}

/// Advertising parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct AdvParams {
    pub service: Uuid16,
    pub name: String,
    pub appearance: u16,
    pub tx_power: TxPower,
    pub connectable: bool,
}

/// Advertising failure reported by the platform.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
    thiserror::Error,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum AdvError {
    #[error("advertising data too large")]
    DataTooLarge = 1,
    #[error("advertising already started")]
    AlreadyStarted = 2,
    #[error("advertising feature unsupported")]
    FeatureUnsupported = 3,
    #[error("internal advertising error")]
    InternalError = 4,
    #[error("too many advertisers")]
    TooManyAdvertisers = 5,
}

/// GATT server failure reported by the platform.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("GATT server unavailable")]
    ServerUnavailable,
    #[error("service registration failed: {0}")]
    Registration(String),
}

/// Platform BLE stack. Methods must not block; they are called while the
/// peripheral state lock is held, except for [`Transport::notify`].
pub trait Transport: Debug + Send + Sync + 'static {
    /// Returns the adapter state.
    fn adapter_state(&self) -> AdapterState;

    /// Starts advertising.
    fn start_advertising(&self, p: &AdvParams) -> Result<(), AdvError>;

    /// Stops advertising. Must be safe to call when not advertising.
    fn stop_advertising(&self);

    /// Registers a GATT service.
    fn add_service(&self, s: &ServiceDef) -> Result<(), TransportError>;

    /// Removes a previously registered GATT service.
    fn remove_service(&self, s: &ServiceDef);

    /// Sends a characteristic value notification. Returns `false` if the stack
    /// did not accept it, which is usually a transient busy condition.
    fn notify(&self, peer: Addr, hdl: Handle, uuid: Uuid16, v: &[u8]) -> bool;

    /// Opens an auxiliary client connection to the peer that is used to read
    /// connection parameters. Returns `false` if the connection could not be
    /// initiated.
    fn connect_client(&self, peer: Addr) -> bool;

    /// Closes the auxiliary client connection.
    fn disconnect_client(&self, peer: Addr);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adv_error_codes() {
        assert_eq!(u8::from(AdvError::DataTooLarge), 1);
        assert_eq!(AdvError::try_from(5).ok(), Some(AdvError::TooManyAdvertisers));
        assert!(AdvError::try_from(0).is_err());
        assert_eq!(AdvError::AlreadyStarted.to_string(), "advertising already started");
    }
}
