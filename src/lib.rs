//! Bluetooth LE HID-over-GATT peripheral core.
//!
//! Turns a host-agnostic input facade (pointer movement, buttons, keys, text,
//! media controls) into HID reports that are served by a GATT HID service and
//! delivered as notifications to one connected host. The platform BLE stack
//! is abstracted by the [`Transport`] trait.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_crate_dependencies)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]
#![warn(clippy::cargo)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
// #![warn(clippy::restriction)]
#![warn(clippy::assertions_on_result_states)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::empty_structs_with_brackets)]
#![warn(clippy::exit)]
#![warn(clippy::format_push_string)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::if_then_some_else_none)]
#![warn(clippy::mixed_read_write_in_expression)]
#![warn(clippy::mod_module_files)]
#![warn(clippy::mutex_atomic)]
#![warn(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![warn(clippy::rc_mutex)]
#![warn(clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::str_to_string)]
#![warn(clippy::string_add)]
#![warn(clippy::string_to_string)]
#![warn(clippy::todo)]
#![warn(clippy::try_err)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::unneeded_field_pattern)]
#![warn(clippy::unseparated_literal_suffix)]

pub use hidpad_hid as hid;

pub use {
    config::*,
    conn::{ConnParams, ConnectionInfo},
    peripheral::*,
    transport::*,
};

pub mod att;
mod config;
mod conn;
pub mod gatt;
pub mod hids;
pub mod le;
mod peripheral;
mod transport;

/// Error type returned by the peripheral.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Bluetooth adapter not found")]
    NoAdapter,
    #[error("Bluetooth is disabled")]
    BluetoothDisabled,
    #[error("peripheral mode is not supported by the adapter")]
    PeripheralModeUnsupported,
    #[error(transparent)]
    Advertise(#[from] AdvError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("host not connected")]
    NotConnected,
    #[error("keyboard report full")]
    ReportFull,
    #[error("{0} not supported")]
    Unsupported(&'static str),
}

impl Error {
    /// Returns whether the error is caused by an unavailable or unsuitable
    /// Bluetooth adapter.
    #[inline]
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            *self,
            Self::NoAdapter | Self::BluetoothDisabled | Self::PeripheralModeUnsupported
        )
    }
}

/// Common result type.
pub type Result<T> = std::result::Result<T, Error>;

type SyncMutex<T> = parking_lot::Mutex<T>;

/// Returns a string representation of the specified type.
macro_rules! name_of {
    ($t:ty) => {{
        type _T = $t;
        stringify!($t)
    }};
}
pub(crate) use name_of;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition() {
        assert!(Error::NoAdapter.is_precondition());
        assert!(Error::PeripheralModeUnsupported.is_precondition());
        assert!(!Error::NotConnected.is_precondition());
        assert!(!Error::Advertise(AdvError::InternalError).is_precondition());
        assert_eq!(
            Error::Unsupported("wheel").to_string(),
            "wheel not supported"
        );
    }
}
