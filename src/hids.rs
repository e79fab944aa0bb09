//! Human Interface Device Service ([HIDS]).
//!
//! This service exposes HID reports and other data intended for HID hosts.
//!
//! The HID-over-GATT Profile ([HOGP]) defines how a device can support HID
//! services over the Bluetooth LE protocol stack using the Generic Attribute
//! Profile.
//!
//! [HIDS]: https://www.bluetooth.com/specifications/specs/human-interface-device-service-1-0/
//! [HOGP]: https://www.bluetooth.com/specifications/specs/hid-over-gatt-profile-1-0/

pub use {dispatch::*, service::*, table::*};

mod dispatch;
mod service;
mod table;
