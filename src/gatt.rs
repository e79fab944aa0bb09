//! Generic Attribute Profile ([Vol 3] Part G).
//!
//! Transport-independent service definitions. A [`ServiceDef`] carries the
//! attribute handles, UUIDs, properties, and permissions that a platform GATT
//! server needs to publish the service; value I/O goes through [`ReadReq`] and
//! [`WriteReq`].

pub use {consts::*, io::*, schema::*, uuid::*};

mod consts;
mod io;
mod schema;
mod uuid;
