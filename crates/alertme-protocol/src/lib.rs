//! AlertMe-over-ZigBee payload codec, message catalog and identifier tables.
//!
//! This crate is the pure, synchronous half of the hub protocol engine: no
//! I/O, no async runtime, nothing that touches a serial port. `hub-core`
//! builds the ingress/egress/association machinery on top of it.

pub mod attributes;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod ids;
pub mod zdp;

pub use attributes::{AttributeEntry, AttributeValue, ContactState, SwitchState};
pub use catalog::{Catalog, MessageFrame, MessageParams};
pub use error::CodecError;
