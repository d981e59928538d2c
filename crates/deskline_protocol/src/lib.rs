//! # Deskline Protocol
//!
//! Wire message types and CBOR codecs for the deskline sync link.
//!
//! This crate defines the three logical channels the sync engine depends
//! on (Submit, Status, and Full Sync) as request/acknowledgment pairs,
//! plus the [`WireRecord`] payload they carry. It is a pure protocol crate
//! with no I/O: the physical link (discovery, pairing, framing, size
//! limits) belongs to the transport collaborator.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod wire;

pub use error::{WireError, WireResult};
pub use messages::{
    from_bytes, to_bytes, Message, SnapshotRequest, SnapshotResponse, StatusAck, StatusUpdate,
    SubmitAck, SubmitRequest,
};
pub use wire::{WireRecord, WireStatus};
