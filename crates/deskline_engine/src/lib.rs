//! # Deskline Engine
//!
//! Connection state machine and reconnect handshake for deskline.
//!
//! This crate provides:
//! - The link state machine (disconnected → connected → three handshake
//!   steps → synced)
//! - The three-step reconnect handshake with bounded per-record retry
//! - Inbound packet handlers with the duplicate/replay policy
//! - The submit and fulfillment action handlers with opportunistic
//!   single-record transmission
//! - A transport abstraction over the wireless link's three channels
//!
//! ## Architecture
//!
//! Both device roles run the **same engine**, parameterized by a role
//! capability that decides the direction of each handshake step:
//! 1. The Front Desk pushes unsynced creations (Channel A)
//! 2. The Back Office pushes unsynced fulfillments (Channel B)
//! 3. The Front Desk bulk-reads the Back Office's complete set and merges
//!    (Channel C); the authority's fulfillment state always wins
//!
//! ## Key Invariants
//!
//! - `Disconnected` is the universal fallback: exhausted retries and link
//!   loss both land there, and the next reconnect resumes the work
//! - Every store mutation is independently atomic, so cancelling a
//!   handshake mid-step only loses progress, never correctness
//! - Only store durability failures and `NotFound` reach the caller;
//!   transport failures are recovered by the reconnect machinery

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod convert;
mod error;
mod handler;
mod paired;
mod state;
mod transport;

pub use config::{EngineConfig, RetryConfig, Role};
pub use error::{EngineError, EngineResult};
pub use handler::InboundHandler;
pub use paired::PairedTransport;
pub use state::{LinkState, SyncEngine, SyncStats};
pub use transport::{LinkTransport, MockTransport};
