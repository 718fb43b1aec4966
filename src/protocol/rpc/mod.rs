//! RPC (Remote Procedure Call) protocol plumbing as specified in RFC 5531.
//!
//! This module implements RPC version 2 for the server side:
//!
//! 1. Message framing for TCP using the Record Marking Standard
//! 2. The authentication dispatcher (AUTH_NONE, AUTH_SYS, and the
//!    structural AUTH_DH / RPCSEC_GSS frameworks)
//! 3. Program/version/procedure dispatching to the NFS, MOUNT and
//!    PORTMAP handlers
//! 4. Duplicate-request detection keyed by `(xid, peer)`
//!
//! Wire types live in [`crate::protocol::xdr::rpc`]; this module owns the
//! behavior built on top of them.

pub mod auth;
mod context;
mod transaction_tracker;
mod wire;

pub use auth::{AuthError, Authenticator, Principal};
pub use context::{Context, Transport};
pub use transaction_tracker::TransactionTracker;
pub use wire::{handle_rpc, read_record, write_fragment, MAX_RPC_RECORD_LENGTH};
