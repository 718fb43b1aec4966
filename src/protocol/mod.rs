//! Protocol module implements the NFS protocol suite over ONC RPC.
//!
//! This module contains three main components:
//!
//! - `xdr`: External Data Representation (XDR) serialization and
//!   deserialization of the wire types for RPC, NFS v2/v3/v4, MOUNT and
//!   PORTMAP according to RFC 4506.
//!
//! - `nfs`: The per-program procedure handlers: NFS versions 2, 3 and 4,
//!   the MOUNT protocol and the PORTMAP protocol.
//!
//! - `rpc`: Remote Procedure Call plumbing: record-mark framing for stream
//!   transports, the authentication dispatcher, the duplicate-request
//!   cache and the per-connection context handed to every handler.

pub mod nfs;
pub mod rpc;
pub mod xdr;
