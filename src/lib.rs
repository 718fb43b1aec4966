//! simple-nfsd - a user-space Network File System (NFS) server in Rust
//!
//! This library implements the NFS protocol family over ONC RPC:
//!
//! - NFS version 2 (RFC 1094), version 3 (RFC 1813) and the stateless
//!   subset of version 4 (RFC 7530)
//! - The MOUNT version 3 companion protocol (RFC 1813 Appendix I)
//! - The PORTMAP binding protocol (RFC 1833)
//!
//! Requests are accepted over both TCP and UDP. File operations are served
//! from a configured local directory tree through the [`vfs::Vfs`] adapter,
//! guarded by an export table ([`exports`]) and an opaque file-handle table
//! ([`handle`]).
//!
//! ## Main Components
//!
//! - `server`: The facade. Builds the component graph from a
//!   [`config::ServerConfig`], binds the listeners, registers the portmap
//!   bootstrap mappings and exposes lifecycle and statistics.
//!
//! - `protocol`: RPC framing, the authentication dispatcher and the
//!   per-program / per-version procedure handlers, including XDR
//!   (External Data Representation) encoding and decoding.
//!
//! - `vfs`: Filesystem primitives as an async trait plus [`vfs::LocalFs`],
//!   the adapter over a local directory tree.
//!
//! - `exports`: The export/access gate deciding whether a principal from a
//!   given client may read or write a given path.
//!
//! - `handle`: The bidirectional table between opaque wire handles and
//!   filesystem paths, with per-version handle encodings.
//!
//! ## Standards Compliance
//!
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2
//! - RFC 4506: XDR: External Data Representation Standard
//! - RFC 1094: NFS: Network File System Protocol Specification (v2)
//! - RFC 1813: NFS Version 3 Protocol Specification
//! - RFC 7530: NFS Version 4 Protocol (stateless subset)
//! - RFC 1833: Binding Protocols for ONC RPC Version 2 (portmapper)

pub mod cache;
pub mod config;
pub mod exports;
pub mod handle;
pub mod protocol;
pub mod quota;
pub mod server;
pub mod vfs;
mod write_counter;

#[cfg(not(target_os = "windows"))]
pub mod fs_util;

pub mod tcp;
pub mod udp;

pub use protocol::xdr;
pub use server::{NfsServer, StatsSnapshot};
