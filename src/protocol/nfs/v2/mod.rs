//! NFS version 2 procedure handlers (RFC 1094).
//!
//! The version 2 protocol is the version 3 protocol's smaller ancestor:
//! 32-bit sizes and offsets, fixed 32-byte handles, no WCC data, no
//! ACCESS procedure and no asynchronous writes (every WRITE is stable).
//! The handlers reuse the shared handle table, export gate and VFS
//! adapter, translating statuses into the narrower v2 space.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use num_traits::cast::FromPrimitive;
use tracing::{debug, warn};

use crate::fs_util;
use crate::protocol::nfs::gate_check;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs2::{self, nfsstat2};
use crate::protocol::xdr::nfs3::nfsstat3;
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::FileInfo;

mod attr;
mod dirops;
mod file;
mod fs;
mod readdir;

use attr::{nfsproc2_getattr, nfsproc2_setattr};
use dirops::{
    nfsproc2_create, nfsproc2_link, nfsproc2_lookup, nfsproc2_mkdir, nfsproc2_remove,
    nfsproc2_rename, nfsproc2_rmdir, nfsproc2_symlink,
};
use file::{nfsproc2_read, nfsproc2_readlink, nfsproc2_write};
use fs::nfsproc2_statfs;
use readdir::nfsproc2_readdir;

/// Main handler for NFS version 2: routes by procedure number.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    debug_assert_eq!(call.vers, nfs2::VERSION);
    let proc = nfs2::NfsProcedure2::from_u32(call.proc).unwrap_or(nfs2::NfsProcedure2::INVALID);

    use nfs2::NfsProcedure2::*;
    match proc {
        NFSPROC_NULL => {
            debug!("nfsproc2_null({:?})", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
        }
        NFSPROC_GETATTR => nfsproc2_getattr(xid, input, output, context).await?,
        NFSPROC_SETATTR => nfsproc2_setattr(xid, input, output, context).await?,
        // ROOT and WRITECACHE are obsolete void procedures kept for
        // completeness of the RFC 1094 table
        NFSPROC_ROOT | NFSPROC_WRITECACHE => {
            debug!("obsolete NFSv2 procedure {} acknowledged", call.proc);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
        }
        NFSPROC_LOOKUP => nfsproc2_lookup(xid, input, output, context).await?,
        NFSPROC_READLINK => nfsproc2_readlink(xid, input, output, context).await?,
        NFSPROC_READ => nfsproc2_read(xid, input, output, context).await?,
        NFSPROC_WRITE => nfsproc2_write(xid, input, output, context).await?,
        NFSPROC_CREATE => nfsproc2_create(xid, input, output, context).await?,
        NFSPROC_REMOVE => nfsproc2_remove(xid, input, output, context).await?,
        NFSPROC_RENAME => nfsproc2_rename(xid, input, output, context).await?,
        NFSPROC_LINK => nfsproc2_link(xid, input, output, context).await?,
        NFSPROC_SYMLINK => nfsproc2_symlink(xid, input, output, context).await?,
        NFSPROC_MKDIR => nfsproc2_mkdir(xid, input, output, context).await?,
        NFSPROC_RMDIR => nfsproc2_rmdir(xid, input, output, context).await?,
        NFSPROC_READDIR => nfsproc2_readdir(xid, input, output, context).await?,
        NFSPROC_STATFS => nfsproc2_statfs(xid, input, output, context).await?,
        INVALID => {
            warn!("unknown NFSv2 procedure {}", call.proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}

/// Resolves a fixed-width version 2 handle to a path.
pub(super) fn file_handle2(context: &Context, fh: &nfs2::fhandle2) -> Result<PathBuf, nfsstat2> {
    context
        .handles
        .path_for_fh2(fh)
        .map_err(|_| nfsstat2::NFSERR_STALE)
}

/// Attributes of a path as v2 wire attributes, with errors narrowed.
pub(super) async fn stat2(
    context: &Context,
    path: &Path,
) -> Result<(FileInfo, nfs2::fattr2), nfsstat2> {
    let info = context
        .stat_cached(path)
        .await
        .map_err(|e| nfsstat2::from(fs_util::nfsstat3_from_io(&e)))?;
    let fattr = fs_util::fattr2_from(&info);
    Ok((info, fattr))
}

/// The gate in version 2 terms.
pub(super) fn gate2(
    context: &Context,
    path: &Path,
    want_write: bool,
    target: Option<&FileInfo>,
) -> Result<crate::exports::AccessGrant, nfsstat2> {
    gate_check(context, path, want_write, target).map_err(nfsstat2::from)
}

/// Narrows the shared v3-space status helpers to v2.
pub(super) fn stat2_from(stat: nfsstat3) -> nfsstat2 {
    nfsstat2::from(stat)
}
