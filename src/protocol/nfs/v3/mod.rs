//! NFS version 3 procedure handlers (RFC 1813).
//!
//! All 22 procedures are implemented, one per file, and registered with
//! the dispatcher below. Every handler follows the same path: decode
//! arguments, resolve the opaque handle through the handle table, pass
//! the export gate, drive the VFS adapter and encode a complete reply,
//! including weak cache consistency data for the mutating procedures.

use std::io::{Read, Write};
use std::path::Path;

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::fs_util;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::{FileInfo, Stability};

mod access;
mod commit;
mod create;
mod fsinfo;
mod fsstat;
mod getattr;
mod link;
mod lookup;
mod mkdir;
mod mknod;
mod null;
mod pathconf;
mod read;
mod readdir;
mod readdirplus;
mod readlink;
mod remove;
mod rename;
mod rmdir;
mod setattr;
mod symlink;
mod write;

use access::nfsproc3_access;
use commit::nfsproc3_commit;
use create::nfsproc3_create;
use fsinfo::nfsproc3_fsinfo;
use fsstat::nfsproc3_fsstat;
use getattr::nfsproc3_getattr;
use link::nfsproc3_link;
use lookup::nfsproc3_lookup;
use mkdir::nfsproc3_mkdir;
use mknod::nfsproc3_mknod;
use null::nfsproc3_null;
use pathconf::nfsproc3_pathconf;
use read::nfsproc3_read;
use readdir::nfsproc3_readdir;
use readdirplus::nfsproc3_readdirplus;
use readlink::nfsproc3_readlink;
use remove::nfsproc3_remove;
use rename::nfsproc3_rename;
use rmdir::nfsproc3_rmdir;
use setattr::nfsproc3_setattr;
use symlink::nfsproc3_symlink;
use write::nfsproc3_write;

/// Main handler for NFS version 3: routes by procedure number.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    debug_assert_eq!(call.vers, nfs3::VERSION);
    let proc = nfs3::NfsProcedure3::from_u32(call.proc).unwrap_or(nfs3::NfsProcedure3::INVALID);

    use nfs3::NfsProcedure3::*;
    match proc {
        NFSPROC3_NULL => nfsproc3_null(xid, output)?,
        NFSPROC3_GETATTR => nfsproc3_getattr(xid, input, output, context).await?,
        NFSPROC3_SETATTR => nfsproc3_setattr(xid, input, output, context).await?,
        NFSPROC3_LOOKUP => nfsproc3_lookup(xid, input, output, context).await?,
        NFSPROC3_ACCESS => nfsproc3_access(xid, input, output, context).await?,
        NFSPROC3_READLINK => nfsproc3_readlink(xid, input, output, context).await?,
        NFSPROC3_READ => nfsproc3_read(xid, input, output, context).await?,
        NFSPROC3_WRITE => nfsproc3_write(xid, input, output, context).await?,
        NFSPROC3_CREATE => nfsproc3_create(xid, input, output, context).await?,
        NFSPROC3_MKDIR => nfsproc3_mkdir(xid, input, output, context).await?,
        NFSPROC3_SYMLINK => nfsproc3_symlink(xid, input, output, context).await?,
        NFSPROC3_MKNOD => nfsproc3_mknod(xid, input, output, context).await?,
        NFSPROC3_REMOVE => nfsproc3_remove(xid, input, output, context).await?,
        NFSPROC3_RMDIR => nfsproc3_rmdir(xid, input, output, context).await?,
        NFSPROC3_RENAME => nfsproc3_rename(xid, input, output, context).await?,
        NFSPROC3_LINK => nfsproc3_link(xid, input, output, context).await?,
        NFSPROC3_READDIR => nfsproc3_readdir(xid, input, output, context).await?,
        NFSPROC3_READDIRPLUS => nfsproc3_readdirplus(xid, input, output, context).await?,
        NFSPROC3_FSSTAT => nfsproc3_fsstat(xid, input, output, context).await?,
        NFSPROC3_FSINFO => nfsproc3_fsinfo(xid, input, output, context).await?,
        NFSPROC3_PATHCONF => nfsproc3_pathconf(xid, input, output, context).await?,
        NFSPROC3_COMMIT => nfsproc3_commit(xid, input, output, context).await?,
        INVALID => {
            warn!("unknown NFSv3 procedure {}", call.proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}

/// Resolves an opaque version 3 handle to a path.
pub(super) fn file_handle(
    context: &Context,
    fh: &nfs3::nfs_fh3,
) -> Result<std::path::PathBuf, nfsstat3> {
    context.handles.path_for_fh3(fh).map_err(nfsstat3::from)
}

/// Attributes of a path as v3 wire attributes, with the io error mapped.
pub(super) async fn stat3(
    context: &Context,
    path: &Path,
) -> Result<(FileInfo, nfs3::fattr3), nfsstat3> {
    let info = context
        .stat_cached(path)
        .await
        .map_err(|e| fs_util::nfsstat3_from_io(&e))?;
    let fattr = fs_util::fattr3_from(&info);
    Ok((info, fattr))
}

/// Best-effort post-operation attributes.
pub(super) async fn post_op(context: &Context, path: &Path) -> nfs3::post_op_attr {
    match stat3(context, path).await {
        Ok((_, fattr)) => nfs3::post_op_attr::attributes(fattr),
        Err(_) => nfs3::post_op_attr::Void,
    }
}

/// Best-effort pre-operation attributes for weak cache consistency.
/// Reads through the VFS directly so a stale cache entry cannot be
/// reported as the pre-state of a mutation.
pub(super) async fn pre_op(context: &Context, path: &Path) -> nfs3::pre_op_attr {
    match context.vfs.stat(path).await {
        Ok(info) => nfs3::pre_op_attr::attributes(nfs3::wcc_attr {
            size: info.size,
            mtime: nfs3::nfstime3 { seconds: info.mtime.seconds, nseconds: info.mtime.nseconds },
            ctime: nfs3::nfstime3 { seconds: info.ctime.seconds, nseconds: info.ctime.nseconds },
        }),
        Err(_) => nfs3::pre_op_attr::Void,
    }
}

/// The cookie verifier of a directory: its mtime as 8 big-endian bytes.
/// Stable until the directory is modified.
pub(super) fn cookieverf_for(info: &FileInfo) -> nfs3::cookieverf3 {
    let version = ((info.mtime.seconds as u64) << 32) | info.mtime.nseconds as u64;
    version.to_be_bytes()
}

impl From<nfs3::file::stable_how> for Stability {
    fn from(stable: nfs3::file::stable_how) -> Stability {
        match stable {
            nfs3::file::stable_how::UNSTABLE => Stability::Unstable,
            nfs3::file::stable_how::DATA_SYNC => Stability::DataSync,
            nfs3::file::stable_how::FILE_SYNC => Stability::FileSync,
        }
    }
}

impl From<Stability> for nfs3::file::stable_how {
    fn from(stability: Stability) -> nfs3::file::stable_how {
        match stability {
            Stability::Unstable => nfs3::file::stable_how::UNSTABLE,
            Stability::DataSync => nfs3::file::stable_how::DATA_SYNC,
            Stability::FileSync => nfs3::file::stable_how::FILE_SYNC,
        }
    }
}
