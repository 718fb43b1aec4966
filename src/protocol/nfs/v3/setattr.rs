//! NFSv3 SETATTR procedure (procedure 2, RFC 1813 §3.3.2): change file
//! attributes, optionally guarded by the object's ctime.

use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::FileInfo;

use super::{file_handle, post_op, pre_op};

/// Applies the decoded sattr3 to the path. The caller has already passed
/// the gate.
pub(super) async fn apply_sattr(
    context: &Context,
    path: &Path,
    info: &FileInfo,
    sattr: &nfs3::sattr3,
) -> Result<(), nfsstat3> {
    let io = |e: std::io::Error| crate::fs_util::nfsstat3_from_io(&e);

    if let nfs3::set_mode3::mode(mode) = sattr.mode {
        context.vfs.set_mode(path, mode).await.map_err(io)?;
    }
    let uid = match sattr.uid {
        nfs3::set_uid3::uid(uid) => Some(uid),
        nfs3::set_uid3::Void => None,
    };
    let gid = match sattr.gid {
        nfs3::set_gid3::gid(gid) => Some(gid),
        nfs3::set_gid3::Void => None,
    };
    if uid.is_some() || gid.is_some() {
        context.vfs.set_owner(path, uid, gid).await.map_err(io)?;
    }
    if let nfs3::set_size3::size(size) = sattr.size {
        context.vfs.truncate(path, size).await.map_err(io)?;
        if size < info.size {
            if let Ok(grant) = gate_check(context, path, false, None) {
                context.quota.release(&grant.export_root, grant.effective_uid, info.size - size);
            }
        }
    }

    let to_system_time = |t: &nfs3::nfstime3| {
        UNIX_EPOCH + Duration::new(t.seconds as u64, t.nseconds)
    };
    let atime = match &sattr.atime {
        nfs3::set_atime::DONT_CHANGE => None,
        nfs3::set_atime::SET_TO_SERVER_TIME => Some(SystemTime::now()),
        nfs3::set_atime::SET_TO_CLIENT_TIME(t) => Some(to_system_time(t)),
    };
    let mtime = match &sattr.mtime {
        nfs3::set_mtime::DONT_CHANGE => None,
        nfs3::set_mtime::SET_TO_SERVER_TIME => Some(SystemTime::now()),
        nfs3::set_mtime::SET_TO_CLIENT_TIME(t) => Some(to_system_time(t)),
    };
    if atime.is_some() || mtime.is_some() {
        context.vfs.set_times(path, atime, mtime).await.map_err(io)?;
    }
    Ok(())
}

pub async fn nfsproc3_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::SETATTR3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_setattr({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.object)
        .and_then(|path| gate_check(context, &path, false, None).map(|_| path));
    let path = match resolved {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let before = pre_op(context, &path).await;

    let outcome = async {
        let info = context
            .vfs
            .stat(&path)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        gate_check(context, &path, true, Some(&info))?;
        if let nfs3::sattrguard3::obj_ctime(guard) = args.guard {
            if guard.seconds != info.ctime.seconds || guard.nseconds != info.ctime.nseconds {
                return Err(nfsstat3::NFS3ERR_NOT_SYNC);
            }
        }
        apply_sattr(context, &path, &info, &args.new_attributes).await
    }
    .await;

    context.invalidate_caches(&path);
    let after = post_op(context, &path).await;
    let wcc = nfs3::wcc_data { before, after };

    match outcome {
        Ok(()) => {
            debug!(" {:?} --> setattr ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_setattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
