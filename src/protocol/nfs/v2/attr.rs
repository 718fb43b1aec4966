//! NFSv2 GETATTR (procedure 1) and SETATTR (procedure 2). Both reply
//! with an `attrstat`: a status followed by attributes on success.

use std::io::{Read, Write};
use std::time::{Duration, UNIX_EPOCH};

use tracing::{debug, error};

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs2::{self, nfsstat2};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle2, gate2, stat2, stat2_from};

pub async fn nfsproc2_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs2::fhandle2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_getattr({:?})", xid);

    let reply = async {
        let path = file_handle2(context, &handle)?;
        gate2(context, &path, false, None)?;
        let (_, fattr) = stat2(context, &path).await?;
        Ok::<_, nfsstat2>(fattr)
    }
    .await;

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok(fattr) => {
            nfsstat2::NFS_OK.serialize(output)?;
            fattr.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc2_getattr error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}

pub async fn nfsproc2_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::sattrargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_setattr({:?},{:?})", xid, args.attributes);

    let reply = async {
        let path = file_handle2(context, &args.file)?;
        gate2(context, &path, false, None)?;
        let info = context
            .vfs
            .stat(&path)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        gate2(context, &path, true, Some(&info))?;

        let io = |e: std::io::Error| stat2_from(crate::fs_util::nfsstat3_from_io(&e));
        let sattr = &args.attributes;
        if sattr.mode != nfs2::SATTR2_UNSET {
            context.vfs.set_mode(&path, sattr.mode).await.map_err(io)?;
        }
        let uid = (sattr.uid != nfs2::SATTR2_UNSET).then_some(sattr.uid);
        let gid = (sattr.gid != nfs2::SATTR2_UNSET).then_some(sattr.gid);
        if uid.is_some() || gid.is_some() {
            context.vfs.set_owner(&path, uid, gid).await.map_err(io)?;
        }
        if sattr.size != nfs2::SATTR2_UNSET {
            context.vfs.truncate(&path, sattr.size as u64).await.map_err(io)?;
        }
        let to_system_time = |t: &nfs2::timeval2| {
            UNIX_EPOCH + Duration::new(t.seconds as u64, t.useconds.saturating_mul(1000))
        };
        let atime = nfs2::sattr2::time_is_set(&sattr.atime).then(|| to_system_time(&sattr.atime));
        let mtime = nfs2::sattr2::time_is_set(&sattr.mtime).then(|| to_system_time(&sattr.mtime));
        if atime.is_some() || mtime.is_some() {
            context.vfs.set_times(&path, atime, mtime).await.map_err(io)?;
        }

        context.invalidate_caches(&path);
        let (_, fattr) = stat2(context, &path).await?;
        Ok::<_, nfsstat2>(fattr)
    }
    .await;

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok(fattr) => {
            nfsstat2::NFS_OK.serialize(output)?;
            fattr.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_setattr error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}
