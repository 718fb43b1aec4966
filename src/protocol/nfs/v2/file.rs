//! NFSv2 file-content procedures: READLINK (5), READ (6) and WRITE (8).
//! Version 2 has no stability parameter; every WRITE is committed to
//! stable storage before the reply, and the reply carries the file's
//! attributes rather than WCC data.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs2::{self, nfsstat2};
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::Stability;

use super::{file_handle2, gate2, stat2, stat2_from};

pub async fn nfsproc2_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs2::fhandle2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_readlink({:?})", xid);

    let reply = async {
        let path = file_handle2(context, &handle)?;
        gate2(context, &path, false, None)?;
        let (info, _) = stat2(context, &path).await?;
        if !info.is_symlink() {
            // v2 has no INVAL; historical servers answer NXIO here
            return Err(nfsstat2::NFSERR_NXIO);
        }
        gate2(context, &path, false, None)?;
        let target = context
            .vfs
            .readlink(&path)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        Ok::<_, nfsstat2>(target)
    }
    .await;

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok(target) => {
            nfsstat2::NFS_OK.serialize(output)?;
            let data: nfs2::path2 = target.to_string_lossy().into_owned().into_bytes().into();
            data.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc2_readlink error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}

pub async fn nfsproc2_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::readargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_read({:?},{} bytes at {})", xid, args.count, args.offset);

    let reply = async {
        let path = file_handle2(context, &args.file)?;
        gate2(context, &path, false, None)?;
        let (info, _) = stat2(context, &path).await?;
        if info.is_dir() {
            return Err(nfsstat2::NFSERR_ISDIR);
        }
        gate2(context, &path, false, Some(&info))?;
        let count = args.count.min(nfs2::MAXDATA);
        let (data, _) = context
            .vfs
            .read(&path, args.offset as u64, count)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        let (_, fattr) = stat2(context, &path).await?;
        Ok::<_, nfsstat2>((fattr, data))
    }
    .await;

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok((fattr, data)) => {
            context.stats.record_bytes_read(data.len() as u64);
            nfsstat2::NFS_OK.serialize(output)?;
            fattr.serialize(output)?;
            data.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_read error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}

pub async fn nfsproc2_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::writeargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_write({:?},{} bytes at {})", xid, args.data.len(), args.offset);

    let path = match file_handle2(context, &args.file) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };

    let reply = async {
        gate2(context, &path, false, None)?;
        let info = context
            .vfs
            .stat(&path)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        if info.is_dir() {
            return Err(nfsstat2::NFSERR_ISDIR);
        }
        let grant = gate2(context, &path, true, Some(&info))?;

        let new_end = (args.offset as u64).saturating_add(args.data.len() as u64);
        let delta = new_end.saturating_sub(info.size);
        context
            .quota
            .charge(&grant.export_root, grant.effective_uid, delta)
            .map_err(|_| nfsstat2::NFSERR_DQUOT)?;

        // v2 semantics: stable before reply, always
        context
            .vfs
            .write(&path, args.offset as u64, &args.data, Stability::FileSync)
            .await
            .map_err(|e| {
                context.quota.release(&grant.export_root, grant.effective_uid, delta);
                stat2_from(crate::fs_util::nfsstat3_from_io(&e))
            })?;
        context.invalidate_caches(&path);
        let (_, fattr) = stat2(context, &path).await?;
        Ok::<_, nfsstat2>((fattr, args.data.len() as u64))
    }
    .await;

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok((fattr, written)) => {
            context.stats.record_bytes_written(written);
            nfsstat2::NFS_OK.serialize(output)?;
            fattr.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_write error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}
