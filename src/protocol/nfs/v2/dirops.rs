//! NFSv2 directory-entry procedures: LOOKUP (4), CREATE (9), REMOVE
//! (10), RENAME (11), LINK (12), SYMLINK (13), MKDIR (14) and RMDIR
//! (15). Create-style procedures reply with a `diropres` (status, then
//! handle and attributes on success); the destructive ones reply with a
//! bare status.

use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::{debug, error};

use crate::protocol::nfs::{child_path, decode_args};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs2::{self, nfsstat2};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle2, gate2, stat2, stat2_from};

fn mode_or(sattr: &nfs2::sattr2, fallback: u32) -> u32 {
    if sattr.mode == nfs2::SATTR2_UNSET {
        fallback
    } else {
        sattr.mode
    }
}

/// Resolves the directory argument, checks it is a directory and passes
/// the gate, returning the validated child path.
async fn resolve_dirop(
    context: &Context,
    args: &nfs2::diropargs2,
    want_write: bool,
) -> Result<(PathBuf, PathBuf), nfsstat2> {
    let dir_path = file_handle2(context, &args.dir)?;
    // export membership before any filesystem access on the handle
    gate2(context, &dir_path, false, None)?;
    let (dir_info, _) = stat2(context, &dir_path).await?;
    if !dir_info.is_dir() {
        return Err(nfsstat2::NFSERR_NOTDIR);
    }
    gate2(context, &dir_path, want_write, Some(&dir_info))?;
    let child = child_path(&dir_path, &args.name).map_err(stat2_from)?;
    Ok((dir_path, child))
}

fn write_diropres(
    xid: u32,
    output: &mut impl Write,
    reply: Result<nfs2::diropok2, nfsstat2>,
) -> Result<(), anyhow::Error> {
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok(res) => {
            nfsstat2::NFS_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            debug!("diropres error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}

fn write_status(
    xid: u32,
    output: &mut impl Write,
    reply: Result<(), nfsstat2>,
) -> Result<(), anyhow::Error> {
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok(()) => nfsstat2::NFS_OK.serialize(output)?,
        Err(stat) => {
            error!("status error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}

pub async fn nfsproc2_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::diropargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_lookup({:?},{:?})", xid, args.name);

    let reply = async {
        let (_, child) = resolve_dirop(context, &args, false).await?;
        let (_, fattr) = stat2(context, &child).await?;
        Ok(nfs2::diropok2 { file: context.handles.fh2_for(&child), attributes: fattr })
    }
    .await;
    write_diropres(xid, output, reply)
}

pub async fn nfsproc2_create(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::createargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_create({:?},{:?})", xid, args.where_dir.name);

    let reply = async {
        let (dir_path, child) = resolve_dirop(context, &args.where_dir, true).await?;
        let io = |e: std::io::Error| stat2_from(crate::fs_util::nfsstat3_from_io(&e));
        context
            .vfs
            .create(&child, mode_or(&args.attributes, 0o644), false)
            .await
            .map_err(io)?;
        if args.attributes.size != nfs2::SATTR2_UNSET {
            context.vfs.truncate(&child, args.attributes.size as u64).await.map_err(io)?;
        }
        context.invalidate_caches(&child);
        context.invalidate_caches(&dir_path);
        let (_, fattr) = stat2(context, &child).await?;
        Ok(nfs2::diropok2 { file: context.handles.fh2_for(&child), attributes: fattr })
    }
    .await;
    write_diropres(xid, output, reply)
}

pub async fn nfsproc2_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::createargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_mkdir({:?},{:?})", xid, args.where_dir.name);

    let reply = async {
        let (dir_path, child) = resolve_dirop(context, &args.where_dir, true).await?;
        context
            .vfs
            .mkdir(&child, mode_or(&args.attributes, 0o755))
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        context.invalidate_caches(&dir_path);
        let (_, fattr) = stat2(context, &child).await?;
        Ok(nfs2::diropok2 { file: context.handles.fh2_for(&child), attributes: fattr })
    }
    .await;
    write_diropres(xid, output, reply)
}

pub async fn nfsproc2_remove(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::diropargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_remove({:?},{:?})", xid, args.name);

    let reply = async {
        let (dir_path, child) = resolve_dirop(context, &args, true).await?;
        let io = |e: std::io::Error| stat2_from(crate::fs_util::nfsstat3_from_io(&e));
        let info = context.vfs.stat(&child).await.map_err(io)?;
        if info.is_dir() {
            return Err(nfsstat2::NFSERR_ISDIR);
        }
        context.vfs.remove(&child).await.map_err(io)?;
        context.invalidate_caches(&child);
        context.invalidate_caches(&dir_path);
        Ok(())
    }
    .await;
    write_status(xid, output, reply)
}

pub async fn nfsproc2_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::diropargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_rmdir({:?},{:?})", xid, args.name);

    let reply = async {
        let (dir_path, child) = resolve_dirop(context, &args, true).await?;
        context
            .vfs
            .rmdir(&child)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        context.invalidate_caches(&child);
        context.invalidate_caches(&dir_path);
        Ok(())
    }
    .await;
    write_status(xid, output, reply)
}

pub async fn nfsproc2_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::renameargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_rename({:?},{:?} -> {:?})", xid, args.from.name, args.to.name);

    let reply = async {
        let (from_dir, from) = resolve_dirop(context, &args.from, true).await?;
        let (to_dir, to) = resolve_dirop(context, &args.to, true).await?;
        let io = |e: std::io::Error| stat2_from(crate::fs_util::nfsstat3_from_io(&e));
        context.vfs.stat(&from).await.map_err(io)?;
        if from != to {
            context.vfs.rename(&from, &to).await.map_err(io)?;
        }
        for path in [&from, &to, &from_dir, &to_dir] {
            context.invalidate_caches(path);
        }
        Ok(())
    }
    .await;
    write_status(xid, output, reply)
}

pub async fn nfsproc2_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::linkargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_link({:?},{:?})", xid, args.to.name);

    let reply = async {
        let file_path = file_handle2(context, &args.from)?;
        gate2(context, &file_path, false, None)?;
        let (file_info, _) = stat2(context, &file_path).await?;
        if file_info.is_dir() {
            return Err(nfsstat2::NFSERR_ISDIR);
        }
        gate2(context, &file_path, false, Some(&file_info))?;
        let (to_dir, link) = resolve_dirop(context, &args.to, true).await?;
        context
            .vfs
            .link(&file_path, &link)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        context.invalidate_caches(&file_path);
        context.invalidate_caches(&to_dir);
        Ok(())
    }
    .await;
    write_status(xid, output, reply)
}

pub async fn nfsproc2_symlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::symlinkargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_symlink({:?},{:?} -> {:?})", xid, args.from.name, args.to);

    let reply = async {
        let (dir_path, child) = resolve_dirop(context, &args.from, true).await?;
        if args.to.is_empty() {
            return Err(nfsstat2::NFSERR_IO);
        }
        let target = PathBuf::from(String::from_utf8_lossy(&args.to).into_owned());
        context
            .vfs
            .symlink(&child, &target)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        context.invalidate_caches(&dir_path);
        Ok(())
    }
    .await;
    write_status(xid, output, reply)
}
