//! The stateless NFSv4 operations evaluated inside COMPOUND.
//!
//! Every operation decodes its complete argument shape before writing
//! any result bytes, so the compound loop can still emit a well-formed
//! resop when decoding fails. Results are written as `opnum`, `status`,
//! then the status-dependent body.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs_util;
use crate::protocol::nfs::{child_path, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs4::{self, nfs_opnum4, nfsstat4};
use crate::protocol::xdr::{deserialize, Serialize};
use crate::vfs::{FileInfo, Stability};

use super::{encode_fattr4, CompoundState};

/// Writes a resop carrying only a status.
pub(super) fn emit_status_only(
    op: nfs_opnum4,
    results: &mut Vec<u8>,
    status: nfsstat4,
) -> std::io::Result<nfsstat4> {
    op.serialize(results)?;
    status.serialize(results)?;
    Ok(status)
}

/// Attributes of a path in the v4 status space.
async fn stat4(context: &Context, path: &Path) -> Result<FileInfo, nfsstat4> {
    context
        .stat_cached(path)
        .await
        .map_err(|e| fs_util::nfsstat4_from(fs_util::nfsstat3_from_io(&e)))
}

fn io4(e: std::io::Error) -> nfsstat4 {
    fs_util::nfsstat4_from(fs_util::nfsstat3_from_io(&e))
}

fn gate4(
    context: &Context,
    path: &Path,
    want_write: bool,
    target: Option<&FileInfo>,
) -> Result<crate::exports::AccessGrant, nfsstat4> {
    gate_check(context, path, want_write, target).map_err(fs_util::nfsstat4_from)
}

fn handle4(context: &Context, bytes: &[u8]) -> Result<PathBuf, nfsstat4> {
    context.handles.path_for_fh4(bytes).map_err(|e| match e {
        crate::handle::HandleError::Stale => nfsstat4::NFS4ERR_STALE,
        crate::handle::HandleError::BadHandle => nfsstat4::NFS4ERR_BADHANDLE,
    })
}

/// Directory change counter packed from ctime, used for change_info4.
fn change_of(info: &FileInfo) -> u64 {
    ((info.ctime.seconds as u64) << 32) | info.ctime.nseconds as u64
}

async fn change_info(
    context: &Context,
    path: &Path,
    before: u64,
) -> nfs4::change_info4 {
    let after = context.vfs.stat(path).await.map(|i| change_of(&i)).unwrap_or(before);
    nfs4::change_info4 { atomic: false, before, after }
}

pub(super) async fn op_access(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let requested = deserialize::<u32>(input)?;
    const ALL: u32 = nfs4::ACCESS4_READ
        | nfs4::ACCESS4_LOOKUP
        | nfs4::ACCESS4_MODIFY
        | nfs4::ACCESS4_EXTEND
        | nfs4::ACCESS4_DELETE
        | nfs4::ACCESS4_EXECUTE;

    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        let info = stat4(context, &path).await?;
        let grant = context
            .exports
            .read()
            .unwrap()
            .probe(&path, &context.principal, context.client_addr, Some(&info))
            .map_err(|denied| fs_util::nfsstat4_from(crate::protocol::xdr::nfs3::nfsstat3::from(denied)))?;
        Ok::<_, nfsstat4>((requested & ALL, grant.bits & requested))
    }
    .await;

    match outcome {
        Ok((supported, access)) => {
            emit_status_only(nfs_opnum4::OP_ACCESS, results, nfsstat4::NFS4_OK)?;
            supported.serialize(results)?;
            access.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_ACCESS, results, status),
    }
}

pub(super) async fn op_commit(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let _offset = deserialize::<u64>(input)?;
    let _count = deserialize::<u32>(input)?;

    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        context.vfs.fsync(&path).await.map_err(io4)
    }
    .await;

    match outcome {
        Ok(()) => {
            emit_status_only(nfs_opnum4::OP_COMMIT, results, nfsstat4::NFS4_OK)?;
            context.write_verifier.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_COMMIT, results, status),
    }
}

pub(super) async fn op_create(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let objtype = deserialize::<nfs4::createtype4>(input)?;
    let objname = deserialize::<Vec<u8>>(input)?;
    let createattrs = deserialize::<nfs4::fattr4>(input)?;

    let outcome = async {
        let dir_path = state.current_fh()?.clone();
        gate4(context, &dir_path, false, None)?;
        let dir_info = stat4(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &dir_path, true, Some(&dir_info))?;
        let child = child_path(&dir_path, &objname).map_err(fs_util::nfsstat4_from)?;
        let attrs = super::decode_settable_attrs(&createattrs)?;
        let before = change_of(&dir_info);

        match objtype {
            nfs4::createtype4::NF4DIR => {
                context.vfs.mkdir(&child, attrs.mode.unwrap_or(0o755)).await.map_err(io4)?;
            }
            nfs4::createtype4::NF4LNK(target) => {
                if target.is_empty() {
                    return Err(nfsstat4::NFS4ERR_INVAL);
                }
                let target =
                    PathBuf::from(String::from_utf8_lossy(&target).into_owned());
                context.vfs.symlink(&child, &target).await.map_err(io4)?;
            }
            // device and FIFO objects are out of scope for this server
            nfs4::createtype4::NF4BLK { .. }
            | nfs4::createtype4::NF4CHR { .. }
            | nfs4::createtype4::NF4SOCK
            | nfs4::createtype4::NF4FIFO => return Err(nfsstat4::NFS4ERR_NOTSUPP),
        }

        context.invalidate_caches(&child);
        context.invalidate_caches(&dir_path);
        let cinfo = change_info(context, &dir_path, before).await;
        Ok::<_, nfsstat4>((child, cinfo, attrs.applied))
    }
    .await;

    match outcome {
        Ok((child, cinfo, applied)) => {
            state.current = Some(child);
            emit_status_only(nfs_opnum4::OP_CREATE, results, nfsstat4::NFS4_OK)?;
            cinfo.serialize(results)?;
            applied.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_CREATE, results, status),
    }
}

pub(super) async fn op_getattr(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let requested = deserialize::<nfs4::bitmap4>(input)?;

    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        let info = stat4(context, &path).await?;
        Ok::<_, nfsstat4>((path, info))
    }
    .await;

    match outcome {
        Ok((path, info)) => {
            let fattr = encode_fattr4(context, &path, &info, &requested, true)?;
            emit_status_only(nfs_opnum4::OP_GETATTR, results, nfsstat4::NFS4_OK)?;
            fattr.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_GETATTR, results, status),
    }
}

pub(super) fn op_getfh(
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    match state.current_fh() {
        Ok(path) => {
            let handle = context.handles.fh4_for(path);
            emit_status_only(nfs_opnum4::OP_GETFH, results, nfsstat4::NFS4_OK)?;
            handle.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_GETFH, results, status),
    }
}

pub(super) async fn op_link(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let newname = deserialize::<Vec<u8>>(input)?;

    let outcome = async {
        let source = state.saved_fh()?.clone();
        let dir_path = state.current_fh()?.clone();
        gate4(context, &source, false, None)?;
        gate4(context, &dir_path, false, None)?;
        let source_info = stat4(context, &source).await?;
        if source_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_ISDIR);
        }
        let dir_info = stat4(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &source, false, Some(&source_info))?;
        gate4(context, &dir_path, true, Some(&dir_info))?;
        let link = child_path(&dir_path, &newname).map_err(fs_util::nfsstat4_from)?;
        let before = change_of(&dir_info);
        context.vfs.link(&source, &link).await.map_err(io4)?;
        context.invalidate_caches(&link);
        context.invalidate_caches(&dir_path);
        context.invalidate_caches(&source);
        Ok::<_, nfsstat4>(change_info(context, &dir_path, before).await)
    }
    .await;

    match outcome {
        Ok(cinfo) => {
            emit_status_only(nfs_opnum4::OP_LINK, results, nfsstat4::NFS4_OK)?;
            cinfo.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_LINK, results, status),
    }
}

pub(super) async fn op_lookup(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let objname = deserialize::<Vec<u8>>(input)?;

    let outcome = async {
        let dir_path = state.current_fh()?.clone();
        gate4(context, &dir_path, false, None)?;
        let dir_info = stat4(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &dir_path, false, Some(&dir_info))?;
        let child = child_path(&dir_path, &objname).map_err(fs_util::nfsstat4_from)?;
        stat4(context, &child).await?;
        Ok::<_, nfsstat4>(child)
    }
    .await;

    match outcome {
        Ok(child) => {
            state.current = Some(child);
            emit_status_only(nfs_opnum4::OP_LOOKUP, results, nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_LOOKUP, results, status),
    }
}

pub(super) async fn op_lookupp(
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let outcome = async {
        let path = state.current_fh()?.clone();
        let parent = path.parent().map(Path::to_path_buf).ok_or(nfsstat4::NFS4ERR_NOENT)?;
        // the parent must still lie inside an export
        gate4(context, &parent, false, None)?;
        stat4(context, &parent).await?;
        Ok::<_, nfsstat4>(parent)
    }
    .await;

    match outcome {
        Ok(parent) => {
            state.current = Some(parent);
            emit_status_only(nfs_opnum4::OP_LOOKUPP, results, nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_LOOKUPP, results, status),
    }
}

pub(super) fn op_putfh(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let handle = deserialize::<Vec<u8>>(input)?;
    match handle4(context, &handle) {
        Ok(path) => {
            state.current = Some(path);
            emit_status_only(nfs_opnum4::OP_PUTFH, results, nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_PUTFH, results, status),
    }
}

pub(super) fn op_putrootfh(
    op: nfs_opnum4,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let root = context
        .exports
        .read()
        .unwrap()
        .exports()
        .first()
        .map(|e| e.path.clone())
        .unwrap_or_else(|| context.config.root_path.clone());
    state.current = Some(root);
    emit_status_only(op, results, nfsstat4::NFS4_OK)
}

pub(super) async fn op_read(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let _stateid = deserialize::<nfs4::stateid4>(input)?;
    let offset = deserialize::<u64>(input)?;
    let count = deserialize::<u32>(input)?;

    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        let info = stat4(context, &path).await?;
        if info.is_dir() {
            return Err(nfsstat4::NFS4ERR_ISDIR);
        }
        gate4(context, &path, false, Some(&info))?;
        let count = count.min(context.config.read_size);
        let (data, eof) = context.vfs.read(&path, offset, count).await.map_err(io4)?;
        Ok::<_, nfsstat4>((data, eof))
    }
    .await;

    match outcome {
        Ok((data, eof)) => {
            context.stats.record_bytes_read(data.len() as u64);
            emit_status_only(nfs_opnum4::OP_READ, results, nfsstat4::NFS4_OK)?;
            eof.serialize(results)?;
            data.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_READ, results, status),
    }
}

pub(super) async fn op_readdir(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let cookie = deserialize::<u64>(input)?;
    let cookieverf = deserialize::<[u8; 8]>(input)?;
    let _dircount = deserialize::<u32>(input)?;
    let maxcount = deserialize::<u32>(input)?;
    let attr_request = deserialize::<nfs4::bitmap4>(input)?;

    // v4 cookies skip the values 0..=2; entry ordinals start at 3
    const COOKIE_BASE: u64 = 3;

    let outcome = async {
        let dir_path = state.current_fh()?.clone();
        gate4(context, &dir_path, false, None)?;
        let dir_info = stat4(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &dir_path, false, Some(&dir_info))?;
        let verf = {
            let version =
                ((dir_info.mtime.seconds as u64) << 32) | dir_info.mtime.nseconds as u64;
            version.to_be_bytes()
        };
        let listing = context.vfs.readdir(&dir_path).await.map_err(io4)?;
        let start = if cookie == 0 {
            0
        } else {
            if cookieverf != verf {
                return Err(nfsstat4::NFS4ERR_BAD_COOKIE);
            }
            let start = cookie.saturating_sub(COOKIE_BASE - 1) as usize;
            if start > listing.len() {
                return Err(nfsstat4::NFS4ERR_BAD_COOKIE);
            }
            start
        };
        Ok::<_, nfsstat4>((dir_path, listing, verf, start))
    }
    .await;

    let (dir_path, listing, verf, start) = match outcome {
        Ok(prepared) => prepared,
        Err(status) => return emit_status_only(nfs_opnum4::OP_READDIR, results, status),
    };

    emit_status_only(nfs_opnum4::OP_READDIR, results, nfsstat4::NFS4_OK)?;
    verf.serialize(results)?;

    let budget = (maxcount as usize).saturating_sub(128);
    let mut emitted = 0usize;
    let mut eof = true;
    for (index, entry) in listing.iter().enumerate().skip(start) {
        let entry_path = dir_path.join(String::from_utf8_lossy(&entry.name).into_owned());
        let info = match context.stat_cached(&entry_path).await {
            Ok(info) => info,
            Err(_) => continue,
        };
        let fattr = encode_fattr4(context, &entry_path, &info, &attr_request, false)?;
        let mut buf: Vec<u8> = Vec::new();
        true.serialize(&mut buf)?;
        (index as u64 + COOKIE_BASE).serialize(&mut buf)?;
        entry.name.serialize(&mut buf)?;
        fattr.serialize(&mut buf)?;
        if results.len() + buf.len() >= budget {
            eof = false;
            break;
        }
        results.write_all(&buf)?;
        emitted += 1;
    }
    false.serialize(results)?;
    eof.serialize(results)?;
    debug!("readdir4: start {} sent {} of {} eof {}", start, emitted, listing.len(), eof);
    Ok(nfsstat4::NFS4_OK)
}

pub(super) async fn op_readlink(
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        let info = stat4(context, &path).await?;
        if !info.is_symlink() {
            return Err(nfsstat4::NFS4ERR_INVAL);
        }
        gate4(context, &path, false, None)?;
        let target = context.vfs.readlink(&path).await.map_err(io4)?;
        Ok::<_, nfsstat4>(target.to_string_lossy().into_owned().into_bytes())
    }
    .await;

    match outcome {
        Ok(target) => {
            emit_status_only(nfs_opnum4::OP_READLINK, results, nfsstat4::NFS4_OK)?;
            target.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_READLINK, results, status),
    }
}

pub(super) async fn op_remove(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let target = deserialize::<Vec<u8>>(input)?;

    let outcome = async {
        let dir_path = state.current_fh()?.clone();
        gate4(context, &dir_path, false, None)?;
        let dir_info = stat4(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &dir_path, true, Some(&dir_info))?;
        let child = child_path(&dir_path, &target).map_err(fs_util::nfsstat4_from)?;
        let info = context.vfs.stat(&child).await.map_err(io4)?;
        let before = change_of(&dir_info);
        if info.is_dir() {
            context.vfs.rmdir(&child).await.map_err(io4)?;
        } else {
            context.vfs.remove(&child).await.map_err(io4)?;
        }
        context.invalidate_caches(&child);
        context.invalidate_caches(&dir_path);
        Ok::<_, nfsstat4>(change_info(context, &dir_path, before).await)
    }
    .await;

    match outcome {
        Ok(cinfo) => {
            emit_status_only(nfs_opnum4::OP_REMOVE, results, nfsstat4::NFS4_OK)?;
            cinfo.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_REMOVE, results, status),
    }
}

pub(super) async fn op_rename(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let oldname = deserialize::<Vec<u8>>(input)?;
    let newname = deserialize::<Vec<u8>>(input)?;

    let outcome = async {
        let from_dir = state.saved_fh()?.clone();
        let to_dir = state.current_fh()?.clone();
        gate4(context, &from_dir, false, None)?;
        gate4(context, &to_dir, false, None)?;
        let from_info = stat4(context, &from_dir).await?;
        let to_info = stat4(context, &to_dir).await?;
        if !from_info.is_dir() || !to_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &from_dir, true, Some(&from_info))?;
        gate4(context, &to_dir, true, Some(&to_info))?;
        let from = child_path(&from_dir, &oldname).map_err(fs_util::nfsstat4_from)?;
        let to = child_path(&to_dir, &newname).map_err(fs_util::nfsstat4_from)?;
        let from_before = change_of(&from_info);
        let to_before = change_of(&to_info);
        context.vfs.stat(&from).await.map_err(io4)?;
        if from != to {
            context.vfs.rename(&from, &to).await.map_err(io4)?;
        }
        for path in [&from, &to, &from_dir, &to_dir] {
            context.invalidate_caches(path);
        }
        let source_cinfo = change_info(context, &from_dir, from_before).await;
        let target_cinfo = change_info(context, &to_dir, to_before).await;
        Ok::<_, nfsstat4>((source_cinfo, target_cinfo))
    }
    .await;

    match outcome {
        Ok((source_cinfo, target_cinfo)) => {
            emit_status_only(nfs_opnum4::OP_RENAME, results, nfsstat4::NFS4_OK)?;
            source_cinfo.serialize(results)?;
            target_cinfo.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_RENAME, results, status),
    }
}

pub(super) fn op_restorefh(
    results: &mut Vec<u8>,
    state: &mut CompoundState,
) -> std::io::Result<nfsstat4> {
    match state.saved.clone() {
        Some(saved) => {
            state.current = Some(saved);
            emit_status_only(nfs_opnum4::OP_RESTOREFH, results, nfsstat4::NFS4_OK)
        }
        None => emit_status_only(nfs_opnum4::OP_RESTOREFH, results, nfsstat4::NFS4ERR_NOFILEHANDLE),
    }
}

pub(super) fn op_savefh(
    results: &mut Vec<u8>,
    state: &mut CompoundState,
) -> std::io::Result<nfsstat4> {
    match state.current.clone() {
        Some(current) => {
            state.saved = Some(current);
            emit_status_only(nfs_opnum4::OP_SAVEFH, results, nfsstat4::NFS4_OK)
        }
        None => emit_status_only(nfs_opnum4::OP_SAVEFH, results, nfsstat4::NFS4ERR_NOFILEHANDLE),
    }
}

pub(super) async fn op_secinfo(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let name = deserialize::<Vec<u8>>(input)?;

    let outcome = async {
        let dir_path = state.current_fh()?.clone();
        gate4(context, &dir_path, false, None)?;
        let dir_info = stat4(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat4::NFS4ERR_NOTDIR);
        }
        gate4(context, &dir_path, false, Some(&dir_info))?;
        let child = child_path(&dir_path, &name).map_err(fs_util::nfsstat4_from)?;
        stat4(context, &child).await?;
        Ok::<_, nfsstat4>(())
    }
    .await;

    match outcome {
        Ok(()) => {
            emit_status_only(nfs_opnum4::OP_SECINFO, results, nfsstat4::NFS4_OK)?;
            // two non-GSS flavors: AUTH_SYS preferred, AUTH_NONE fallback
            2u32.serialize(results)?;
            1u32.serialize(results)?;
            0u32.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_SECINFO, results, status),
    }
}

pub(super) async fn op_setattr(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let _stateid = deserialize::<nfs4::stateid4>(input)?;
    let fattr = deserialize::<nfs4::fattr4>(input)?;

    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        let info = context.vfs.stat(&path).await.map_err(io4)?;
        gate4(context, &path, true, Some(&info))?;
        let attrs = super::decode_settable_attrs(&fattr)?;

        if let Some(mode) = attrs.mode {
            context.vfs.set_mode(&path, mode).await.map_err(io4)?;
        }
        if attrs.uid.is_some() || attrs.gid.is_some() {
            context.vfs.set_owner(&path, attrs.uid, attrs.gid).await.map_err(io4)?;
        }
        if let Some(size) = attrs.size {
            context.vfs.truncate(&path, size).await.map_err(io4)?;
        }
        if attrs.atime.is_some() || attrs.mtime.is_some() {
            context.vfs.set_times(&path, attrs.atime, attrs.mtime).await.map_err(io4)?;
        }
        context.invalidate_caches(&path);
        Ok::<_, nfsstat4>(attrs.applied)
    }
    .await;

    // SETATTR4res always carries the attrsset bitmap, empty on failure
    match outcome {
        Ok(applied) => {
            emit_status_only(nfs_opnum4::OP_SETATTR, results, nfsstat4::NFS4_OK)?;
            applied.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => {
            emit_status_only(nfs_opnum4::OP_SETATTR, results, status)?;
            nfs4::bitmap4::new().serialize(results)?;
            Ok(status)
        }
    }
}

pub(super) async fn op_write(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let _stateid = deserialize::<nfs4::stateid4>(input)?;
    let offset = deserialize::<u64>(input)?;
    let stable = deserialize::<nfs4::stable_how4>(input)?;
    let data = deserialize::<Vec<u8>>(input)?;

    let outcome = async {
        let path = state.current_fh()?.clone();
        gate4(context, &path, false, None)?;
        let info = context.vfs.stat(&path).await.map_err(io4)?;
        if info.is_dir() {
            return Err(nfsstat4::NFS4ERR_ISDIR);
        }
        let grant = gate4(context, &path, true, Some(&info))?;

        let new_end = offset.saturating_add(data.len() as u64);
        let delta = new_end.saturating_sub(info.size);
        context
            .quota
            .charge(&grant.export_root, grant.effective_uid, delta)
            .map_err(|_| nfsstat4::NFS4ERR_DQUOT)?;

        let mut requested = match stable {
            nfs4::stable_how4::UNSTABLE4 => Stability::Unstable,
            nfs4::stable_how4::DATA_SYNC4 => Stability::DataSync,
            nfs4::stable_how4::FILE_SYNC4 => Stability::FileSync,
        };
        if grant.sync_writes && requested == Stability::Unstable {
            requested = Stability::FileSync;
        }
        let committed = context
            .vfs
            .write(&path, offset, &data, requested)
            .await
            .map_err(|e| {
                context.quota.release(&grant.export_root, grant.effective_uid, delta);
                io4(e)
            })?;
        context.invalidate_caches(&path);
        Ok::<_, nfsstat4>((data.len() as u32, committed))
    }
    .await;

    match outcome {
        Ok((count, committed)) => {
            context.stats.record_bytes_written(count as u64);
            let committed = match committed {
                Stability::Unstable => nfs4::stable_how4::UNSTABLE4,
                Stability::DataSync => nfs4::stable_how4::DATA_SYNC4,
                Stability::FileSync => nfs4::stable_how4::FILE_SYNC4,
            };
            emit_status_only(nfs_opnum4::OP_WRITE, results, nfsstat4::NFS4_OK)?;
            count.serialize(results)?;
            committed.serialize(results)?;
            context.write_verifier.serialize(results)?;
            Ok(nfsstat4::NFS4_OK)
        }
        Err(status) => emit_status_only(nfs_opnum4::OP_WRITE, results, status),
    }
}

pub(super) fn op_release_lockowner(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let _clientid = deserialize::<u64>(input)?;
    let _owner = deserialize::<Vec<u8>>(input)?;
    // no lock state exists, so there is never anything to release
    emit_status_only(nfs_opnum4::OP_RELEASE_LOCKOWNER, results, nfsstat4::NFS4_OK)
}
