//! NFSv3 WRITE procedure (procedure 7, RFC 1813 §3.3.7): write a byte
//! range with the requested durability.
//!
//! The reply's `committed` field reports the durability actually
//! achieved, never weaker than requested; an export mounted `sync`
//! upgrades unstable writes to FILE_SYNC. The write verifier is the
//! 8-byte server instance id: clients that see it change know their
//! unstable writes died with the previous instance. A write that would
//! push the owner past a quota hard limit fails with DQUOT before any
//! data is written.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::Stability;

use super::{file_handle, post_op, pre_op};

pub async fn nfsproc3_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::file::WRITE3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_write({:?},{:?} bytes at {})", xid, args.count, args.offset);

    if args.data.len() != args.count as usize {
        xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
        return Ok(());
    }

    let resolved = file_handle(context, &args.file)
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
        if info.is_dir() {
            return Err(nfsstat3::NFS3ERR_ISDIR);
        }
        let grant = gate_check(context, &path, true, Some(&info))?;

        let new_end = args.offset.saturating_add(args.count as u64);
        let delta = new_end.saturating_sub(info.size);
        context
            .quota
            .charge(&grant.export_root, grant.effective_uid, delta)
            .map_err(|_| nfsstat3::NFS3ERR_DQUOT)?;

        let mut requested = Stability::from(args.stable);
        if grant.sync_writes && requested == Stability::Unstable {
            requested = Stability::FileSync;
        }
        let committed = context
            .vfs
            .write(&path, args.offset, &args.data, requested)
            .await
            .map_err(|e| {
                context.quota.release(&grant.export_root, grant.effective_uid, delta);
                crate::fs_util::nfsstat3_from_io(&e)
            })?;
        Ok::<_, nfsstat3>(committed.max(Stability::from(args.stable)))
    }
    .await;

    context.invalidate_caches(&path);

    match outcome {
        Ok(committed) => {
            debug!("write success {:?} --> {} bytes, committed {:?}", xid, args.count, committed);
            context.stats.record_bytes_written(args.count as u64);
            let res = nfs3::file::WRITE3resok {
                file_wcc: nfs3::wcc_data { before, after: post_op(context, &path).await },
                count: args.count,
                committed: committed.into(),
                verf: context.write_verifier,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("write error {:?} --> {:?}", xid, stat);
            let wcc = nfs3::wcc_data { before, after: post_op(context, &path).await };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
