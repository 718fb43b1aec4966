//! NFSv3 RENAME procedure (procedure 14, RFC 1813 §3.3.14): atomically
//! rename within one filesystem. Renaming a path onto itself succeeds
//! without touching anything.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{child_path, decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, pre_op, stat3};

pub async fn nfsproc3_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::dir::RENAME3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_rename({:?},{:?})", xid, args);

    let precheck = |fh: &nfs3::nfs_fh3| {
        file_handle(context, fh)
            .and_then(|path| gate_check(context, &path, false, None).map(|_| path))
    };
    let resolved = (precheck(&args.from.dir), precheck(&args.to.dir));
    let (from_dir, to_dir) = match resolved {
        (Ok(from), Ok(to)) => (from, to),
        (Err(stat), _) | (_, Err(stat)) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let from_before = pre_op(context, &from_dir).await;
    let to_before = pre_op(context, &to_dir).await;

    let outcome = async {
        let (from_info, _) = stat3(context, &from_dir).await?;
        let (to_info, _) = stat3(context, &to_dir).await?;
        if !from_info.is_dir() || !to_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &from_dir, true, Some(&from_info))?;
        gate_check(context, &to_dir, true, Some(&to_info))?;
        let from = child_path(&from_dir, &args.from.name)?;
        let to = child_path(&to_dir, &args.to.name)?;

        // the source must exist even for the no-op case
        context
            .vfs
            .stat(&from)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        if from == to {
            return Ok(());
        }
        context
            .vfs
            .rename(&from, &to)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        context.invalidate_caches(&from);
        context.invalidate_caches(&to);
        Ok::<_, nfsstat3>(())
    }
    .await;

    context.invalidate_caches(&from_dir);
    context.invalidate_caches(&to_dir);
    let from_wcc = nfs3::wcc_data { before: from_before, after: post_op(context, &from_dir).await };
    let to_wcc = nfs3::wcc_data { before: to_before, after: post_op(context, &to_dir).await };

    match outcome {
        Ok(()) => {
            debug!(" {:?} --> rename ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_rename error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    from_wcc.serialize(output)?;
    to_wcc.serialize(output)?;
    Ok(())
}
