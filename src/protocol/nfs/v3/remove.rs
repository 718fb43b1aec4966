//! NFSv3 REMOVE procedure (procedure 12, RFC 1813 §3.3.12): unlink a
//! non-directory object from a directory.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{child_path, decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, pre_op, stat3};

pub async fn nfsproc3_remove(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::diropargs3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_remove({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.dir)
        .and_then(|path| gate_check(context, &path, false, None).map(|_| path));
    let dir_path = match resolved {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let before = pre_op(context, &dir_path).await;

    let outcome = async {
        let (dir_info, _) = stat3(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &dir_path, true, Some(&dir_info))?;
        let child = child_path(&dir_path, &args.name)?;
        let info = context
            .vfs
            .stat(&child)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        if info.is_dir() {
            return Err(nfsstat3::NFS3ERR_ISDIR);
        }
        context
            .vfs
            .remove(&child)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        context.invalidate_caches(&child);
        Ok::<_, nfsstat3>(())
    }
    .await;

    context.invalidate_caches(&dir_path);
    let dir_wcc = nfs3::wcc_data { before, after: post_op(context, &dir_path).await };

    match outcome {
        Ok(()) => {
            debug!(" {:?} --> remove ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            dir_wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_remove error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_wcc.serialize(output)?;
        }
    }
    Ok(())
}
