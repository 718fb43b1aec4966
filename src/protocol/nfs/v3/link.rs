//! NFSv3 LINK procedure (procedure 15, RFC 1813 §3.3.15): create a hard
//! link to an existing file in a (possibly different) directory of the
//! same filesystem.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{child_path, decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, pre_op, stat3};

pub async fn nfsproc3_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::file::LINK3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_link({:?},{:?})", xid, args);

    let precheck = |fh: &nfs3::nfs_fh3| {
        file_handle(context, fh)
            .and_then(|path| gate_check(context, &path, false, None).map(|_| path))
    };
    let resolved = (precheck(&args.file), precheck(&args.link.dir));
    let (file_path, dir_path) = match resolved {
        (Ok(file), Ok(dir)) => (file, dir),
        (Err(stat), _) | (_, Err(stat)) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let before = pre_op(context, &dir_path).await;

    let outcome = async {
        let (file_info, _) = stat3(context, &file_path).await?;
        if file_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_ISDIR);
        }
        let (dir_info, _) = stat3(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &file_path, false, Some(&file_info))?;
        gate_check(context, &dir_path, true, Some(&dir_info))?;
        let link = child_path(&dir_path, &args.link.name)?;
        context
            .vfs
            .link(&file_path, &link)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        context.invalidate_caches(&link);
        Ok::<_, nfsstat3>(())
    }
    .await;

    context.invalidate_caches(&file_path);
    context.invalidate_caches(&dir_path);
    let file_attr = post_op(context, &file_path).await;
    let linkdir_wcc = nfs3::wcc_data { before, after: post_op(context, &dir_path).await };

    match outcome {
        Ok(()) => {
            debug!(" {:?} --> link ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_link error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    file_attr.serialize(output)?;
    linkdir_wcc.serialize(output)?;
    Ok(())
}
