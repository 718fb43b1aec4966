//! NFSv3 MKDIR procedure (procedure 9, RFC 1813 §3.3.9): create a
//! directory with initial attributes.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{child_path, decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::setattr::apply_sattr;
use super::{file_handle, post_op, pre_op, stat3};

pub async fn nfsproc3_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::dir::MKDIR3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_mkdir({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.dirops.dir)
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

    let reply = async {
        let (dir_info, _) = stat3(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &dir_path, true, Some(&dir_info))?;
        let child = child_path(&dir_path, &args.dirops.name)?;

        let mode = match args.attributes.mode {
            nfs3::set_mode3::mode(mode) => mode,
            nfs3::set_mode3::Void => 0o755,
        };
        let info = context
            .vfs
            .mkdir(&child, mode)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        apply_sattr(context, &child, &info, &args.attributes).await?;

        context.invalidate_caches(&child);
        let (_, fattr) = stat3(context, &child).await?;
        Ok::<_, nfsstat3>((context.handles.fh3_for(&child), fattr))
    }
    .await;

    context.invalidate_caches(&dir_path);
    let dir_wcc = nfs3::wcc_data { before, after: post_op(context, &dir_path).await };

    match reply {
        Ok((handle, fattr)) => {
            debug!(" {:?} --> mkdir fileid {}", xid, fattr.fileid);
            let res = nfs3::file::CREATE3resok {
                obj: nfs3::post_op_fh3::handle(handle),
                obj_attributes: nfs3::post_op_attr::attributes(fattr),
                dir_wcc,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_mkdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_wcc.serialize(output)?;
        }
    }
    Ok(())
}
