//! NFSv3 LOOKUP procedure (procedure 3, RFC 1813 §3.3.3): resolve one
//! name inside a directory to a file handle plus attributes.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::{child_path, decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, stat3};

pub async fn nfsproc3_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::diropargs3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_lookup({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.dir)
        .and_then(|path| gate_check(context, &path, false, None).map(|_| path));
    let dir_path = match resolved {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };
    let dir_attr = post_op(context, &dir_path).await;

    let reply = async {
        let (dir_info, _) = stat3(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &dir_path, false, Some(&dir_info))?;
        let child = child_path(&dir_path, &args.name)?;
        let (_, fattr) = stat3(context, &child).await?;
        Ok::<_, nfsstat3>((context.handles.fh3_for(&child), fattr))
    }
    .await;

    match reply {
        Ok((object, obj_attr)) => {
            debug!(" {:?} --> {:?}", xid, obj_attr.fileid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            object.serialize(output)?;
            nfs3::post_op_attr::attributes(obj_attr).serialize(output)?;
            dir_attr.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc3_lookup error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
