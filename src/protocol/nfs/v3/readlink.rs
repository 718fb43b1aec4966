//! NFSv3 READLINK procedure (procedure 5, RFC 1813 §3.3.5): read the
//! target of a symbolic link. Calling it on anything else is INVAL.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, stat3};

pub async fn nfsproc3_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs3::nfs_fh3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_readlink({:?},{:?})", xid, handle);

    let resolved = file_handle(context, &handle)
        .and_then(|path| gate_check(context, &path, false, None).map(|_| path));
    let path = match resolved {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let reply = async {
        let (info, fattr) = stat3(context, &path).await?;
        if !info.is_symlink() {
            return Err(nfsstat3::NFS3ERR_INVAL);
        }
        let target = context
            .vfs
            .readlink(&path)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        Ok::<_, nfsstat3>((fattr, target))
    }
    .await;

    match reply {
        Ok((fattr, target)) => {
            debug!(" {:?} --> {:?}", xid, target);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_attr::attributes(fattr).serialize(output)?;
            let data: nfs3::nfspath3 =
                target.to_string_lossy().into_owned().into_bytes().into();
            data.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc3_readlink error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
