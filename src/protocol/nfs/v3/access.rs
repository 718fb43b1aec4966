//! NFSv3 ACCESS procedure (procedure 4, RFC 1813 §3.3.4): report which
//! of the requested access bits the caller actually holds, letting the
//! client avoid operations that would fail.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, deserialize, Serialize};

use super::{file_handle, stat3};

pub async fn nfsproc3_access(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs3::nfs_fh3>(xid, input, output)? else {
        return Ok(());
    };
    let requested = match deserialize::<u32>(input) {
        Ok(mask) => mask,
        Err(_) => {
            xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
            return Ok(());
        }
    };
    debug!("nfsproc3_access({:?},{:?},{:#x})", xid, handle, requested);

    let resolved = file_handle(context, &handle).and_then(|path| {
        context
            .exports
            .read()
            .unwrap()
            .probe(&path, &context.principal, context.client_addr, None)
            .map_err(nfsstat3::from)
            .map(|_| path)
    });
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
        let grant = context
            .exports
            .read()
            .unwrap()
            .probe(&path, &context.principal, context.client_addr, Some(&info))
            .map_err(nfsstat3::from)?;
        Ok::<_, nfsstat3>((fattr, grant.bits & requested))
    }
    .await;

    match reply {
        Ok((fattr, granted)) => {
            debug!(" {:?} --> granted {:#x}", xid, granted);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_attr::attributes(fattr).serialize(output)?;
            granted.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc3_access error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
