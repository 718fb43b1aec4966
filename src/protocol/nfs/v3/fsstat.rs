//! NFSv3 FSSTAT procedure (procedure 18, RFC 1813 §3.3.18): volatile
//! file system statistics.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, stat3};

pub async fn nfsproc3_fsstat(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs3::nfs_fh3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_fsstat({:?},{:?})", xid, handle);

    let reply = async {
        let path = file_handle(context, &handle)?;
        gate_check(context, &path, false, None)?;
        let (_, fattr) = stat3(context, &path).await?;
        let stats = context
            .vfs
            .statfs(&path)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
        Ok::<_, nfsstat3>(nfs3::fs::FSSTAT3resok {
            obj_attributes: nfs3::post_op_attr::attributes(fattr),
            tbytes: stats.total_bytes,
            fbytes: stats.free_bytes,
            abytes: stats.avail_bytes,
            tfiles: stats.total_files,
            ffiles: stats.free_files,
            afiles: stats.avail_files,
            invarsec: 0,
        })
    }
    .await;

    match reply {
        Ok(res) => {
            debug!(" {:?} --> fsstat ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_fsstat error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
