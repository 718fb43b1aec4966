//! NFSv2 STATFS procedure (procedure 17, RFC 1094 §2.2.18): file system
//! capacity in 512-byte blocks.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs2::{self, nfsstat2};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle2, gate2, stat2_from};

pub async fn nfsproc2_statfs(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs2::fhandle2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_statfs({:?})", xid);

    let reply = async {
        let path = file_handle2(context, &handle)?;
        gate2(context, &path, false, None)?;
        let stats = context
            .vfs
            .statfs(&path)
            .await
            .map_err(|e| stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?;
        let blocks = |bytes: u64| (bytes / 512).min(u32::MAX as u64) as u32;
        Ok::<_, nfsstat2>(nfs2::statfsok2 {
            tsize: nfs2::MAXDATA,
            bsize: 512,
            blocks: blocks(stats.total_bytes),
            bfree: blocks(stats.free_bytes),
            bavail: blocks(stats.avail_bytes),
        })
    }
    .await;

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    match reply {
        Ok(res) => {
            nfsstat2::NFS_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc2_statfs error {:?} --> {:?}", xid, stat);
            stat.serialize(output)?;
        }
    }
    Ok(())
}
