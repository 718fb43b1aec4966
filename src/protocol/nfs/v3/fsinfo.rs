//! NFSv3 FSINFO procedure (procedure 19, RFC 1813 §3.3.19): static file
//! system information, including the transfer sizes the server prefers.
//! The advertised values come from the server configuration so that what
//! FSINFO promises and what READ/WRITE enforce stay identical.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, stat3};

pub async fn nfsproc3_fsinfo(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs3::nfs_fh3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_fsinfo({:?},{:?})", xid, handle);

    let reply = async {
        let path = file_handle(context, &handle)?;
        gate_check(context, &path, false, None)?;
        let (_, fattr) = stat3(context, &path).await?;
        let read_size = context.config.read_size;
        let write_size = context.config.write_size;
        Ok::<_, nfsstat3>(nfs3::fs::fsinfo3 {
            obj_attributes: nfs3::post_op_attr::attributes(fattr),
            rtmax: read_size,
            rtpref: read_size,
            rtmult: 4096,
            wtmax: write_size,
            wtpref: write_size,
            wtmult: 4096,
            dtpref: read_size,
            maxfilesize: 128 * 1024 * 1024 * 1024,
            time_delta: nfs3::nfstime3 { seconds: 0, nseconds: 1_000_000 },
            properties: nfs3::fs::FSF_LINK
                | nfs3::fs::FSF_SYMLINK
                | nfs3::fs::FSF_HOMOGENEOUS
                | nfs3::fs::FSF_CANSETTIME,
        })
    }
    .await;

    match reply {
        Ok(res) => {
            debug!(" {:?} --> fsinfo ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_fsinfo error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
