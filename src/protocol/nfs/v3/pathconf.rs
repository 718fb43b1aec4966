//! NFSv3 PATHCONF procedure (procedure 20, RFC 1813 §3.3.20): POSIX
//! pathconf information for the object's file system.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, stat3};

pub async fn nfsproc3_pathconf(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs3::nfs_fh3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_pathconf({:?},{:?})", xid, handle);

    let reply = async {
        let path = file_handle(context, &handle)?;
        gate_check(context, &path, false, None)?;
        let (_, fattr) = stat3(context, &path).await?;
        Ok::<_, nfsstat3>(nfs3::fs::PATHCONF3resok {
            obj_attributes: nfs3::post_op_attr::attributes(fattr),
            linkmax: 32000,
            name_max: 255,
            no_trunc: true,
            chown_restricted: true,
            case_insensitive: false,
            case_preserving: true,
        })
    }
    .await;

    match reply {
        Ok(res) => {
            debug!(" {:?} --> pathconf ok", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_pathconf error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
