//! NFSv3 GETATTR procedure (procedure 1, RFC 1813 §3.3.1): return the
//! attributes of the object a file handle refers to.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, stat3};

pub async fn nfsproc3_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(handle) = decode_args::<nfs3::nfs_fh3>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_getattr({:?},{:?})", xid, handle);

    let reply = async {
        let path = file_handle(context, &handle)?;
        gate_check(context, &path, false, None)?;
        let (_, fattr) = stat3(context, &path).await?;
        Ok::<_, nfsstat3>(fattr)
    }
    .await;

    match reply {
        Ok(fattr) => {
            debug!(" {:?} --> {:?}", xid, fattr);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            fattr.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_getattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    Ok(())
}
