//! NFSv3 COMMIT procedure (procedure 21, RFC 1813 §3.3.21): force
//! previously written unstable data to stable storage. The reply carries
//! the same write verifier as WRITE so clients can detect a restart
//! between the write and the commit.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, pre_op};

pub async fn nfsproc3_commit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::file::COMMIT3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_commit({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.file)
        .and_then(|path| gate_check(context, &path, false, None).map(|_| path));
    let path = match resolved {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let before = pre_op(context, &path).await;

    let outcome = async {
        gate_check(context, &path, false, None)?;
        context
            .vfs
            .fsync(&path)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))
    }
    .await;

    let wcc = nfs3::wcc_data { before, after: post_op(context, &path).await };
    match outcome {
        Ok(()) => {
            debug!(" {:?} --> commit ok", xid);
            let res = nfs3::file::COMMIT3resok { file_wcc: wcc, verf: context.write_verifier };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_commit error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
