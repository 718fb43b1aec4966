//! NFSv3 MKNOD procedure (procedure 11, RFC 1813 §3.3.11): create a
//! special file.
//!
//! Creating device nodes, sockets and FIFOs requires mknod(2), which the
//! portable adapter does not expose, so every variant is answered with
//! NOTSUPP after full argument decoding. FSINFO does not advertise
//! special-file support either, so well-behaved clients never get here.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::protocol::nfs::{child_path, decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, pre_op, stat3};

pub async fn nfsproc3_mknod(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::dir::MKNOD3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_mknod({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.where_dir.dir)
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

    let stat = async {
        let (dir_info, _) = stat3(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &dir_path, true, Some(&dir_info))?;
        child_path(&dir_path, &args.where_dir.name)?;
        warn!("mknod {:?} refused: special files are not supported", args.where_dir.name);
        Err::<(), _>(nfsstat3::NFS3ERR_NOTSUPP)
    }
    .await
    .unwrap_err();

    let dir_wcc = nfs3::wcc_data { before, after: post_op(context, &dir_path).await };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    stat.serialize(output)?;
    dir_wcc.serialize(output)?;
    Ok(())
}
