//! MOUNT MNT procedure (procedure 1): validate an export path against
//! the gate and hand back the NFSv3 root file handle plus the accepted
//! authentication flavors.

use std::io::{Read, Write};
use std::path::PathBuf;

use num_traits::cast::ToPrimitive;
use tracing::debug;

use crate::exports::normalized;
use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::mount::{dirpath, mountres3_ok, mountstat3};
use crate::protocol::xdr::{self, Serialize};

pub async fn mountproc3_mnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(path) = decode_args::<dirpath>(xid, input, output)? else {
        return Ok(());
    };
    let requested = PathBuf::from(String::from_utf8_lossy(&path).into_owned());
    debug!("mountproc3_mnt({:?},{:?})", xid, requested);

    let Some(path) = normalized(&requested) else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        mountstat3::MNT3ERR_NOENT.serialize(output)?;
        return Ok(());
    };

    // the mount point must exist and be a directory before the gate runs
    let info = match context.stat_cached(&path).await {
        Ok(info) if info.is_dir() => info,
        Ok(_) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            mountstat3::MNT3ERR_NOTDIR.serialize(output)?;
            return Ok(());
        }
        Err(_) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            mountstat3::MNT3ERR_NOENT.serialize(output)?;
            return Ok(());
        }
    };

    if gate_check(context, &path, false, Some(&info)).is_err() {
        debug!("{:?} --> no export admits {:?}", xid, context.client_addr);
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        mountstat3::MNT3ERR_ACCES.serialize(output)?;
        return Ok(());
    }

    let response = mountres3_ok {
        fhandle: context.handles.fh3_for(&path).data,
        auth_flavors: vec![
            xdr::rpc::auth_flavor::AUTH_SYS.to_u32().unwrap(),
            xdr::rpc::auth_flavor::AUTH_NONE.to_u32().unwrap(),
        ],
    };
    context.mounts.add(&context.client_addr.ip().to_string(), path);
    if let Some(ref chan) = context.mount_signal {
        let _ = chan.send(true).await;
    }
    debug!("{:?} --> {:?}", xid, response);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    mountstat3::MNT3_OK.serialize(output)?;
    response.serialize(output)?;
    Ok(())
}
