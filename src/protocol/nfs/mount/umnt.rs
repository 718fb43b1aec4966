//! MOUNT UMNT procedure (procedure 3): remove one advisory mount entry
//! for the calling client. Always succeeds on the wire.

use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::mount::dirpath;
use crate::protocol::xdr::{self, Serialize};

pub async fn mountproc3_umnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(path) = decode_args::<dirpath>(xid, input, output)? else {
        return Ok(());
    };
    let dir = PathBuf::from(String::from_utf8_lossy(&path).into_owned());
    debug!("mountproc3_umnt({:?},{:?})", xid, dir);
    context.mounts.remove(&context.client_addr.ip().to_string(), &dir);
    if let Some(ref chan) = context.mount_signal {
        let _ = chan.send(false).await;
    }
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
