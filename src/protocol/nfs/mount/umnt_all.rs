//! MOUNT UMNTALL procedure (procedure 4): remove every advisory mount
//! entry for the calling client.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::{self, Serialize};

pub async fn mountproc3_umnt_all(
    xid: u32,
    _input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    debug!("mountproc3_umnt_all({:?},{})", xid, context.client_addr);
    context.mounts.remove_all(&context.client_addr.ip().to_string());
    if let Some(ref chan) = context.mount_signal {
        let _ = chan.send(false).await;
    }
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
