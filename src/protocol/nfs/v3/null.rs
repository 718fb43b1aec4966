//! NFSv3 NULL procedure (procedure 0): do nothing. Clients use it to
//! ping the server and measure round-trip time.

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

pub fn nfsproc3_null(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("nfsproc3_null({:?})", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
