//! PORTMAP UNSET procedure (procedure 2): remove the mappings of a
//! program/version pair on every protocol. The protocol and port fields
//! of the argument are ignored per RFC 1833.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::portmap::mapping;
use crate::protocol::xdr::{self, Serialize};

pub fn pmapproc_unset(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(map) = decode_args::<mapping>(xid, input, output)? else {
        return Ok(());
    };
    let removed = context.portmap.unset(map.prog, map.vers);
    debug!("pmapproc_unset({:?},{:?}) --> {}", xid, map, removed);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    removed.serialize(output)?;
    Ok(())
}
