//! PORTMAP GETPORT procedure (procedure 3): look up the port registered
//! for `(program, version, protocol)`. Zero means no registration, which
//! clients treat as "service not available".

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::portmap::mapping;
use crate::protocol::xdr::{self, Serialize};

pub fn pmapproc_getport(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(map) = decode_args::<mapping>(xid, input, output)? else {
        return Ok(());
    };
    let port = context.portmap.getport(map.prog, map.vers, map.prot) as u32;
    debug!("pmapproc_getport({:?},{:?}) --> {}", xid, map, port);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    port.serialize(output)?;
    Ok(())
}
