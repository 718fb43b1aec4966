//! PORTMAP SET procedure (procedure 1): register a mapping.
//!
//! The registrant is identified by its peer address; a mapping held at a
//! different port by a different registrant cannot be overwritten. The
//! reply is a single boolean.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::portmap::mapping;
use crate::protocol::xdr::{self, Serialize};

pub fn pmapproc_set(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(map) = decode_args::<mapping>(xid, input, output)? else {
        return Ok(());
    };
    let owner = context.client_addr.ip().to_string();
    let inserted = context.portmap.set(&map, &owner);
    debug!("pmapproc_set({:?},{:?}) --> {}", xid, map, inserted);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    inserted.serialize(output)?;
    Ok(())
}
