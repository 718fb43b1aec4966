//! PORTMAP DUMP procedure (procedure 4): list every registered mapping
//! as an XDR linked list terminated by a zero discriminant.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::portmap::pmaplist;
use crate::protocol::xdr::{self, Serialize};

pub fn pmapproc_dump(
    xid: u32,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let mappings = context.portmap.dump();
    debug!("pmapproc_dump({:?}) --> {} mappings", xid, mappings.len());
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    let mut list: Option<Box<pmaplist>> = None;
    for map in mappings.into_iter().rev() {
        list = Some(Box::new(pmaplist { map, next: list }));
    }
    list.serialize(output)?;
    Ok(())
}
