//! PORTMAP CALLIT procedure (procedure 5): indirect calling.
//!
//! A full portmapper relays the embedded call to the target service and
//! forwards its results. This server decodes and logs the request and
//! replies with port 0 and empty results, which tells the caller nothing
//! was forwarded.

use std::io::{Read, Write};

use tracing::{debug, info};

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::portmap::{call_args, call_result};
use crate::protocol::xdr::{self, Serialize};

pub fn pmapproc_callit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<call_args>(xid, input, output)? else {
        return Ok(());
    };
    let target_port =
        context.portmap.getport(args.prog, args.vers, xdr::portmap::IPPROTO_TCP);
    info!(
        "pmapproc_callit: prog {} vers {} proc {} ({} arg bytes) from {} not forwarded \
         (target port {})",
        args.prog,
        args.vers,
        args.proc,
        args.args.len(),
        context.client_addr,
        target_port
    );
    let result = call_result { port: 0, res: Vec::new() };
    debug!("pmapproc_callit({:?}) --> {:?}", xid, result);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    result.serialize(output)?;
    Ok(())
}
