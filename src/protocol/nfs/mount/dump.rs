//! MOUNT DUMP procedure (procedure 2): list the advisory mount table as
//! an XDR linked list.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::mount::mountbody;
use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_dump(
    xid: u32,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let entries = context.mounts.list();
    debug!("mountproc3_dump({:?}) --> {} entries", xid, entries.len());
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    let mut list: Option<Box<mountbody>> = None;
    for (hostname, directory) in entries.into_iter().rev() {
        list = Some(Box::new(mountbody {
            ml_hostname: hostname.into_bytes(),
            ml_directory: directory.to_string_lossy().into_owned().into_bytes(),
            ml_next: list,
        }));
    }
    list.serialize(output)?;
    Ok(())
}
