//! MOUNT EXPORT procedure (procedure 5): list the export table with the
//! client specs of each export, as nested XDR linked lists.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::mount::{exportnode, groupnode};
use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_export(
    xid: u32,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    let exports = context.exports.read().unwrap();
    debug!("mountproc3_export({:?}) --> {} exports", xid, exports.exports().len());
    let mut list: Option<Box<exportnode>> = None;
    for export in exports.exports().iter().rev() {
        let mut groups: Option<Box<groupnode>> = None;
        for client in export.clients.iter().rev() {
            let name = match client {
                crate::exports::ClientSpec::Any => "*".to_string(),
                crate::exports::ClientSpec::Addr(a) => a.to_string(),
                crate::exports::ClientSpec::Net(a, p) => format!("{a}/{p}"),
                crate::exports::ClientSpec::HostGlob(g) => g.clone(),
                crate::exports::ClientSpec::Host(h) => h.clone(),
            };
            groups = Some(Box::new(groupnode { gr_name: name.into_bytes(), gr_next: groups }));
        }
        list = Some(Box::new(exportnode {
            ex_dir: export.path.to_string_lossy().into_owned().into_bytes(),
            ex_groups: groups,
            ex_next: list,
        }));
    }
    list.serialize(output)?;
    Ok(())
}
