//! MOUNT version 3 protocol handlers (RFC 1813 Appendix I).
//!
//! MNT turns an export path into the NFSv3 root file handle after the
//! export gate has admitted the caller; DUMP/UMNT/UMNTALL maintain the
//! advisory table of who mounted what; EXPORT lists the export table.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::mount::{MountProcedure, PROGRAM, VERSION};
use crate::protocol::xdr::{self, Serialize};

mod dump;
mod export;
mod mnt;
mod null;
mod umnt;
mod umnt_all;

use dump::mountproc3_dump;
use export::mountproc3_export;
use mnt::mountproc3_mnt;
use null::mountproc3_null;
use umnt::mountproc3_umnt;
use umnt_all::mountproc3_umnt_all;

/// Advisory record of active mounts, keyed by client address text and
/// mounted directory. Purely informational, as in every NFS server: the
/// protocol offers no way to enforce it.
#[derive(Default)]
pub struct MountTable {
    entries: Mutex<HashSet<(String, PathBuf)>>,
}

impl MountTable {
    pub fn add(&self, client: &str, dir: PathBuf) {
        self.entries.lock().unwrap().insert((client.to_string(), dir));
    }

    pub fn remove(&self, client: &str, dir: &PathBuf) {
        self.entries.lock().unwrap().remove(&(client.to_string(), dir.clone()));
    }

    pub fn remove_all(&self, client: &str) {
        self.entries.lock().unwrap().retain(|(c, _)| c != client);
    }

    pub fn list(&self) -> Vec<(String, PathBuf)> {
        let mut entries: Vec<_> = self.entries.lock().unwrap().iter().cloned().collect();
        entries.sort();
        entries
    }
}

/// Main handler for the MOUNT protocol.
pub async fn handle_mount(
    xid: u32,
    call: &xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    if call.vers != VERSION {
        warn!("invalid mount version {} != {}", call.vers, VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, VERSION, VERSION).serialize(output)?;
        return Ok(());
    }
    debug_assert_eq!(call.prog, PROGRAM);
    let proc = MountProcedure::from_u32(call.proc).unwrap_or(MountProcedure::INVALID);

    match proc {
        MountProcedure::MOUNTPROC3_NULL => mountproc3_null(xid, output)?,
        MountProcedure::MOUNTPROC3_MNT => mountproc3_mnt(xid, input, output, context).await?,
        MountProcedure::MOUNTPROC3_DUMP => mountproc3_dump(xid, output, context)?,
        MountProcedure::MOUNTPROC3_UMNT => mountproc3_umnt(xid, input, output, context).await?,
        MountProcedure::MOUNTPROC3_UMNTALL => {
            mountproc3_umnt_all(xid, input, output, context).await?
        }
        MountProcedure::MOUNTPROC3_EXPORT => mountproc3_export(xid, output, context)?,
        MountProcedure::INVALID => {
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
