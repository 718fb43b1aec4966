//! NFS version 4 procedure handlers (RFC 7530, stateless subset).
//!
//! Version 4 has two procedures: NULL and COMPOUND. COMPOUND carries a
//! sequence of operations that share a "current filehandle" (and a saved
//! one for RENAME/LINK). Operations execute in order; the first failure
//! stops the sequence and becomes the compound status. Stateful
//! operations (OPEN, CLOSE, LOCK and friends) answer NFS4ERR_NOTSUPP;
//! the session-style operations are decoded and acknowledged without any
//! state being kept.

use std::io::{Read, Write};
use std::path::PathBuf;

use num_traits::cast::FromPrimitive;
use tracing::{debug, warn};

use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs4::{self, nfs_opnum4, nfsstat4};
use crate::protocol::xdr::{self, deserialize, Serialize};

mod attrs;
mod ops;
mod session;

pub(crate) use attrs::{decode_settable_attrs, encode_fattr4};

/// Ceiling on operations in one compound, guarding against op bombs.
const MAX_COMPOUND_OPS: u32 = 256;

/// Mutable state threaded through a compound evaluation.
pub(super) struct CompoundState {
    /// The current filehandle, as a resolved path
    pub current: Option<PathBuf>,
    /// The saved filehandle set by SAVEFH
    pub saved: Option<PathBuf>,
}

impl CompoundState {
    fn new() -> CompoundState {
        CompoundState { current: None, saved: None }
    }

    /// The current filehandle or NOFILEHANDLE.
    pub fn current_fh(&self) -> Result<&PathBuf, nfsstat4> {
        self.current.as_ref().ok_or(nfsstat4::NFS4ERR_NOFILEHANDLE)
    }

    pub fn saved_fh(&self) -> Result<&PathBuf, nfsstat4> {
        self.saved.as_ref().ok_or(nfsstat4::NFS4ERR_NOFILEHANDLE)
    }
}

/// Main handler for NFS version 4.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    debug_assert_eq!(call.vers, nfs4::VERSION);
    match call.proc {
        0 => {
            debug!("nfsproc4_null({:?})", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
        }
        1 => nfsproc4_compound(xid, input, output, context).await?,
        _ => {
            warn!("unknown NFSv4 procedure {}", call.proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}

/// COMPOUND (procedure 1): decode the envelope, evaluate operations in
/// order, and emit the per-op status stream.
async fn nfsproc4_compound(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let (tag, minorversion, numops) = match decode_envelope(input) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("compound envelope decode failure for xid {}: {}", xid, e);
            xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
            return Ok(());
        }
    };
    debug!(
        "nfsproc4_compound({:?}, tag {:?}, minor {}, {} ops)",
        xid,
        String::from_utf8_lossy(&tag),
        minorversion,
        numops
    );

    // minor versions 0 and 1 are evaluated; anything newer is refused
    if minorversion > 1 {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfsstat4::NFS4ERR_MINOR_VERS_MISMATCH.serialize(output)?;
        tag.serialize(output)?;
        0u32.serialize(output)?;
        return Ok(());
    }
    if numops > MAX_COMPOUND_OPS {
        xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
        return Ok(());
    }

    let mut state = CompoundState::new();
    let mut results: Vec<u8> = Vec::new();
    let mut status = nfsstat4::NFS4_OK;
    let mut completed = 0u32;

    for _ in 0..numops {
        let opnum = match deserialize::<u32>(input) {
            Ok(op) => op,
            Err(_) => {
                // envelope promised more ops than the body carries
                status = nfsstat4::NFS4ERR_BADXDR;
                break;
            }
        };
        let op = nfs_opnum4::from_u32(opnum).unwrap_or(nfs_opnum4::OP_ILLEGAL);
        let op_status = eval_op(op, input, &mut results, &mut state, context).await;
        completed += 1;
        if op_status != nfsstat4::NFS4_OK {
            status = op_status;
            break;
        }
    }

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    tag.serialize(output)?;
    completed.serialize(output)?;
    output.write_all(&results)?;
    Ok(())
}

fn decode_envelope(input: &mut impl Read) -> std::io::Result<(Vec<u8>, u32, u32)> {
    let tag = deserialize::<Vec<u8>>(input)?;
    let minorversion = deserialize::<u32>(input)?;
    let numops = deserialize::<u32>(input)?;
    Ok((tag, minorversion, numops))
}

/// Evaluates one operation: decodes its arguments, performs it, writes
/// its complete `nfs_resop4` (opnum + result body) to `results` and
/// returns its status.
async fn eval_op(
    op: nfs_opnum4,
    input: &mut impl Read,
    results: &mut Vec<u8>,
    state: &mut CompoundState,
    context: &Context,
) -> nfsstat4 {
    use nfs_opnum4::*;

    // writes below go to an in-memory Vec and cannot fail
    let status = match op {
        OP_ACCESS => ops::op_access(input, results, state, context).await,
        OP_COMMIT => ops::op_commit(input, results, state, context).await,
        OP_CREATE => ops::op_create(input, results, state, context).await,
        OP_GETATTR => ops::op_getattr(input, results, state, context).await,
        OP_GETFH => ops::op_getfh(results, state, context),
        OP_LINK => ops::op_link(input, results, state, context).await,
        OP_LOOKUP => ops::op_lookup(input, results, state, context).await,
        OP_LOOKUPP => ops::op_lookupp(results, state, context).await,
        OP_PUTFH => ops::op_putfh(input, results, state, context),
        OP_PUTPUBFH | OP_PUTROOTFH => ops::op_putrootfh(op, results, state, context),
        OP_READ => ops::op_read(input, results, state, context).await,
        OP_READDIR => ops::op_readdir(input, results, state, context).await,
        OP_READLINK => ops::op_readlink(results, state, context).await,
        OP_REMOVE => ops::op_remove(input, results, state, context).await,
        OP_RENAME => ops::op_rename(input, results, state, context).await,
        OP_RESTOREFH => ops::op_restorefh(results, state),
        OP_SAVEFH => ops::op_savefh(results, state),
        OP_SECINFO => ops::op_secinfo(input, results, state, context).await,
        OP_SETATTR => ops::op_setattr(input, results, state, context).await,
        OP_WRITE => ops::op_write(input, results, state, context).await,
        OP_RELEASE_LOCKOWNER => ops::op_release_lockowner(input, results),

        OP_EXCHANGE_ID => session::op_exchange_id(input, results, context),
        OP_CREATE_SESSION => session::op_create_session(input, results, context),
        OP_DESTROY_SESSION => session::op_destroy_session(input, results),
        OP_DESTROY_CLIENTID => session::op_destroy_clientid(input, results),
        OP_SEQUENCE => session::op_sequence(input, results),
        OP_RECLAIM_COMPLETE => session::op_reclaim_complete(input, results),
        OP_BIND_CONN_TO_SESSION => session::op_bind_conn_to_session(input, results),
        OP_GETDEVICEINFO => session::op_getdeviceinfo(input, results),

        // the stateful layer is out of scope: refuse without decoding,
        // which also ends the compound
        OP_CLOSE | OP_DELEGPURGE | OP_DELEGRETURN | OP_LOCK | OP_LOCKT | OP_LOCKU | OP_OPEN
        | OP_OPENATTR | OP_OPEN_CONFIRM | OP_OPEN_DOWNGRADE | OP_NVERIFY | OP_VERIFY
        | OP_RENEW | OP_SETCLIENTID | OP_SETCLIENTID_CONFIRM => {
            debug!("stateful or unsupported op {:?} answered NOTSUPP", op);
            ops::emit_status_only(op, results, nfsstat4::NFS4ERR_NOTSUPP)
        }

        OP_ILLEGAL => ops::emit_status_only(OP_ILLEGAL, results, nfsstat4::NFS4ERR_OP_ILLEGAL),
    };
    match status {
        Ok(op_status) => op_status,
        Err(e) => {
            // ops decode all arguments before writing any result bytes,
            // so a decode failure can still produce a well-formed resop
            debug!("op {:?} argument decode failure: {}", op, e);
            let _ = ops::emit_status_only(op, results, nfsstat4::NFS4ERR_BADXDR);
            nfsstat4::NFS4ERR_BADXDR
        }
    }
}
