//! Decode-and-acknowledge stubs for the session-style NFSv4 operations.
//!
//! No client, session or slot state is tracked: each operation's
//! arguments are fully decoded (so the compound cursor stays aligned)
//! and a minimal well-formed acknowledgement is returned. Clients that
//! insist on real session semantics will notice the echoed stub values
//! and fall back to 4.0 behavior.

use std::io::Read;

use tracing::debug;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs4::{self, nfs_opnum4, nfsstat4};
use crate::protocol::xdr::{deserialize, Serialize};

use super::ops::emit_status_only;

/// EXCHANGE_ID (op 42): echo an identity derived from the server's
/// write verifier so repeated calls look consistent.
pub(super) fn op_exchange_id(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let owner = deserialize::<nfs4::client_owner4>(input)?;
    let flags = deserialize::<u32>(input)?;
    let state_protect = deserialize::<u32>(input)?;
    if state_protect != nfs4::SP4_NONE {
        return emit_status_only(nfs_opnum4::OP_EXCHANGE_ID, results, nfsstat4::NFS4ERR_NOTSUPP);
    }
    // client_impl_id<1>
    let impl_ids = deserialize::<u32>(input)?;
    for _ in 0..impl_ids.min(1) {
        let _ = deserialize::<nfs4::nfs_impl_id4>(input)?;
    }
    debug!(
        "exchange_id stub for owner {:?} flags {:#x}",
        String::from_utf8_lossy(&owner.co_ownerid),
        flags
    );

    let clientid = u64::from_be_bytes(context.write_verifier);
    emit_status_only(nfs_opnum4::OP_EXCHANGE_ID, results, nfsstat4::NFS4_OK)?;
    clientid.serialize(results)?;
    1u32.serialize(results)?; // sequenceid
    0u32.serialize(results)?; // flags
    nfs4::SP4_NONE.serialize(results)?;
    nfs4::server_owner4 { so_minor_id: 0, so_major_id: b"simple-nfsd".to_vec() }
        .serialize(results)?;
    b"simple-nfsd".to_vec().serialize(results)?; // server_scope
    0u32.serialize(results)?; // server_impl_id<0>
    Ok(nfsstat4::NFS4_OK)
}

/// CREATE_SESSION (op 43): acknowledge with a session id derived from
/// the client id and echo the proposed channel attributes.
pub(super) fn op_create_session(
    input: &mut impl Read,
    results: &mut Vec<u8>,
    context: &Context,
) -> std::io::Result<nfsstat4> {
    let clientid = deserialize::<u64>(input)?;
    let sequence = deserialize::<u32>(input)?;
    let _flags = deserialize::<u32>(input)?;
    let fore_chan = deserialize::<nfs4::channel_attrs4>(input)?;
    let back_chan = deserialize::<nfs4::channel_attrs4>(input)?;
    let _cb_program = deserialize::<u32>(input)?;
    // callback_sec_parms<>
    let sec_parms = deserialize::<u32>(input)?;
    for _ in 0..sec_parms {
        match deserialize::<u32>(input)? {
            0 => {} // AUTH_NONE: void
            1 => {
                let _ = deserialize::<crate::xdr::rpc::auth_sys_parms>(input)?;
            }
            other => {
                debug!("create_session: unsupported callback flavor {}", other);
                return emit_status_only(
                    nfs_opnum4::OP_CREATE_SESSION,
                    results,
                    nfsstat4::NFS4ERR_NOTSUPP,
                );
            }
        }
    }

    let mut sessionid = nfs4::sessionid4::default();
    sessionid[..8].copy_from_slice(&clientid.to_be_bytes());
    sessionid[8..16].copy_from_slice(&context.write_verifier);

    emit_status_only(nfs_opnum4::OP_CREATE_SESSION, results, nfsstat4::NFS4_OK)?;
    sessionid.serialize(results)?;
    sequence.serialize(results)?;
    0u32.serialize(results)?; // flags
    fore_chan.serialize(results)?;
    back_chan.serialize(results)?;
    Ok(nfsstat4::NFS4_OK)
}

/// DESTROY_SESSION (op 44): nothing to destroy, acknowledge.
pub(super) fn op_destroy_session(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let _sessionid = deserialize::<nfs4::sessionid4>(input)?;
    emit_status_only(nfs_opnum4::OP_DESTROY_SESSION, results, nfsstat4::NFS4_OK)
}

/// DESTROY_CLIENTID (op 57): nothing to destroy, acknowledge.
pub(super) fn op_destroy_clientid(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let _clientid = deserialize::<u64>(input)?;
    emit_status_only(nfs_opnum4::OP_DESTROY_CLIENTID, results, nfsstat4::NFS4_OK)
}

/// SEQUENCE (op 53): echo the slot coordinates without caching anything.
pub(super) fn op_sequence(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let args = deserialize::<nfs4::SEQUENCE4args>(input)?;
    let resok = nfs4::SEQUENCE4resok {
        sr_sessionid: args.sa_sessionid,
        sr_sequenceid: args.sa_sequenceid,
        sr_slotid: args.sa_slotid,
        sr_highest_slotid: args.sa_highest_slotid,
        sr_target_highest_slotid: args.sa_highest_slotid,
        sr_status_flags: 0,
    };
    emit_status_only(nfs_opnum4::OP_SEQUENCE, results, nfsstat4::NFS4_OK)?;
    resok.serialize(results)?;
    Ok(nfsstat4::NFS4_OK)
}

/// RECLAIM_COMPLETE (op 58): no reclaim window exists, acknowledge.
pub(super) fn op_reclaim_complete(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let _one_fs = deserialize::<bool>(input)?;
    emit_status_only(nfs_opnum4::OP_RECLAIM_COMPLETE, results, nfsstat4::NFS4_OK)
}

/// BIND_CONN_TO_SESSION (op 41): echo the binding request.
pub(super) fn op_bind_conn_to_session(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let sessionid = deserialize::<nfs4::sessionid4>(input)?;
    let dir = deserialize::<u32>(input)?;
    let _use_rdma = deserialize::<bool>(input)?;
    emit_status_only(nfs_opnum4::OP_BIND_CONN_TO_SESSION, results, nfsstat4::NFS4_OK)?;
    sessionid.serialize(results)?;
    dir.serialize(results)?;
    false.serialize(results)?;
    Ok(nfsstat4::NFS4_OK)
}

/// GETDEVICEINFO (op 47): decoded for cursor alignment, then refused;
/// no layout driver exists.
pub(super) fn op_getdeviceinfo(
    input: &mut impl Read,
    results: &mut Vec<u8>,
) -> std::io::Result<nfsstat4> {
    let _deviceid = deserialize::<[u8; 16]>(input)?;
    let _layout_type = deserialize::<u32>(input)?;
    let _maxcount = deserialize::<u32>(input)?;
    let _notify = deserialize::<nfs4::bitmap4>(input)?;
    emit_status_only(nfs_opnum4::OP_GETDEVICEINFO, results, nfsstat4::NFS4ERR_NOTSUPP)
}
