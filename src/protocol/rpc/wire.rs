//! RPC record framing and the top-level call dispatcher.
//!
//! Stream transports carry RPC messages under the Record Marking Standard
//! (RFC 5531 §11): each record is a sequence of fragments, each prefixed
//! by a 4-byte header whose low 31 bits give the fragment length and
//! whose high bit marks the final fragment. UDP needs none of this; one
//! datagram is one record.
//!
//! [`handle_rpc`] is the seam both transports feed: it decodes the call
//! header, authenticates, filters retransmissions and routes the call to
//! the portmap, mount or per-version NFS handlers. Exactly one reply is
//! written per accepted call; retransmissions produce none.

use std::io::{Read, Write};

use anyhow::anyhow;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::protocol::rpc::Context;
use crate::protocol::xdr::{self, deserialize, mount, nfs2, nfs3, portmap, Serialize};
use crate::protocol::nfs;

/// Ceiling on a reassembled RPC record; aligned with the XDR opaque
/// ceiling so a record that framed cannot still length-bomb the decoder.
pub const MAX_RPC_RECORD_LENGTH: usize = xdr::MAX_OPAQUE_LEN;

/// RPC program number for NFS Access Control Lists.
const NFS_ACL_PROGRAM: u32 = 100227;
/// RPC program number for NFS ID Mapping.
const NFS_ID_MAP_PROGRAM: u32 = 100270;
/// RPC program number for NFS Metadata.
const NFS_METADATA_PROGRAM: u32 = 200024;
/// RPC program number for the LOCALIO auxiliary protocol.
const NFS_LOCALIO_PROGRAM: u32 = 400122;

/// Reads one record-marked fragment, appending its payload to `append_to`.
/// Returns true when this was the record's final fragment.
async fn read_fragment<S: AsyncRead + Unpin>(
    socket: &mut S,
    append_to: &mut Vec<u8>,
) -> Result<bool, anyhow::Error> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & (1 << 31)) > 0;
    let length = (fragment_header & ((1 << 31) - 1)) as usize;
    trace!("reading fragment length:{} last:{}", length, is_last);
    if append_to.len().saturating_add(length) > MAX_RPC_RECORD_LENGTH {
        return Err(anyhow!(
            "RPC record length {} exceeds max {}",
            append_to.len() + length,
            MAX_RPC_RECORD_LENGTH
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(append_to.len() + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Reads one complete RPC record, reassembling fragments.
pub async fn read_record<S: AsyncRead + Unpin>(socket: &mut S) -> Result<Vec<u8>, anyhow::Error> {
    let mut record = Vec::new();
    loop {
        if read_fragment(socket, &mut record).await? {
            return Ok(record);
        }
    }
}

/// Writes `buf` as record-marked fragments. A single fragment with the
/// final bit set is the common case; buffers beyond 2^31-1 bytes are
/// split.
pub async fn write_fragment<S: AsyncWrite + Unpin>(
    socket: &mut S,
    buf: &[u8],
) -> Result<(), anyhow::Error> {
    const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

    let mut offset = 0;
    loop {
        let remaining = buf.len() - offset;
        let fragment_size = remaining.min(MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= buf.len();
        let fragment_header =
            if is_last { fragment_size as u32 | (1 << 31) } else { fragment_size as u32 };
        socket.write_all(&u32::to_be_bytes(fragment_header)).await?;
        trace!("writing fragment length:{} last:{}", fragment_size, is_last);
        socket.write_all(&buf[offset..offset + fragment_size]).await?;
        offset += fragment_size;
        if is_last {
            return Ok(());
        }
    }
}

/// Processes a single RPC record.
///
/// Decodes the message, validates the RPC version, drops retransmissions,
/// authenticates the caller and routes to the program handler. Returns
/// true when a reply was written to `output`, false when the record was a
/// retransmission and must produce no reply.
pub async fn handle_rpc(
    input: &mut (impl Read + Send),
    output: &mut (impl Write + Send),
    context: &mut Context,
) -> Result<bool, anyhow::Error> {
    let recv = deserialize::<xdr::rpc::rpc_msg>(input)?;
    let xid = recv.xid;
    let xdr::rpc::rpc_body::CALL(call) = recv.body else {
        return Err(anyhow!("received a REPLY where a CALL was expected"));
    };

    if call.rpcvers != xdr::rpc::RPC_VERSION {
        warn!("invalid RPC version {} != {}", call.rpcvers, xdr::rpc::RPC_VERSION);
        xdr::rpc::rpc_mismatch_reply_message(xid).serialize(output)?;
        return Ok(true);
    }

    if context.transaction_tracker.is_retransmission(xid, &context.client_addr) {
        debug!("retransmission detected, xid: {}, client: {}", xid, context.client_addr);
        return Ok(false);
    }

    context.stats.record_call(call.prog);

    match context.auth.authenticate(&call.cred, &call.verf, &context.client_addr) {
        Ok(principal) => context.principal = principal,
        Err(stat) => {
            debug!("auth failure for xid {}: {:?}", xid, stat);
            xdr::rpc::auth_error_reply_message(xid, stat).serialize(output)?;
            context.transaction_tracker.mark_processed(xid, &context.client_addr);
            return Ok(true);
        }
    }

    match call.prog {
        nfs3::PROGRAM => match call.vers {
            nfs2::VERSION => nfs::v2::handle_nfs(xid, call, input, output, context).await?,
            nfs3::VERSION => nfs::v3::handle_nfs(xid, call, input, output, context).await?,
            xdr::nfs4::VERSION => nfs::v4::handle_nfs(xid, call, input, output, context).await?,
            _ => {
                warn!(
                    "unsupported NFS version {} (supported {}..={})",
                    call.vers,
                    nfs2::VERSION,
                    xdr::nfs4::VERSION
                );
                xdr::rpc::prog_mismatch_reply_message(xid, nfs2::VERSION, xdr::nfs4::VERSION)
                    .serialize(output)?;
            }
        },
        portmap::PROGRAM => nfs::portmap::handle_portmap(xid, &call, input, output, context)?,
        mount::PROGRAM => nfs::mount::handle_mount(xid, &call, input, output, context).await?,
        NFS_ACL_PROGRAM | NFS_ID_MAP_PROGRAM | NFS_METADATA_PROGRAM | NFS_LOCALIO_PROGRAM => {
            trace!("ignoring auxiliary NFS program {}", call.prog);
            xdr::rpc::prog_unavail_reply_message(xid).serialize(output)?;
        }
        unknown => {
            warn!("unknown RPC program number {}", unknown);
            xdr::rpc::prog_unavail_reply_message(xid).serialize(output)?;
        }
    }

    context.transaction_tracker.mark_processed(xid, &context.client_addr);
    Ok(true)
}
