//! UDP transport: one datagram carries exactly one RPC record, with no
//! record marking. Replies are sent as their handlers complete; clients
//! multiplex by xid. Datagrams below the minimum CALL header size are
//! dropped silently, and a reply that cannot fit one datagram is
//! discarded rather than truncated.

use std::io::Cursor;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::protocol::rpc::{self, Context, Transport};

/// Ceiling on a UDP datagram, payload included.
pub const MAX_DATAGRAM: usize = 65535;

/// Smallest well-formed CALL: xid, type, rpcvers, prog, vers, proc plus
/// two empty opaque_auth fields.
const MIN_CALL_SIZE: usize = 40;

/// Receives datagrams until shutdown is signaled.
pub(crate) async fn serve(
    socket: UdpSocket,
    base: Context,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let local_port = socket.local_addr()?.port();
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_DATAGRAM];
    info!("UDP listener on {}", socket.local_addr()?);

    loop {
        let received = tokio::select! {
            _ = shutdown.changed() => {
                info!("UDP listener on port {} shutting down", local_port);
                return Ok(());
            }
            received = socket.recv_from(&mut buf) => received,
        };
        let (len, peer) = match received {
            Ok(received) => received,
            Err(e) => {
                warn!("UDP receive failure: {}", e);
                continue;
            }
        };
        if len < MIN_CALL_SIZE {
            debug!("dropping {}-byte runt datagram from {}", len, peer);
            continue;
        }

        let datagram = buf[..len].to_vec();
        let mut context = base.clone();
        context.client_addr = peer;
        context.transport = Transport::Udp;
        context.local_port = local_port;
        let socket = socket.clone();

        tokio::spawn(async move {
            let mut input = Cursor::new(datagram);
            let mut output = Cursor::new(Vec::new());
            match rpc::handle_rpc(&mut input, &mut output, &mut context).await {
                Ok(true) => {
                    let reply = output.into_inner();
                    if reply.len() > MAX_DATAGRAM {
                        warn!(
                            "dropping {}-byte reply to {}: exceeds datagram limit",
                            reply.len(),
                            peer
                        );
                        return;
                    }
                    if let Err(e) = socket.send_to(&reply, peer).await {
                        debug!("UDP send to {} failed: {}", peer, e);
                    }
                }
                // retransmission: at most one reply per call
                Ok(false) => {}
                Err(e) => debug!("dropping malformed datagram from {}: {:?}", peer, e),
            }
        });
    }
}
