//! TCP transport: the accept loop and the per-connection read loop.
//!
//! Each accepted connection gets its own task and its own clone of the
//! RPC context. Records are processed sequentially per connection, which
//! gives the required property for free: replies leave in the order
//! their calls arrived. A connection idle for longer than the configured
//! timeout is closed; the accept loop is bounded by a semaphore sized to
//! `max_connections`.

use std::io::Cursor;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::protocol::rpc::{self, Context, Transport};

/// Accepts connections until shutdown is signaled.
pub(crate) async fn serve(
    listener: TcpListener,
    base: Context,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let local_port = listener.local_addr()?.port();
    let connection_limit = Arc::new(Semaphore::new(base.config.max_connections));
    info!("TCP listener on {}", listener.local_addr()?);

    loop {
        let accepted = tokio::select! {
            _ = shutdown.changed() => {
                info!("TCP listener on port {} shutting down", local_port);
                return Ok(());
            }
            accepted = listener.accept() => accepted,
        };
        let (socket, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("accept failure: {}", e);
                continue;
            }
        };
        let Ok(permit) = connection_limit.clone().try_acquire_owned() else {
            warn!("connection limit reached, refusing {}", peer);
            continue;
        };

        let mut context = base.clone();
        context.client_addr = peer;
        context.transport = Transport::Tcp;
        context.local_port = local_port;
        context.stats.record_connection();
        info!("accepting connection from {}", peer);

        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = process_socket(socket, context, shutdown).await {
                debug!("connection from {} closed: {:?}", peer, e);
            }
        });
    }
}

/// Serves one connection: read a record, handle it, write the reply,
/// repeat until the peer hangs up, the idle timeout fires or shutdown is
/// signaled.
async fn process_socket(
    mut socket: TcpStream,
    mut context: Context,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    let _ = socket.set_nodelay(true);
    let idle = Duration::from_secs(context.config.idle_timeout.max(1));

    loop {
        let record = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            record = timeout(idle, rpc::read_record(&mut socket)) => match record {
                Err(_) => {
                    debug!("closing idle connection from {}", context.client_addr);
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok(record)) => record,
            },
        };

        let mut input = Cursor::new(record);
        let mut output = Cursor::new(Vec::new());
        if rpc::handle_rpc(&mut input, &mut output, &mut context).await? {
            rpc::write_fragment(&mut socket, &output.into_inner()).await?;
        }
    }
}
