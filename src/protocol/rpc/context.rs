//! The per-connection RPC context: the component graph every procedure
//! handler operates on, plus the identity of the message being served.
//!
//! One context is cloned per TCP connection (and per UDP datagram); all
//! heavyweight members are shared behind `Arc`. The authentication
//! dispatcher refreshes `principal` for every call before the procedure
//! handler runs.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::cache::{AttrCache, ContentCache};
use crate::config::ServerConfig;
use crate::exports::ExportTable;
use crate::handle::FileHandleTable;
use crate::protocol::nfs::mount::MountTable;
use crate::protocol::nfs::portmap::PortmapService;
use crate::protocol::rpc::auth::{Authenticator, Principal};
use crate::quota::QuotaTable;
use crate::server::ServerStats;
use crate::vfs::{FileInfo, Vfs};

/// Which transport carried the current message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// Execution context for RPC operations.
#[derive(Clone)]
pub struct Context {
    /// Port the serving listener is bound to
    pub local_port: u16,

    /// Peer address of the current message
    pub client_addr: SocketAddr,

    /// Transport the current message arrived on
    pub transport: Transport,

    /// Identity of the caller, refreshed per message
    pub principal: Principal,

    /// Server configuration (transfer sizes, cache tuning)
    pub config: Arc<ServerConfig>,

    /// Filesystem adapter
    pub vfs: Arc<dyn Vfs>,

    /// Opaque handle table
    pub handles: Arc<FileHandleTable>,

    /// Export/access gate; writer-rare
    pub exports: Arc<RwLock<ExportTable>>,

    /// Attribute cache with TTL expiry
    pub attr_cache: Arc<AttrCache>,

    /// READ result cache with TTL expiry
    pub content_cache: Arc<ContentCache>,

    /// In-memory quota table consulted by WRITE
    pub quota: Arc<QuotaTable>,

    /// Flavor dispatcher and squash defaults
    pub auth: Arc<Authenticator>,

    /// Atomic statistics counters
    pub stats: Arc<ServerStats>,

    /// 8-byte server instance id returned by WRITE and COMMIT
    pub write_verifier: [u8; 8],

    /// Duplicate-request cache
    pub transaction_tracker: Arc<super::TransactionTracker>,

    /// Portmapper registry
    pub portmap: Arc<PortmapService>,

    /// Clients currently recorded by the MOUNT protocol
    pub mounts: Arc<MountTable>,

    /// Optional mount/unmount notification channel
    pub mount_signal: Option<mpsc::Sender<bool>>,
}

impl Context {
    /// Attributes of `path`, served from the attribute cache when fresh.
    pub async fn stat_cached(&self, path: &Path) -> std::io::Result<FileInfo> {
        if let Some(info) = self.attr_cache.get(path) {
            return Ok(info);
        }
        let info = self.vfs.stat(path).await?;
        self.attr_cache.insert(path, info.clone());
        Ok(info)
    }

    /// Drops cached state for a path after a mutation.
    pub fn invalidate_caches(&self, path: &Path) {
        self.attr_cache.invalidate(path);
        self.content_cache.invalidate(path);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("transport", &self.transport)
            .field("principal", &self.principal)
            .finish()
    }
}
