//! The server facade: builds the component graph from a
//! [`ServerConfig`], owns the lifecycle of the listeners, registers the
//! portmap bootstrap mappings and exposes statistics.
//!
//! The facade binds four sockets: NFS and portmapper, each on TCP and
//! UDP. All four feed the same [`crate::protocol::rpc::handle_rpc`]
//! dispatcher through per-transport loops. Shutdown is graceful in the
//! listener sense: accepting stops immediately and connection tasks exit
//! at their next loop turn.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{AttrCache, ContentCache, CONTENT_TTL};
use crate::config::ServerConfig;
use crate::exports::{ExportTable, HostResolver, SystemResolver};
use crate::handle::FileHandleTable;
use crate::protocol::nfs::mount::MountTable;
use crate::protocol::nfs::portmap::PortmapService;
use crate::protocol::rpc::{Authenticator, Context, Principal, Transport, TransactionTracker};
use crate::protocol::xdr::portmap::{IPPROTO_TCP, IPPROTO_UDP};
use crate::protocol::xdr::{mount, nfs2, nfs3, nfs4, portmap};
use crate::quota::QuotaTable;
use crate::vfs::{LocalFs, Vfs};

/// Owner string used for the server's own portmap registrations.
const BOOTSTRAP_OWNER: &str = "simple-nfsd";

/// How long completed transactions are remembered for duplicate
/// detection.
const TRANSACTION_RETENTION: Duration = Duration::from_secs(60);

/// Atomic statistics counters, updated lock-free by every handler.
#[derive(Debug, Default)]
pub struct ServerStats {
    total_calls: AtomicU64,
    nfs_calls: AtomicU64,
    mount_calls: AtomicU64,
    portmap_calls: AtomicU64,
    other_calls: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    connections: AtomicU64,
}

impl ServerStats {
    pub fn record_call(&self, prog: u32) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let counter = match prog {
            nfs3::PROGRAM => &self.nfs_calls,
            mount::PROGRAM => &self.mount_calls,
            portmap::PROGRAM => &self.portmap_calls,
            _ => &self.other_calls,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// A point-in-time reading of every counter, each read exactly once.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub nfs_calls: u64,
    pub mount_calls: u64,
    pub portmap_calls: u64,
    pub other_calls: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub connections: u64,
    pub auth_accepted: u64,
    pub auth_rejected: u64,
}

/// The assembled NFS server.
pub struct NfsServer {
    config: Arc<ServerConfig>,
    vfs: Arc<dyn Vfs>,
    handles: Arc<FileHandleTable>,
    exports: Arc<RwLock<ExportTable>>,
    attr_cache: Arc<AttrCache>,
    content_cache: Arc<ContentCache>,
    quota: Arc<QuotaTable>,
    auth: Arc<Authenticator>,
    stats: Arc<ServerStats>,
    portmap: Arc<PortmapService>,
    mounts: Arc<MountTable>,
    transaction_tracker: Arc<TransactionTracker>,
    write_verifier: [u8; 8],
    mount_signal: Option<mpsc::Sender<bool>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
}

impl NfsServer {
    /// Builds a server over the local filesystem with the system name
    /// resolver.
    pub fn new(config: ServerConfig) -> NfsServer {
        NfsServer::with_parts(config, Arc::new(LocalFs::new()), Arc::new(SystemResolver))
    }

    /// Builds a server with a custom filesystem adapter and resolver;
    /// the seam the integration tests use.
    pub fn with_parts(
        config: ServerConfig,
        vfs: Arc<dyn Vfs>,
        resolver: Arc<dyn HostResolver>,
    ) -> NfsServer {
        let mut exports = ExportTable::new(resolver);
        for export in config.effective_exports() {
            exports.add(export);
        }

        let (attr_cache, content_cache) = if config.cache_enabled {
            (
                AttrCache::new(config.cache_size, Duration::from_secs(config.cache_ttl)),
                ContentCache::new(config.cache_size, CONTENT_TTL),
            )
        } else {
            (AttrCache::disabled(), ContentCache::disabled())
        };

        let auth = Authenticator::from_config(&config);
        let portmap = PortmapService::new(config.portmap_max_mappings);
        let (shutdown, _) = watch::channel(false);

        NfsServer {
            auth: Arc::new(auth),
            config: Arc::new(config),
            vfs,
            handles: Arc::new(FileHandleTable::new()),
            exports: Arc::new(RwLock::new(exports)),
            attr_cache: Arc::new(attr_cache),
            content_cache: Arc::new(content_cache),
            quota: Arc::new(QuotaTable::new()),
            stats: Arc::new(ServerStats::default()),
            portmap: Arc::new(portmap),
            mounts: Arc::new(MountTable::default()),
            transaction_tracker: Arc::new(TransactionTracker::new(TRANSACTION_RETENTION)),
            write_verifier: generate_write_verifier(),
            mount_signal: None,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Registers a channel observing MNT (true) and UMNT (false) events.
    pub fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>) {
        self.mount_signal = Some(signal);
    }

    /// The in-memory quota table, for operator tooling.
    pub fn quota(&self) -> Arc<QuotaTable> {
        self.quota.clone()
    }

    /// The portmap registry, for operator tooling and tests.
    pub fn portmap(&self) -> Arc<PortmapService> {
        self.portmap.clone()
    }

    /// The 8-byte server instance id echoed by WRITE and COMMIT.
    pub fn write_verifier(&self) -> [u8; 8] {
        self.write_verifier
    }

    /// A context template for one transport endpoint. The client address
    /// is a placeholder the transport overwrites per connection or
    /// datagram.
    pub fn base_context(&self, local_port: u16, transport: Transport) -> Context {
        Context {
            local_port,
            client_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            transport,
            principal: Principal::default(),
            config: self.config.clone(),
            vfs: self.vfs.clone(),
            handles: self.handles.clone(),
            exports: self.exports.clone(),
            attr_cache: self.attr_cache.clone(),
            content_cache: self.content_cache.clone(),
            quota: self.quota.clone(),
            auth: self.auth.clone(),
            stats: self.stats.clone(),
            write_verifier: self.write_verifier,
            transaction_tracker: self.transaction_tracker.clone(),
            portmap: self.portmap.clone(),
            mounts: self.mounts.clone(),
            mount_signal: self.mount_signal.clone(),
        }
    }

    /// Publishes the server's own programs in the portmap registry:
    /// NFS versions 2 through 4 and MOUNT version 3 on the NFS port,
    /// and the portmapper itself on its own port, each for TCP and UDP.
    pub fn register_bootstrap(&self) {
        let nfs_port = self.config.listen_port as u32;
        let pm_port = self.config.portmap_port as u32;
        for prot in [IPPROTO_TCP, IPPROTO_UDP] {
            for vers in [nfs2::VERSION, nfs3::VERSION, nfs4::VERSION] {
                self.portmap.set(
                    &portmap::mapping { prog: nfs3::PROGRAM, vers, prot, port: nfs_port },
                    BOOTSTRAP_OWNER,
                );
            }
            self.portmap.set(
                &portmap::mapping {
                    prog: mount::PROGRAM,
                    vers: mount::VERSION,
                    prot,
                    port: nfs_port,
                },
                BOOTSTRAP_OWNER,
            );
            self.portmap.set(
                &portmap::mapping {
                    prog: portmap::PROGRAM,
                    vers: portmap::VERSION,
                    prot,
                    port: pm_port,
                },
                BOOTSTRAP_OWNER,
            );
        }
    }

    /// Binds the four listening sockets, registers the bootstrap
    /// mappings and spawns the transport loops.
    pub async fn start(&mut self) -> std::io::Result<()> {
        let address = &self.config.listen_address;
        let nfs_addr = format!("{}:{}", address, self.config.listen_port);
        let pm_addr = format!("{}:{}", address, self.config.portmap_port);

        let nfs_tcp = tokio::net::TcpListener::bind(&nfs_addr).await?;
        let nfs_udp = tokio::net::UdpSocket::bind(&nfs_addr).await?;
        let pm_tcp = tokio::net::TcpListener::bind(&pm_addr).await?;
        let pm_udp = tokio::net::UdpSocket::bind(&pm_addr).await?;

        self.register_bootstrap();
        info!(
            "serving NFS on {} and portmap on {} ({} exports)",
            nfs_addr,
            pm_addr,
            self.exports.read().unwrap().exports().len()
        );

        let nfs_port = nfs_tcp.local_addr()?.port();
        let pm_port = pm_tcp.local_addr()?.port();
        self.tasks.push(tokio::spawn(crate::tcp::serve(
            nfs_tcp,
            self.base_context(nfs_port, Transport::Tcp),
            self.shutdown.subscribe(),
        )));
        self.tasks.push(tokio::spawn(crate::udp::serve(
            nfs_udp,
            self.base_context(nfs_port, Transport::Udp),
            self.shutdown.subscribe(),
        )));
        self.tasks.push(tokio::spawn(crate::tcp::serve(
            pm_tcp,
            self.base_context(pm_port, Transport::Tcp),
            self.shutdown.subscribe(),
        )));
        self.tasks.push(tokio::spawn(crate::udp::serve(
            pm_udp,
            self.base_context(pm_port, Transport::Udp),
            self.shutdown.subscribe(),
        )));
        Ok(())
    }

    /// Signals shutdown and waits for the listener tasks to drain.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for outcome in futures::future::join_all(self.tasks.drain(..)).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("listener ended with error: {}", e),
                Err(e) => warn!("listener task panicked: {}", e),
            }
        }
        info!("server stopped");
    }

    /// Reads every statistics counter once.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_calls: self.stats.total_calls.load(Ordering::Relaxed),
            nfs_calls: self.stats.nfs_calls.load(Ordering::Relaxed),
            mount_calls: self.stats.mount_calls.load(Ordering::Relaxed),
            portmap_calls: self.stats.portmap_calls.load(Ordering::Relaxed),
            other_calls: self.stats.other_calls.load(Ordering::Relaxed),
            bytes_read: self.stats.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.stats.bytes_written.load(Ordering::Relaxed),
            connections: self.stats.connections.load(Ordering::Relaxed),
            auth_accepted: self.auth.counters.accepted.load(Ordering::Relaxed),
            auth_rejected: self.auth.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

/// The write verifier is any 8 bytes unique to this server instance;
/// wall-clock nanoseconds mixed with the pid are unique enough that two
/// instances can never be confused by a client.
fn generate_write_verifier() -> [u8; 8] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    (nanos ^ (std::process::id() as u64).rotate_left(32)).to_be_bytes()
}
