//! The export table and access gate.
//!
//! Every procedure that touches the filesystem funnels through
//! [`ExportTable::check`], which walks the checks in a fixed order: path
//! canonicalization, export selection by longest prefix, client matching,
//! the `secure` source-port rule, the optional subtree check, the
//! read-only rule and finally per-file permissions (an ACL entry when one
//! exists, Unix mode bits otherwise). A positive outcome carries the
//! ACCESS bit mask the v3/v4 ACCESS procedures echo back.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::protocol::xdr::nfs3::{
    ACCESS3_DELETE, ACCESS3_EXECUTE, ACCESS3_EXTEND, ACCESS3_LOOKUP, ACCESS3_MODIFY, ACCESS3_READ,
};
use crate::protocol::rpc::auth::Principal;
use crate::vfs::FileInfo;

/// Default anonymous uid/gid applied by squash rules.
pub const ANON_UID: u32 = 65534;
pub const ANON_GID: u32 = 65534;

/// Per-export option set, the parsed form of an exports(5)-style option
/// list such as `rw,sync,root_squash,anonuid=99`.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// `rw` / `ro`: whether write operations are allowed
    pub read_write: bool,
    /// `sync` / `async`: fsync on every WRITE vs. defer until COMMIT
    pub sync_writes: bool,
    /// `root_squash`: map uid 0 / gid 0 to the anonymous identity
    pub root_squash: bool,
    /// `all_squash`: map every principal to the anonymous identity
    pub all_squash: bool,
    /// `subtree_check`: verify every ancestor up to the export root
    pub subtree_check: bool,
    /// `secure`: require client source ports below 1024
    pub secure: bool,
    /// `anonuid=N`
    pub anon_uid: u32,
    /// `anongid=N`
    pub anon_gid: u32,
}

impl Default for ExportOptions {
    fn default() -> ExportOptions {
        ExportOptions {
            read_write: false,
            sync_writes: true,
            root_squash: true,
            all_squash: false,
            subtree_check: false,
            secure: false,
            anon_uid: ANON_UID,
            anon_gid: ANON_GID,
        }
    }
}

impl ExportOptions {
    /// Parses a comma-separated option list. Unknown options are logged
    /// and skipped rather than refused, as exports(5) tooling does.
    pub fn parse(options: &str) -> ExportOptions {
        let mut parsed = ExportOptions::default();
        for opt in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            match opt {
                "rw" => parsed.read_write = true,
                "ro" => parsed.read_write = false,
                "sync" => parsed.sync_writes = true,
                "async" => parsed.sync_writes = false,
                "root_squash" => parsed.root_squash = true,
                "no_root_squash" => parsed.root_squash = false,
                "all_squash" => parsed.all_squash = true,
                "no_all_squash" => parsed.all_squash = false,
                "subtree_check" => parsed.subtree_check = true,
                "no_subtree_check" => parsed.subtree_check = false,
                "secure" => parsed.secure = true,
                "insecure" => parsed.secure = false,
                other => {
                    if let Some(value) = other.strip_prefix("anonuid=") {
                        match value.parse() {
                            Ok(uid) => parsed.anon_uid = uid,
                            Err(_) => warn!("ignoring bad anonuid in export options: {other}"),
                        }
                    } else if let Some(value) = other.strip_prefix("anongid=") {
                        match value.parse() {
                            Ok(gid) => parsed.anon_gid = gid,
                            Err(_) => warn!("ignoring bad anongid in export options: {other}"),
                        }
                    } else {
                        warn!("ignoring unknown export option: {other}");
                    }
                }
            }
        }
        parsed
    }
}

/// Resolves hostnames for client specs. Forward resolution serves literal
/// hostname specs; reverse resolution serves hostname globs. A resolver
/// that cannot answer returns an empty result and the spec fails closed.
pub trait HostResolver: Send + Sync {
    /// Addresses a hostname resolves to, empty when unresolvable.
    fn resolve(&self, host: &str) -> Vec<IpAddr>;

    /// The primary name of an address, `None` when unknown.
    fn reverse(&self, addr: IpAddr) -> Option<String>;
}

/// Resolver backed by the system's name service. Reverse lookups are not
/// portably available without an extra dependency, so globs only match
/// when a custom resolver supplies names.
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        use std::net::ToSocketAddrs;
        match (host, 0u16).to_socket_addrs() {
            Ok(addrs) => addrs.map(|a| a.ip()).collect(),
            Err(e) => {
                debug!("cannot resolve client spec {host:?}: {e}");
                Vec::new()
            }
        }
    }

    fn reverse(&self, _addr: IpAddr) -> Option<String> {
        None
    }
}

/// One entry of an export's client list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientSpec {
    /// `*`: any client
    Any,
    /// A literal IPv4/IPv6 address
    Addr(IpAddr),
    /// A CIDR network such as `10.0.0.0/8`
    Net(IpAddr, u8),
    /// A hostname glob such as `*.example.com`
    HostGlob(String),
    /// A literal hostname, forward-resolved at match time
    Host(String),
}

impl ClientSpec {
    /// Parses the textual form of a client spec.
    pub fn parse(spec: &str) -> ClientSpec {
        let spec = spec.trim();
        if spec == "*" {
            return ClientSpec::Any;
        }
        if let Some((addr, prefix)) = spec.split_once('/') {
            if let (Ok(addr), Ok(prefix)) = (addr.parse::<IpAddr>(), prefix.parse::<u8>()) {
                return ClientSpec::Net(addr, prefix);
            }
        }
        if let Ok(addr) = spec.parse::<IpAddr>() {
            return ClientSpec::Addr(addr);
        }
        if spec.contains('*') || spec.contains('?') {
            return ClientSpec::HostGlob(spec.to_string());
        }
        ClientSpec::Host(spec.to_string())
    }

    /// True when the peer address satisfies this spec.
    pub fn matches(&self, peer: IpAddr, resolver: &dyn HostResolver) -> bool {
        match self {
            ClientSpec::Any => true,
            ClientSpec::Addr(addr) => *addr == peer,
            ClientSpec::Net(net, prefix) => ip_in_net(peer, *net, *prefix),
            ClientSpec::Host(host) => resolver.resolve(host).contains(&peer),
            ClientSpec::HostGlob(pattern) => match resolver.reverse(peer) {
                Some(name) => glob_matches(pattern, &name),
                None => false,
            },
        }
    }
}

/// Prefix comparison of an address against a network.
fn ip_in_net(addr: IpAddr, net: IpAddr, prefix: u8) -> bool {
    fn bits_match(addr: &[u8], net: &[u8], prefix: u8) -> bool {
        let full = (prefix / 8) as usize;
        if full > addr.len() {
            return false;
        }
        if addr[..full] != net[..full] {
            return false;
        }
        let rem = prefix % 8;
        if rem == 0 || full >= addr.len() {
            return true;
        }
        let mask = 0xffu8 << (8 - rem);
        addr[full] & mask == net[full] & mask
    }
    match (addr, net) {
        (IpAddr::V4(a), IpAddr::V4(n)) => bits_match(&a.octets(), &n.octets(), prefix.min(32)),
        (IpAddr::V6(a), IpAddr::V6(n)) => bits_match(&a.octets(), &n.octets(), prefix.min(128)),
        _ => false,
    }
}

/// Case-insensitive glob with `*` and `?`.
fn glob_matches(pattern: &str, name: &str) -> bool {
    fn inner(pattern: &[u8], name: &[u8]) -> bool {
        match (pattern.first(), name.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pattern[1..], name)
                    || (!name.is_empty() && inner(pattern, &name[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&pattern[1..], &name[1..]),
            (Some(p), Some(n)) => {
                p.eq_ignore_ascii_case(n) && inner(&pattern[1..], &name[1..])
            }
            _ => false,
        }
    }
    inner(pattern.as_bytes(), name.as_bytes())
}

/// One exported directory tree.
#[derive(Clone, Debug)]
pub struct Export {
    /// Root of the exported subtree; absolute and normalized
    pub path: PathBuf,
    /// Client specs allowed to use the export
    pub clients: Vec<ClientSpec>,
    /// Parsed option set
    pub options: ExportOptions,
    /// Free-form operator comment
    pub comment: String,
}

/// Why the gate refused an operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GateDenied {
    /// Outside every export, client mismatch, or permissions
    Access,
    /// Write attempted against a read-only export
    ReadOnly,
}

/// A positive gate outcome.
#[derive(Clone, Debug)]
pub struct AccessGrant {
    /// ACCESS3_*/ACCESS4_* bits granted to this principal for the path
    pub bits: u32,
    /// Root of the export that matched
    pub export_root: PathBuf,
    /// Whether the export demands fsync on every write
    pub sync_writes: bool,
    /// Principal uid after export-level squashing
    pub effective_uid: u32,
    /// Principal gid after export-level squashing
    pub effective_gid: u32,
}

/// A per-path ACL override consulted before Unix mode bits. Entries are
/// keyed by path and principal uid and carry ACCESS-style bits.
#[derive(Default)]
pub struct AclTable {
    entries: RwLock<HashMap<(PathBuf, u32), u32>>,
}

impl AclTable {
    pub fn set(&self, path: &Path, uid: u32, bits: u32) {
        self.entries.write().unwrap().insert((path.to_path_buf(), uid), bits);
    }

    pub fn clear(&self, path: &Path, uid: u32) {
        self.entries.write().unwrap().remove(&(path.to_path_buf(), uid));
    }

    fn lookup(&self, path: &Path, uid: u32) -> Option<u32> {
        self.entries.read().unwrap().get(&(path.to_path_buf(), uid)).copied()
    }
}

/// The export table plus everything needed to evaluate the gate.
pub struct ExportTable {
    exports: Vec<Export>,
    resolver: Arc<dyn HostResolver>,
    acls: AclTable,
}

impl ExportTable {
    pub fn new(resolver: Arc<dyn HostResolver>) -> ExportTable {
        ExportTable { exports: Vec::new(), resolver, acls: AclTable::default() }
    }

    /// Adds an export; its path is normalized first. Exports with
    /// relative or traversing paths are refused.
    pub fn add(&mut self, export: Export) -> bool {
        match normalized(&export.path) {
            Some(path) => {
                self.exports.push(Export { path, ..export });
                true
            }
            None => {
                warn!("refusing export with non-normal path {:?}", export.path);
                false
            }
        }
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn acls(&self) -> &AclTable {
        &self.acls
    }

    /// The export whose root is the longest prefix of `path`.
    pub fn export_for_path(&self, path: &Path) -> Option<&Export> {
        self.exports
            .iter()
            .filter(|e| path.starts_with(&e.path))
            .max_by_key(|e| e.path.as_os_str().len())
    }

    /// The export whose root equals `path`, for MNT and friends.
    pub fn export_for_root(&self, path: &Path) -> Option<&Export> {
        self.exports.iter().find(|e| e.path == path)
    }

    /// True when at least one export admits this peer.
    pub fn any_export_admits(&self, peer: IpAddr) -> bool {
        self.exports
            .iter()
            .any(|e| e.clients.iter().any(|c| c.matches(peer, self.resolver.as_ref())))
    }

    /// The access gate. `target` carries the attributes of the object the
    /// operation addresses when it already exists; pass the parent
    /// directory's attributes for create-style operations, or `None` to
    /// skip the per-file permission step for attribute-only calls.
    pub fn check(
        &self,
        path: &Path,
        principal: &Principal,
        peer: SocketAddr,
        want_write: bool,
        target: Option<&FileInfo>,
    ) -> Result<AccessGrant, GateDenied> {
        let (grant, read_write) = self.evaluate(path, principal, peer, target)?;

        if want_write && !read_write {
            return Err(GateDenied::ReadOnly);
        }
        if want_write && grant.bits & (ACCESS3_MODIFY | ACCESS3_EXTEND | ACCESS3_DELETE) == 0 {
            return Err(GateDenied::Access);
        }
        if !want_write && grant.bits & (ACCESS3_READ | ACCESS3_LOOKUP | ACCESS3_EXECUTE) == 0 {
            return Err(GateDenied::Access);
        }
        Ok(grant)
    }

    /// Like [`ExportTable::check`] but without enforcing a requested
    /// access: the ACCESS procedures report whatever bits the caller
    /// holds, even when that is nothing.
    pub fn probe(
        &self,
        path: &Path,
        principal: &Principal,
        peer: SocketAddr,
        target: Option<&FileInfo>,
    ) -> Result<AccessGrant, GateDenied> {
        self.evaluate(path, principal, peer, target).map(|(grant, _)| grant)
    }

    /// Steps 1 through 5 of the gate plus squashing and permission-bit
    /// computation. Returns the grant and whether the export is writable.
    fn evaluate(
        &self,
        path: &Path,
        principal: &Principal,
        peer: SocketAddr,
        target: Option<&FileInfo>,
    ) -> Result<(AccessGrant, bool), GateDenied> {
        // 1. canonicalization: no `..`, no relative paths
        let path = normalized(path).ok_or(GateDenied::Access)?;

        // 2. export selection by longest matching prefix
        let export = self.export_for_path(&path).ok_or(GateDenied::Access)?;

        // 3. client match
        if !export.clients.iter().any(|c| c.matches(peer.ip(), self.resolver.as_ref())) {
            debug!("client {} matches no spec of export {:?}", peer, export.path);
            return Err(GateDenied::Access);
        }

        // 4. secure source port
        if export.options.secure && peer.port() >= 1024 {
            debug!("insecure source port {} refused by export {:?}", peer.port(), export.path);
            return Err(GateDenied::Access);
        }

        // 5. subtree check
        if export.options.subtree_check && !subtree_ok(&path, &export.path) {
            return Err(GateDenied::Access);
        }

        // export-level squash before the permission check
        let (uid, gid) = if export.options.all_squash
            || (export.options.root_squash && principal.uid == 0)
        {
            (export.options.anon_uid, export.options.anon_gid)
        } else {
            (principal.uid, principal.gid)
        };

        // 7. ACL entry first, Unix mode bits otherwise; root bypasses the
        // permission check but nothing above it
        let mut bits = match target {
            Some(info) => match self.acls.lookup(&path, uid) {
                Some(acl_bits) => acl_bits,
                None if uid == 0 => ALL_ACCESS_BITS,
                None => posix_bits(info, uid, gid, &principal.gids),
            },
            None => ALL_ACCESS_BITS,
        };
        if !export.options.read_write {
            bits &= !(ACCESS3_MODIFY | ACCESS3_EXTEND | ACCESS3_DELETE);
        }

        Ok((
            AccessGrant {
                bits,
                export_root: export.path.clone(),
                sync_writes: export.options.sync_writes,
                effective_uid: uid,
                effective_gid: gid,
            },
            export.options.read_write,
        ))
    }
}

const ALL_ACCESS_BITS: u32 = ACCESS3_READ
    | ACCESS3_LOOKUP
    | ACCESS3_MODIFY
    | ACCESS3_EXTEND
    | ACCESS3_DELETE
    | ACCESS3_EXECUTE;

/// ACCESS bits derived from Unix mode bits for the given identity.
fn posix_bits(info: &FileInfo, uid: u32, gid: u32, gids: &[u32]) -> u32 {
    let mode = info.mode;
    let (r, w, x) = if uid == info.uid {
        (mode & 0o400 != 0, mode & 0o200 != 0, mode & 0o100 != 0)
    } else if gid == info.gid || gids.contains(&info.gid) {
        (mode & 0o040 != 0, mode & 0o020 != 0, mode & 0o010 != 0)
    } else {
        (mode & 0o004 != 0, mode & 0o002 != 0, mode & 0o001 != 0)
    };
    let mut bits = 0;
    if r {
        bits |= ACCESS3_READ;
    }
    if w {
        bits |= ACCESS3_MODIFY | ACCESS3_EXTEND | ACCESS3_DELETE;
    }
    if x {
        bits |= ACCESS3_LOOKUP | ACCESS3_EXECUTE;
    }
    bits
}

/// Lexical normalization: absolute, no `.`, refuse `..` outright.
pub fn normalized(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push("/"),
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Walks from the target up to the export root verifying no ancestor is a
/// symbolic link, so a link inside the export cannot smuggle the lookup
/// outside it. The walk is bounded by the component count.
fn subtree_ok(path: &Path, export_root: &Path) -> bool {
    let mut current = path.parent();
    let mut steps = 0u32;
    while let Some(ancestor) = current {
        if steps > 255 {
            return false;
        }
        steps += 1;
        match std::fs::symlink_metadata(ancestor) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                debug!("subtree check: ancestor {:?} is a symlink", ancestor);
                return false;
            }
            Ok(_) => {}
            // a missing ancestor is left for the operation itself to report
            Err(_) => {}
        }
        if ancestor == export_root {
            return true;
        }
        current = ancestor.parent();
    }
    false
}
