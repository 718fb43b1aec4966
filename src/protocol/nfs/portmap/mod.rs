//! PORTMAP protocol (RFC 1833) service and procedure handlers.
//!
//! The registry maps `(program, version, protocol)` triples to ports.
//! The NFS server registers its own programs here at startup; other RPC
//! services on the host may SET/UNSET their own mappings through the wire
//! interface.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::protocol::rpc::Context;
use crate::protocol::xdr::portmap::{mapping, PortmapProcedure, PROGRAM, VERSION};
use crate::protocol::xdr::{self, Serialize};

mod callit;
mod dump;
mod get_port;
mod null;
mod set_port;
mod unset_port;

use callit::pmapproc_callit;
use dump::pmapproc_dump;
use get_port::pmapproc_getport;
use null::pmapproc_null;
use set_port::pmapproc_set;
use unset_port::pmapproc_unset;

/// Default ceiling on registry size.
pub const DEFAULT_MAX_MAPPINGS: usize = 1000;

/// One registered mapping.
#[derive(Clone, Debug)]
pub struct PortmapRecord {
    pub port: u16,
    /// Identity of the registrant; SET conflicts are judged against it
    pub owner: String,
    /// Registration time, used by idle pruning
    pub registered_at: Instant,
}

/// The in-memory portmap registry.
pub struct PortmapService {
    mappings: Mutex<HashMap<(u32, u32, u32), PortmapRecord>>,
    max_mappings: usize,
}

impl Default for PortmapService {
    fn default() -> PortmapService {
        PortmapService::new(DEFAULT_MAX_MAPPINGS)
    }
}

impl PortmapService {
    pub fn new(max_mappings: usize) -> PortmapService {
        PortmapService { mappings: Mutex::new(HashMap::new()), max_mappings }
    }

    /// Inserts a mapping. Fails when the registry is full, or when the
    /// key is held at a different port by a different owner. Re-SET by
    /// the same owner replaces the port.
    pub fn set(&self, map: &mapping, owner: &str) -> bool {
        if map.port > u16::MAX as u32 {
            return false;
        }
        let key = (map.prog, map.vers, map.prot);
        let mut mappings = self.mappings.lock().unwrap();
        if let Some(existing) = mappings.get(&key) {
            if existing.port as u32 != map.port && existing.owner != owner {
                return false;
            }
        } else if mappings.len() >= self.max_mappings {
            warn!("portmap registry full ({} mappings)", self.max_mappings);
            return false;
        }
        mappings.insert(
            key,
            PortmapRecord {
                port: map.port as u16,
                owner: owner.to_string(),
                registered_at: Instant::now(),
            },
        );
        true
    }

    /// Removes every mapping of `(prog, vers)` regardless of protocol.
    /// True when at least one mapping was removed.
    pub fn unset(&self, prog: u32, vers: u32) -> bool {
        let mut mappings = self.mappings.lock().unwrap();
        let before = mappings.len();
        mappings.retain(|(p, v, _), _| !(*p == prog && *v == vers));
        mappings.len() != before
    }

    /// The port registered for the triple, or 0.
    pub fn getport(&self, prog: u32, vers: u32, prot: u32) -> u16 {
        self.mappings
            .lock()
            .unwrap()
            .get(&(prog, vers, prot))
            .map(|r| r.port)
            .unwrap_or(0)
    }

    /// Every mapping, in unspecified order.
    pub fn dump(&self) -> Vec<mapping> {
        self.mappings
            .lock()
            .unwrap()
            .iter()
            .map(|((prog, vers, prot), record)| mapping {
                prog: *prog,
                vers: *vers,
                prot: *prot,
                port: record.port as u32,
            })
            .collect()
    }

    /// Removes mappings idle for longer than `max_idle`; returns how many
    /// were pruned.
    pub fn prune(&self, max_idle: Duration) -> usize {
        let mut mappings = self.mappings.lock().unwrap();
        let before = mappings.len();
        mappings.retain(|_, record| record.registered_at.elapsed() <= max_idle);
        before - mappings.len()
    }

    pub fn len(&self) -> usize {
        self.mappings.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Main handler for the PORTMAP protocol.
pub fn handle_portmap(
    xid: u32,
    call: &xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    if call.vers != VERSION {
        warn!("invalid portmap version {} != {}", call.vers, VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, VERSION, VERSION).serialize(output)?;
        return Ok(());
    }
    debug_assert_eq!(call.prog, PROGRAM);
    let proc = PortmapProcedure::from_u32(call.proc).unwrap_or(PortmapProcedure::INVALID);

    match proc {
        PortmapProcedure::PMAPPROC_NULL => pmapproc_null(xid, output)?,
        PortmapProcedure::PMAPPROC_SET => pmapproc_set(xid, input, output, context)?,
        PortmapProcedure::PMAPPROC_UNSET => pmapproc_unset(xid, input, output, context)?,
        PortmapProcedure::PMAPPROC_GETPORT => pmapproc_getport(xid, input, output, context)?,
        PortmapProcedure::PMAPPROC_DUMP => pmapproc_dump(xid, output, context)?,
        PortmapProcedure::PMAPPROC_CALLIT => pmapproc_callit(xid, input, output, context)?,
        PortmapProcedure::INVALID => {
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::xdr::portmap::{IPPROTO_TCP, IPPROTO_UDP};

    fn nfs_tcp(port: u32) -> mapping {
        mapping { prog: 100003, vers: 3, prot: IPPROTO_TCP, port }
    }

    #[test]
    fn set_then_getport() {
        let service = PortmapService::default();
        assert_eq!(service.getport(100003, 3, IPPROTO_TCP), 0);
        assert!(service.set(&nfs_tcp(2049), "simple-nfsd"));
        assert_eq!(service.getport(100003, 3, IPPROTO_TCP), 2049);
        // the other protocol stays unregistered
        assert_eq!(service.getport(100003, 3, IPPROTO_UDP), 0);
    }

    #[test]
    fn set_conflict_rules() {
        let service = PortmapService::default();
        assert!(service.set(&nfs_tcp(2049), "simple-nfsd"));
        // same key, different port, different owner: refused
        assert!(!service.set(&nfs_tcp(3049), "intruder"));
        assert_eq!(service.getport(100003, 3, IPPROTO_TCP), 2049);
        // same owner may move the port
        assert!(service.set(&nfs_tcp(3049), "simple-nfsd"));
        assert_eq!(service.getport(100003, 3, IPPROTO_TCP), 3049);
        // identical re-registration is idempotent
        assert!(service.set(&nfs_tcp(3049), "other"));
    }

    #[test]
    fn unset_removes_both_protocols() {
        let service = PortmapService::default();
        assert!(service.set(&nfs_tcp(2049), "simple-nfsd"));
        assert!(service.set(
            &mapping { prog: 100003, vers: 3, prot: IPPROTO_UDP, port: 2049 },
            "simple-nfsd"
        ));
        assert!(!service.unset(100003, 4));
        assert!(service.unset(100003, 3));
        assert_eq!(service.getport(100003, 3, IPPROTO_TCP), 0);
        assert_eq!(service.getport(100003, 3, IPPROTO_UDP), 0);
        assert!(!service.unset(100003, 3));
    }

    #[test]
    fn capacity_is_bounded() {
        let service = PortmapService::new(2);
        assert!(service.set(&mapping { prog: 1, vers: 1, prot: 6, port: 1001 }, "a"));
        assert!(service.set(&mapping { prog: 2, vers: 1, prot: 6, port: 1002 }, "a"));
        assert!(!service.set(&mapping { prog: 3, vers: 1, prot: 6, port: 1003 }, "a"));
        // replacing an existing key still works at capacity
        assert!(service.set(&mapping { prog: 2, vers: 1, prot: 6, port: 1004 }, "a"));
    }

    #[test]
    fn prune_drops_idle_records() {
        let service = PortmapService::default();
        assert!(service.set(&nfs_tcp(2049), "simple-nfsd"));
        assert_eq!(service.prune(Duration::from_secs(3600)), 0);
        assert_eq!(service.prune(Duration::ZERO), 1);
        assert!(service.is_empty());
    }
}
