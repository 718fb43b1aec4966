//! Portmapper wire tests: SET/UNSET/GETPORT/DUMP/CALLIT through the RPC
//! dispatcher, including the bootstrap scenario.

mod support;

use num_traits::cast::ToPrimitive;

use simple_nfsd::xdr::portmap::{
    call_result, mapping, pmaplist, PortmapProcedure, IPPROTO_TCP, IPPROTO_UDP, PROGRAM, VERSION,
};
use simple_nfsd::xdr::{deserialize, rpc::accept_body};

use support::{accepted_body, accept_state, args_of, auth_none, call, harness};

fn proc_num(proc: PortmapProcedure) -> u32 {
    proc.to_u32().unwrap()
}

async fn wire_set(h: &mut support::Harness, map: mapping) -> bool {
    let (xid, reply) = call(
        &mut h.context,
        PROGRAM,
        VERSION,
        proc_num(PortmapProcedure::PMAPPROC_SET),
        auth_none(),
        &args_of(&map),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    deserialize::<bool>(&mut body).unwrap()
}

async fn wire_getport(h: &mut support::Harness, map: mapping) -> u32 {
    let (xid, reply) = call(
        &mut h.context,
        PROGRAM,
        VERSION,
        proc_num(PortmapProcedure::PMAPPROC_GETPORT),
        auth_none(),
        &args_of(&map),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    deserialize::<u32>(&mut body).unwrap()
}

async fn wire_unset(h: &mut support::Harness, map: mapping) -> bool {
    let (xid, reply) = call(
        &mut h.context,
        PROGRAM,
        VERSION,
        proc_num(PortmapProcedure::PMAPPROC_UNSET),
        auth_none(),
        &args_of(&map),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    deserialize::<bool>(&mut body).unwrap()
}

fn nfs_mapping(vers: u32, prot: u32, port: u32) -> mapping {
    mapping { prog: 100003, vers, prot, port }
}

#[tokio::test]
async fn getport_before_any_set_is_zero() {
    let mut h = harness("rw");
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_TCP, 0)).await, 0);
}

#[tokio::test]
async fn set_then_getport_returns_port() {
    let mut h = harness("rw");
    assert!(wire_set(&mut h, nfs_mapping(3, IPPROTO_TCP, 2049)).await);
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_TCP, 0)).await, 2049);
}

#[tokio::test]
async fn bootstrap_scenario() {
    // only TCP registered: TCP resolves, UDP reads back zero
    let mut h = harness("rw");
    assert!(wire_set(&mut h, nfs_mapping(3, IPPROTO_TCP, 2049)).await);
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_TCP, 0)).await, 2049);
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_UDP, 0)).await, 0);
}

#[tokio::test]
async fn server_bootstrap_registers_every_version() {
    let mut h = harness("rw");
    h.server.register_bootstrap();
    for vers in [2, 3, 4] {
        assert_eq!(wire_getport(&mut h, nfs_mapping(vers, IPPROTO_TCP, 0)).await, 2049);
        assert_eq!(wire_getport(&mut h, nfs_mapping(vers, IPPROTO_UDP, 0)).await, 2049);
    }
    let mount = mapping { prog: 100005, vers: 3, prot: IPPROTO_TCP, port: 0 };
    assert_eq!(wire_getport(&mut h, mount).await, 2049);
}

#[tokio::test]
async fn unset_removes_both_protocols() {
    let mut h = harness("rw");
    assert!(wire_set(&mut h, nfs_mapping(3, IPPROTO_TCP, 2049)).await);
    assert!(wire_set(&mut h, nfs_mapping(3, IPPROTO_UDP, 2049)).await);
    assert!(wire_unset(&mut h, nfs_mapping(3, 0, 0)).await);
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_TCP, 0)).await, 0);
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_UDP, 0)).await, 0);
    // a second unset has nothing to remove
    assert!(!wire_unset(&mut h, nfs_mapping(3, 0, 0)).await);
}

#[tokio::test]
async fn getport_tracks_most_recent_set() {
    let mut h = harness("rw");
    assert!(wire_set(&mut h, nfs_mapping(3, IPPROTO_TCP, 2049)).await);
    // same owner (same client) may move the port
    assert!(wire_set(&mut h, nfs_mapping(3, IPPROTO_TCP, 3049)).await);
    assert_eq!(wire_getport(&mut h, nfs_mapping(3, IPPROTO_TCP, 0)).await, 3049);
}

#[tokio::test]
async fn dump_lists_registered_mappings() {
    let mut h = harness("rw");
    let first = nfs_mapping(3, IPPROTO_TCP, 2049);
    let second = mapping { prog: 100005, vers: 3, prot: IPPROTO_UDP, port: 2049 };
    assert!(wire_set(&mut h, first).await);
    assert!(wire_set(&mut h, second).await);

    let (xid, reply) = call(
        &mut h.context,
        PROGRAM,
        VERSION,
        proc_num(PortmapProcedure::PMAPPROC_DUMP),
        auth_none(),
        &[],
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    let mut node = deserialize::<Option<Box<pmaplist>>>(&mut body).unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = node {
        seen.push(entry.map);
        node = entry.next;
    }
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&first));
    assert!(seen.contains(&second));
}

#[tokio::test]
async fn empty_dump_is_a_bare_terminator() {
    let mut h = harness("rw");
    let (xid, reply) = call(
        &mut h.context,
        PROGRAM,
        VERSION,
        proc_num(PortmapProcedure::PMAPPROC_DUMP),
        auth_none(),
        &[],
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert!(deserialize::<Option<Box<pmaplist>>>(&mut body).unwrap().is_none());
}

#[tokio::test]
async fn callit_is_logged_not_forwarded() {
    let mut h = harness("rw");
    let args = simple_nfsd::xdr::portmap::call_args {
        prog: 100003,
        vers: 3,
        proc: 0,
        args: vec![],
    };
    let (xid, reply) = call(
        &mut h.context,
        PROGRAM,
        VERSION,
        proc_num(PortmapProcedure::PMAPPROC_CALLIT),
        auth_none(),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    let result = deserialize::<call_result>(&mut body).unwrap();
    assert_eq!(result.port, 0);
    assert!(result.res.is_empty());
}

#[tokio::test]
async fn wrong_portmap_version_is_mismatch() {
    let mut h = harness("rw");
    let (xid, reply) = call(&mut h.context, PROGRAM, 3, 0, auth_none(), &[]).await;
    match accept_state(xid, &reply) {
        accept_body::PROG_MISMATCH(info) => {
            assert_eq!(info.low, VERSION);
            assert_eq!(info.high, VERSION);
        }
        other => panic!("expected PROG_MISMATCH, got {other:?}"),
    }
}
