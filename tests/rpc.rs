//! RPC layer tests: record-mark framing, header validation, dispatch
//! errors and duplicate-request suppression.

mod support;

use std::io::Cursor;

use simple_nfsd::protocol::rpc::{self, read_record};
use simple_nfsd::xdr::rpc::{
    accept_body, auth_stat, call_body, opaque_auth, rejected_reply, rpc_body, rpc_msg,
};
use simple_nfsd::xdr::{deserialize, serialize_to_vec};

use support::{accept_state, auth_none, call, call_with_xid, denied_body, harness, next_xid};

#[tokio::test]
async fn record_reassembles_across_fragments() {
    // "hello world" split into two fragments, final bit on the second
    let mut wire = Vec::new();
    wire.extend_from_slice(&6u32.to_be_bytes());
    wire.extend_from_slice(b"hello ");
    wire.extend_from_slice(&(5u32 | (1 << 31)).to_be_bytes());
    wire.extend_from_slice(b"world");

    let mut reader = Cursor::new(wire);
    let record = read_record(&mut reader).await.unwrap();
    assert_eq!(record, b"hello world");
}

#[tokio::test]
async fn write_fragment_sets_final_bit() {
    let mut wire = Vec::new();
    rpc::write_fragment(&mut wire, b"abcd").await.unwrap();
    assert_eq!(&wire[..4], &(4u32 | (1 << 31)).to_be_bytes());
    assert_eq!(&wire[4..], b"abcd");
}

#[tokio::test]
async fn rpc_version_mismatch_is_denied() {
    let mut h = harness("rw");
    let xid = next_xid();
    let msg = rpc_msg {
        xid,
        body: rpc_body::CALL(call_body {
            rpcvers: 3,
            prog: 100003,
            vers: 3,
            proc: 0,
            cred: opaque_auth::default(),
            verf: opaque_auth::default(),
        }),
    };
    let request = serialize_to_vec(&msg).unwrap();
    let mut input = Cursor::new(request);
    let mut output = Cursor::new(Vec::new());
    assert!(rpc::handle_rpc(&mut input, &mut output, &mut h.context).await.unwrap());

    match denied_body(xid, &output.into_inner()) {
        rejected_reply::RPC_MISMATCH(info) => {
            assert_eq!(info.low, 2);
            assert_eq!(info.high, 2);
        }
        other => panic!("expected RPC_MISMATCH, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_program_is_prog_unavail() {
    let mut h = harness("rw");
    let (xid, reply) = call(&mut h.context, 300999, 1, 0, auth_none(), &[]).await;
    assert!(matches!(accept_state(xid, &reply), accept_body::PROG_UNAVAIL));
}

#[tokio::test]
async fn unsupported_nfs_version_reports_range() {
    let mut h = harness("rw");
    let (xid, reply) = call(&mut h.context, 100003, 7, 0, auth_none(), &[]).await;
    match accept_state(xid, &reply) {
        accept_body::PROG_MISMATCH(info) => {
            assert_eq!(info.low, 2);
            assert_eq!(info.high, 4);
        }
        other => panic!("expected PROG_MISMATCH, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_procedure_is_proc_unavail() {
    let mut h = harness("rw");
    let (xid, reply) = call(&mut h.context, 100003, 3, 99, auth_none(), &[]).await;
    assert!(matches!(accept_state(xid, &reply), accept_body::PROC_UNAVAIL));
}

#[tokio::test]
async fn truncated_arguments_are_garbage_args() {
    let mut h = harness("rw");
    // GETATTR with a truncated handle: length prefix promises 64 bytes
    let args = 64u32.to_be_bytes();
    let (xid, reply) = call(&mut h.context, 100003, 3, 1, auth_none(), &args).await;
    assert!(matches!(accept_state(xid, &reply), accept_body::GARBAGE_ARGS));
}

#[tokio::test]
async fn disabled_flavor_is_auth_error() {
    let mut h = support::harness_with("rw", |config| {
        config.security_mode = vec!["sys".to_string()];
    });
    let (xid, reply) = call(&mut h.context, 100003, 3, 0, auth_none(), &[]).await;
    match denied_body(xid, &reply) {
        rejected_reply::AUTH_ERROR(stat) => assert_eq!(stat, auth_stat::AUTH_TOOWEAK),
        other => panic!("expected AUTH_ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn retransmission_produces_no_second_reply() {
    let mut h = harness("rw");
    let xid = next_xid();
    let first = call_with_xid(&mut h.context, xid, 100003, 3, 0, auth_none(), &[]).await;
    assert!(!first.is_empty());
    let second = call_with_xid(&mut h.context, xid, 100003, 3, 0, auth_none(), &[]).await;
    assert!(second.is_empty(), "retransmitted call must be suppressed");
}

#[tokio::test]
async fn null_ping_reply_is_byte_exact() {
    // spec scenario: NFSv3 NULL ping echoes the xid with SUCCESS
    let mut h = harness("rw");
    let xid = 0x11110000;
    let reply = call_with_xid(&mut h.context, xid, 100003, 3, 0, auth_none(), &[]).await;
    let expected = [
        0x11, 0x11, 0x00, 0x00, // xid
        0, 0, 0, 1, // REPLY
        0, 0, 0, 0, // MSG_ACCEPTED
        0, 0, 0, 0, // verf flavor AUTH_NONE
        0, 0, 0, 0, // verf length 0
        0, 0, 0, 0, // SUCCESS
    ];
    assert_eq!(reply, expected);
}

#[tokio::test]
async fn reply_instead_of_call_is_fatal() {
    let mut h = harness("rw");
    let msg = simple_nfsd::xdr::rpc::make_success_reply(1);
    let request = serialize_to_vec(&msg).unwrap();
    let mut input = Cursor::new(request);
    let mut output = Cursor::new(Vec::new());
    assert!(rpc::handle_rpc(&mut input, &mut output, &mut h.context).await.is_err());
}

#[tokio::test]
async fn oversized_record_is_refused() {
    // record mark advertising more than the record ceiling
    let header = ((rpc::MAX_RPC_RECORD_LENGTH as u32 + 1) | (1 << 31)).to_be_bytes();
    let mut reader = Cursor::new(header.to_vec());
    assert!(read_record(&mut reader).await.is_err());
}

#[tokio::test]
async fn xid_is_echoed_for_every_accepted_call() {
    let mut h = harness("rw");
    for _ in 0..4 {
        let (xid, reply) = call(&mut h.context, 100003, 3, 0, auth_none(), &[]).await;
        let mut cursor = Cursor::new(reply.as_slice());
        let msg = deserialize::<rpc_msg>(&mut cursor).unwrap();
        assert_eq!(msg.xid, xid);
    }
}
