//! NFSv4 COMPOUND tests: current-filehandle threading, bitmap-driven
//! GETATTR, stateless READ/WRITE, stub session operations and the
//! boundary behaviors of the compound machinery.

mod support;

use std::io::Read;

use simple_nfsd::xdr::nfs4::{
    self, bitmap_contains, bitmap_set, bitmap4, fattr4, nfs_opnum4, nfsstat4, stateid4,
};
use simple_nfsd::xdr::{deserialize, serialize_to_vec, Serialize};

use support::{accepted_body, auth_sys, call, harness, plant_file};

const NFS: u32 = 100003;
const V4: u32 = 4;
const COMPOUND: u32 = 1;

/// Builds the COMPOUND argument stream from pre-encoded operations.
fn compound(minorversion: u32, ops: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    Vec::<u8>::new().serialize(&mut out).unwrap(); // tag
    minorversion.serialize(&mut out).unwrap();
    (ops.len() as u32).serialize(&mut out).unwrap();
    for op in ops {
        out.extend_from_slice(op);
    }
    out
}

fn op(opnum: nfs_opnum4, args: &[u8]) -> Vec<u8> {
    let mut out = serialize_to_vec(&(opnum as u32)).unwrap();
    out.extend_from_slice(args);
    out
}

/// Decodes the compound reply prologue, returning (status, numres).
fn compound_header(body: &mut impl Read) -> (nfsstat4, u32) {
    let status = deserialize::<nfsstat4>(body).unwrap();
    let _tag = deserialize::<Vec<u8>>(body).unwrap();
    let numres = deserialize::<u32>(body).unwrap();
    (status, numres)
}

/// Decodes one resop header, asserting the opnum, returning its status.
fn resop(body: &mut impl Read, expected: nfs_opnum4) -> nfsstat4 {
    let opnum = deserialize::<u32>(body).unwrap();
    assert_eq!(opnum, expected as u32);
    deserialize::<nfsstat4>(body).unwrap()
}

#[tokio::test]
async fn putrootfh_lookup_getfh_read_chain() {
    let mut h = harness("rw");
    plant_file(h.dir.path(), "hello", b"Hello world\n", 0o644);

    let lookup_args = serialize_to_vec(&b"hello".to_vec()).unwrap();
    let mut read_args = serialize_to_vec(&stateid4::default()).unwrap();
    read_args.extend_from_slice(&serialize_to_vec(&0u64).unwrap());
    read_args.extend_from_slice(&serialize_to_vec(&5u32).unwrap());

    let request = compound(
        0,
        &[
            op(nfs_opnum4::OP_PUTROOTFH, &[]),
            op(nfs_opnum4::OP_LOOKUP, &lookup_args),
            op(nfs_opnum4::OP_GETFH, &[]),
            op(nfs_opnum4::OP_READ, &read_args),
        ],
    );
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, numres) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4_OK);
    assert_eq!(numres, 4);

    assert_eq!(resop(&mut body, nfs_opnum4::OP_PUTROOTFH), nfsstat4::NFS4_OK);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_LOOKUP), nfsstat4::NFS4_OK);

    assert_eq!(resop(&mut body, nfs_opnum4::OP_GETFH), nfsstat4::NFS4_OK);
    let fh = deserialize::<Vec<u8>>(&mut body).unwrap();
    assert_eq!(fh, h.context.handles.fh4_for(&h.dir.path().join("hello")));
    assert_eq!(fh.len(), 28);

    assert_eq!(resop(&mut body, nfs_opnum4::OP_READ), nfsstat4::NFS4_OK);
    let eof = deserialize::<bool>(&mut body).unwrap();
    let data = deserialize::<Vec<u8>>(&mut body).unwrap();
    assert!(!eof);
    assert_eq!(data, b"Hello");
}

#[tokio::test]
async fn getattr_always_includes_supported_attrs() {
    let mut h = harness("rw");
    plant_file(h.dir.path(), "f", b"abc", 0o644);

    let mut requested = bitmap4::new();
    bitmap_set(&mut requested, nfs4::FATTR4_SIZE);
    bitmap_set(&mut requested, nfs4::FATTR4_MODE);
    let getattr_args = serialize_to_vec(&requested).unwrap();
    let lookup_args = serialize_to_vec(&b"f".to_vec()).unwrap();

    let request = compound(
        0,
        &[
            op(nfs_opnum4::OP_PUTROOTFH, &[]),
            op(nfs_opnum4::OP_LOOKUP, &lookup_args),
            op(nfs_opnum4::OP_GETATTR, &getattr_args),
        ],
    );
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, _) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4_OK);
    resop(&mut body, nfs_opnum4::OP_PUTROOTFH);
    resop(&mut body, nfs_opnum4::OP_LOOKUP);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_GETATTR), nfsstat4::NFS4_OK);
    let fattr = deserialize::<fattr4>(&mut body).unwrap();
    assert!(bitmap_contains(&fattr.attrmask, nfs4::FATTR4_SUPPORTED_ATTRS));
    assert!(bitmap_contains(&fattr.attrmask, nfs4::FATTR4_SIZE));
    assert!(bitmap_contains(&fattr.attrmask, nfs4::FATTR4_MODE));

    // values are packed in ascending attribute order: the supported
    // bitmap first, then size, then mode
    let mut vals = std::io::Cursor::new(fattr.attr_vals.as_slice());
    let supported = deserialize::<bitmap4>(&mut vals).unwrap();
    assert!(bitmap_contains(&supported, nfs4::FATTR4_TIME_MODIFY));
    let size = deserialize::<u64>(&mut vals).unwrap();
    assert_eq!(size, 3);
    let mode = deserialize::<u32>(&mut vals).unwrap();
    assert_eq!(mode, 0o644);
    assert_eq!(vals.position() as usize, fattr.attr_vals.len());
}

#[tokio::test]
async fn write_and_commit_share_the_instance_verifier() {
    let mut h = harness("rw");
    plant_file(h.dir.path(), "out", b"", 0o666);
    let verifier = h.context.write_verifier;

    let lookup_args = serialize_to_vec(&b"out".to_vec()).unwrap();
    let mut write_args = serialize_to_vec(&stateid4::default()).unwrap();
    write_args.extend_from_slice(&serialize_to_vec(&0u64).unwrap());
    write_args
        .extend_from_slice(&serialize_to_vec(&(nfs4::stable_how4::FILE_SYNC4 as u32)).unwrap());
    write_args.extend_from_slice(&serialize_to_vec(&b"hello".to_vec()).unwrap());

    let request = compound(
        0,
        &[
            op(nfs_opnum4::OP_PUTROOTFH, &[]),
            op(nfs_opnum4::OP_LOOKUP, &lookup_args),
            op(nfs_opnum4::OP_WRITE, &write_args),
        ],
    );
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, _) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4_OK);
    resop(&mut body, nfs_opnum4::OP_PUTROOTFH);
    resop(&mut body, nfs_opnum4::OP_LOOKUP);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_WRITE), nfsstat4::NFS4_OK);
    let count = deserialize::<u32>(&mut body).unwrap();
    let committed = deserialize::<nfs4::stable_how4>(&mut body).unwrap();
    let verf = deserialize::<[u8; 8]>(&mut body).unwrap();
    assert_eq!(count, 5);
    assert_eq!(committed, nfs4::stable_how4::FILE_SYNC4);
    assert_eq!(verf, verifier);
    assert_eq!(std::fs::read(h.dir.path().join("out")).unwrap(), b"hello");
}

#[tokio::test]
async fn zero_length_putfh_handle_is_stale() {
    let mut h = harness("rw");
    let putfh_args = serialize_to_vec(&Vec::<u8>::new()).unwrap();
    let request = compound(0, &[op(nfs_opnum4::OP_PUTFH, &putfh_args)]);
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, numres) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4ERR_STALE);
    assert_eq!(numres, 1);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_PUTFH), nfsstat4::NFS4ERR_STALE);
}

#[tokio::test]
async fn op_without_filehandle_is_nofilehandle() {
    let mut h = harness("rw");
    let getattr_args = serialize_to_vec(&bitmap4::new()).unwrap();
    let request = compound(0, &[op(nfs_opnum4::OP_GETATTR, &getattr_args)]);
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, _) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4ERR_NOFILEHANDLE);
}

#[tokio::test]
async fn unknown_minorversion_is_refused_with_empty_results() {
    let mut h = harness("rw");
    let request = compound(2, &[op(nfs_opnum4::OP_PUTROOTFH, &[])]);
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, numres) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4ERR_MINOR_VERS_MISMATCH);
    assert_eq!(numres, 0);
}

#[tokio::test]
async fn stateful_open_is_notsupp_and_stops_the_compound() {
    let mut h = harness("rw");
    let request = compound(
        0,
        &[
            op(nfs_opnum4::OP_PUTROOTFH, &[]),
            op(nfs_opnum4::OP_OPEN, &[]),
            op(nfs_opnum4::OP_GETFH, &[]),
        ],
    );
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, numres) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4ERR_NOTSUPP);
    // the failing op is included, the one after it is not
    assert_eq!(numres, 2);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_PUTROOTFH), nfsstat4::NFS4_OK);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_OPEN), nfsstat4::NFS4ERR_NOTSUPP);
}

#[tokio::test]
async fn illegal_opnum_is_op_illegal() {
    let mut h = harness("rw");
    let request = compound(0, &[serialize_to_vec(&12345u32).unwrap()]);
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, numres) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4ERR_OP_ILLEGAL);
    assert_eq!(numres, 1);
    let opnum = deserialize::<u32>(&mut body).unwrap();
    assert_eq!(opnum, nfs_opnum4::OP_ILLEGAL as u32);
    assert_eq!(deserialize::<nfsstat4>(&mut body).unwrap(), nfsstat4::NFS4ERR_OP_ILLEGAL);
}

#[tokio::test]
async fn sequence_stub_echoes_slot_coordinates() {
    let mut h = harness("rw");
    let args = nfs4::SEQUENCE4args {
        sa_sessionid: [7; 16],
        sa_sequenceid: 9,
        sa_slotid: 1,
        sa_highest_slotid: 3,
        sa_cachethis: false,
    };
    let request = compound(1, &[op(nfs_opnum4::OP_SEQUENCE, &serialize_to_vec(&args).unwrap())]);
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, _) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4_OK);
    assert_eq!(resop(&mut body, nfs_opnum4::OP_SEQUENCE), nfsstat4::NFS4_OK);
    let resok = deserialize::<nfs4::SEQUENCE4resok>(&mut body).unwrap();
    assert_eq!(resok.sr_sessionid, [7; 16]);
    assert_eq!(resok.sr_sequenceid, 9);
    assert_eq!(resok.sr_slotid, 1);
}

#[tokio::test]
async fn savefh_threads_the_rename_directories() {
    let mut h = harness("rw");
    plant_file(h.dir.path(), "old-name", b"payload", 0o666);

    // PUTROOTFH, SAVEFH, RENAME(old-name -> new-name): source dir is the
    // saved fh, target dir the current one
    let mut rename_args = serialize_to_vec(&b"old-name".to_vec()).unwrap();
    rename_args.extend_from_slice(&serialize_to_vec(&b"new-name".to_vec()).unwrap());
    let request = compound(
        0,
        &[
            op(nfs_opnum4::OP_PUTROOTFH, &[]),
            op(nfs_opnum4::OP_SAVEFH, &[]),
            op(nfs_opnum4::OP_RENAME, &rename_args),
        ],
    );
    let (xid, reply) =
        call(&mut h.context, NFS, V4, COMPOUND, auth_sys(1000, 1000, &[]), &request).await;
    let mut body = accepted_body(xid, &reply);
    let (status, _) = compound_header(&mut body);
    assert_eq!(status, nfsstat4::NFS4_OK);
    assert!(!h.dir.path().join("old-name").exists());
    assert_eq!(std::fs::read(h.dir.path().join("new-name")).unwrap(), b"payload");
}
