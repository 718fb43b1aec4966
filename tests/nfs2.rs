//! NFSv2 wire tests: fixed-width handles, 32-bit attributes and the
//! always-stable WRITE semantics.

mod support;

use std::io::Read;

use simple_nfsd::xdr::nfs2::{
    self, diropargs2, diropok2, fattr2, nfsstat2, readargs2, readdirargs2, statfsok2,
    writeargs2, NfsProcedure2,
};
use simple_nfsd::xdr::deserialize;

use support::{accepted_body, args_of, auth_none, auth_sys, call, harness, plant_file};

const NFS: u32 = 100003;
const V2: u32 = 2;

fn proc2(proc: NfsProcedure2) -> u32 {
    proc as u32
}

fn status_of(cursor: &mut impl Read) -> nfsstat2 {
    deserialize::<nfsstat2>(cursor).unwrap()
}

#[tokio::test]
async fn null_replies_success() {
    let mut h = harness("rw");
    let (xid, reply) =
        call(&mut h.context, NFS, V2, proc2(NfsProcedure2::NFSPROC_NULL), auth_none(), &[]).await;
    accepted_body(xid, &reply);
}

#[tokio::test]
async fn getattr_returns_fixed_width_attributes() {
    let mut h = harness("rw");
    let file = plant_file(h.dir.path(), "f", b"twelve bytes", 0o644);
    let handle = h.context.handles.fh2_for(&file);
    assert_eq!(handle.len(), 32);

    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_GETATTR),
        auth_sys(1000, 1000, &[]),
        &args_of(&handle),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let fattr = deserialize::<fattr2>(&mut body).unwrap();
    assert_eq!(fattr.ftype, nfs2::ftype2::NFREG);
    assert_eq!(fattr.size, 12);
    assert_eq!(fattr.mode & 0o777, 0o644);
    // v2 carries the object type in the mode word as well
    assert_eq!(fattr.mode & 0o170000, 0o100000);
}

#[tokio::test]
async fn lookup_then_read_round_trip() {
    let mut h = harness("rw");
    plant_file(h.dir.path(), "hello", b"Hello world\n", 0o644);
    let root = h.context.handles.fh2_for(h.dir.path());

    let args = diropargs2 { dir: root, name: "hello".into() };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_LOOKUP),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let resok = deserialize::<diropok2>(&mut body).unwrap();
    assert_eq!(resok.attributes.size, 12);

    let read_args = readargs2 { file: resok.file, offset: 6, count: 5, totalcount: 0 };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_READ),
        auth_sys(1000, 1000, &[]),
        &args_of(&read_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let _attrs = deserialize::<fattr2>(&mut body).unwrap();
    let data = deserialize::<Vec<u8>>(&mut body).unwrap();
    assert_eq!(data, b"world");
}

#[tokio::test]
async fn write_is_stable_and_returns_attributes() {
    let mut h = harness("rw");
    let file = plant_file(h.dir.path(), "out", b"", 0o666);
    let args = writeargs2 {
        file: h.context.handles.fh2_for(&file),
        beginoffset: 0,
        offset: 0,
        totalcount: 0,
        data: b"hello".to_vec(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_WRITE),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let fattr = deserialize::<fattr2>(&mut body).unwrap();
    assert_eq!(fattr.size, 5);
    assert_eq!(std::fs::read(&file).unwrap(), b"hello");
}

#[tokio::test]
async fn create_and_remove_round_trip() {
    let mut h = harness("rw");
    let root = h.context.handles.fh2_for(h.dir.path());
    let args = nfs2::createargs2 {
        where_dir: diropargs2 { dir: root, name: "fresh".into() },
        attributes: nfs2::sattr2 { mode: 0o640, ..nfs2::sattr2::default() },
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_CREATE),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let resok = deserialize::<diropok2>(&mut body).unwrap();
    assert_eq!(resok.attributes.mode & 0o777, 0o640);
    assert!(h.dir.path().join("fresh").exists());

    let args = diropargs2 { dir: root, name: "fresh".into() };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_REMOVE),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    assert!(!h.dir.path().join("fresh").exists());
}

#[tokio::test]
async fn readdir_cookie_resumes() {
    let mut h = harness("rw");
    for name in ["one", "two"] {
        plant_file(h.dir.path(), name, b"x", 0o644);
    }
    let args = readdirargs2 {
        dir: h.context.handles.fh2_for(h.dir.path()),
        cookie: [0; 4],
        count: 4096,
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_READDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let mut names = Vec::new();
    let mut last_cookie = [0u8; 4];
    while deserialize::<bool>(&mut body).unwrap() {
        let entry = deserialize::<nfs2::entry2>(&mut body).unwrap();
        names.push(entry.name.0.clone());
        last_cookie = entry.cookie;
    }
    assert!(deserialize::<bool>(&mut body).unwrap(), "expected eof");
    assert_eq!(names, [b".".to_vec(), b"..".to_vec(), b"one".to_vec(), b"two".to_vec()]);

    // resume from the penultimate cookie: only the final entry remains
    let mut resume = u32::from_be_bytes(last_cookie);
    resume -= 1;
    let args = readdirargs2 {
        dir: h.context.handles.fh2_for(h.dir.path()),
        cookie: resume.to_be_bytes(),
        count: 4096,
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_READDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let mut names = Vec::new();
    while deserialize::<bool>(&mut body).unwrap() {
        let entry = deserialize::<nfs2::entry2>(&mut body).unwrap();
        names.push(entry.name.0.clone());
    }
    assert_eq!(names, [b"two".to_vec()]);
}

#[tokio::test]
async fn statfs_reports_block_counts() {
    let mut h = harness("rw");
    let dir_fh = h.context.handles.fh2_for(h.dir.path());
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_STATFS),
        auth_none(),
        &args_of(&dir_fh),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFS_OK);
    let resok = deserialize::<statfsok2>(&mut body).unwrap();
    assert_eq!(resok.bsize, 512);
    assert!(resok.blocks >= resok.bfree);
}

#[tokio::test]
async fn stale_fixed_width_handle() {
    let mut h = harness("rw");
    let mut forged = [0u8; 32];
    forged[..4].copy_from_slice(&0xdeadbeefu32.to_be_bytes());
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V2,
        proc2(NfsProcedure2::NFSPROC_GETATTR),
        auth_none(),
        &args_of(&forged),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat2::NFSERR_STALE);
}
