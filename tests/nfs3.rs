//! NFSv3 wire scenarios against a LocalFs export rooted in a tempdir,
//! including the end-to-end exchanges the server must reproduce
//! byte-for-byte at the RPC layer.

mod support;

use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use simple_nfsd::xdr::nfs3::{
    self, cookieverf3, diropargs3, file as nfs3_file, nfs_fh3, nfsstat3, post_op_attr,
    NfsProcedure3, ACCESS3_MODIFY, ACCESS3_READ,
};
use simple_nfsd::xdr::{deserialize, Deserialize};

use support::{accepted_body, args_of, auth_none, auth_sys, call, harness, plant_file};

const NFS: u32 = 100003;
const V3: u32 = 3;

fn proc3(proc: NfsProcedure3) -> u32 {
    proc as u32
}

/// Decodes the nfsstat3 that leads every procedure result.
fn status_of(cursor: &mut impl Read) -> nfsstat3 {
    deserialize::<nfsstat3>(cursor).unwrap()
}

fn my_uid(dir: &Path) -> u32 {
    std::fs::metadata(dir).unwrap().uid()
}

#[tokio::test]
async fn lookup_known_file_scenario() {
    let mut h = harness("rw,insecure");
    let file = plant_file(h.dir.path(), "hello", b"Hello world\n", 0o644);
    let inode = std::fs::metadata(&file).unwrap().ino();

    let root_fh = h.context.handles.fh3_for(h.dir.path());
    let args = diropargs3 { dir: root_fh, name: "hello".into() };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_LOOKUP),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;

    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let object = deserialize::<nfs_fh3>(&mut body).unwrap();
    assert_eq!(object, h.context.handles.fh3_for(&file));
    let obj_attr = deserialize::<post_op_attr>(&mut body).unwrap();
    let post_op_attr::attributes(fattr) = obj_attr else {
        panic!("object attributes must be present");
    };
    assert_eq!(fattr.ftype, nfs3::ftype3::NF3REG);
    assert_eq!(fattr.mode, 0o644);
    assert_eq!(fattr.size, 12);
    assert_eq!(fattr.fileid, inode);
    // directory post-op attributes follow
    let dir_attr = deserialize::<post_op_attr>(&mut body).unwrap();
    assert!(matches!(dir_attr, post_op_attr::attributes(_)));
}

#[tokio::test]
async fn lookup_missing_name_is_noent() {
    let mut h = harness("rw");
    let args = diropargs3 {
        dir: h.context.handles.fh3_for(h.dir.path()),
        name: "missing".into(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_LOOKUP),
        auth_none(),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_NOENT);
}

#[tokio::test]
async fn write_file_sync_then_commit_scenario() {
    let mut h = harness("rw,insecure");
    let file = plant_file(h.dir.path(), "out", b"", 0o666);
    let fh = h.context.handles.fh3_for(&file);
    let verifier = h.context.write_verifier;

    let write_args = nfs3_file::WRITE3args {
        file: fh.clone(),
        offset: 0,
        count: 5,
        stable: nfs3_file::stable_how::FILE_SYNC,
        data: b"hello".to_vec(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_WRITE),
        auth_sys(1000, 1000, &[]),
        &args_of(&write_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let resok = deserialize::<nfs3_file::WRITE3resok>(&mut body).unwrap();
    assert_eq!(resok.count, 5);
    assert_eq!(resok.committed, nfs3_file::stable_how::FILE_SYNC);
    assert_eq!(resok.verf, verifier);

    // the bytes really reached the filesystem
    assert_eq!(std::fs::read(&file).unwrap(), b"hello");

    let commit_args = nfs3_file::COMMIT3args { file: fh.clone(), offset: 0, count: 5 };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_COMMIT),
        auth_sys(1000, 1000, &[]),
        &args_of(&commit_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let resok = deserialize::<nfs3_file::COMMIT3resok>(&mut body).unwrap();
    assert_eq!(resok.verf, verifier);

    // a subsequent GETATTR reflects the mutation
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_GETATTR),
        auth_none(),
        &args_of(&fh),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let fattr = deserialize::<nfs3::fattr3>(&mut body).unwrap();
    assert_eq!(fattr.size, 5);
}

#[tokio::test]
async fn forged_handles_never_reach_the_filesystem() {
    let mut h = harness("rw");

    // a handle this process never issued is stale
    let mut forged = vec![0u8; 64];
    forged[..8].copy_from_slice(&0xdead_beefu64.to_be_bytes());
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_GETATTR),
        auth_none(),
        &args_of(&nfs_fh3 { data: forged }),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_STALE);

    // a guessed id that resolves to an unexported path is refused by the
    // gate; the file is never read
    let outside = h.context.handles.fh3_for(Path::new("/etc/passwd"));
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_READ),
        auth_none(),
        &args_of(&nfs3_file::READ3args { file: outside, offset: 0, count: 128 }),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_ACCES);
}

#[tokio::test]
async fn root_squash_denies_write_to_private_file() {
    let mut h = harness("rw,root_squash,insecure");
    let file = plant_file(h.dir.path(), "private", b"secret", 0o600);
    let fh = h.context.handles.fh3_for(&file);

    // root's identity arrives squashed to the anonymous uid, which holds
    // no write bits on a 0600 file it does not own
    let write_args = nfs3_file::WRITE3args {
        file: fh,
        offset: 0,
        count: 4,
        stable: nfs3_file::stable_how::FILE_SYNC,
        data: b"evil".to_vec(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_WRITE),
        auth_sys(0, 0, &[]),
        &args_of(&write_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_ACCES);
    assert_eq!(std::fs::read(&file).unwrap(), b"secret");
}

#[tokio::test]
async fn read_only_export_refuses_writes_with_rofs() {
    let mut h = harness("ro,insecure");
    let file = plant_file(h.dir.path(), "f", b"data", 0o666);
    let write_args = nfs3_file::WRITE3args {
        file: h.context.handles.fh3_for(&file),
        offset: 0,
        count: 1,
        stable: nfs3_file::stable_how::UNSTABLE,
        data: b"x".to_vec(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_WRITE),
        auth_sys(1000, 1000, &[]),
        &args_of(&write_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_ROFS);
}

#[tokio::test]
async fn read_at_eof_returns_empty_with_eof_set() {
    let mut h = harness("rw");
    let file = plant_file(h.dir.path(), "short", b"abc", 0o644);
    let file_fh = h.context.handles.fh3_for(&file);
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_READ),
        auth_sys(1000, 1000, &[]),
        &args_of(&nfs3_file::READ3args {
            file: file_fh,
            offset: 3,
            count: 16,
        }),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let resok = deserialize::<nfs3_file::READ3resok>(&mut body).unwrap();
    assert_eq!(resok.count, 0);
    assert!(resok.eof);
    assert!(resok.data.is_empty());
}

#[tokio::test]
async fn write_at_file_size_appends() {
    let mut h = harness("rw");
    let file = plant_file(h.dir.path(), "log", b"abc", 0o666);
    let write_args = nfs3_file::WRITE3args {
        file: h.context.handles.fh3_for(&file),
        offset: 3,
        count: 3,
        stable: nfs3_file::stable_how::FILE_SYNC,
        data: b"def".to_vec(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_WRITE),
        auth_sys(1000, 1000, &[]),
        &args_of(&write_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    assert_eq!(std::fs::read(&file).unwrap(), b"abcdef");
}

#[tokio::test]
async fn rename_onto_itself_is_a_successful_noop() {
    let mut h = harness("rw");
    let file = plant_file(h.dir.path(), "same", b"data", 0o666);
    let root = h.context.handles.fh3_for(h.dir.path());
    let args = nfs3::dir::RENAME3args {
        from: diropargs3 { dir: root.clone(), name: "same".into() },
        to: diropargs3 { dir: root, name: "same".into() },
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_RENAME),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    assert_eq!(std::fs::read(&file).unwrap(), b"data");
}

#[tokio::test]
async fn guarded_create_of_existing_file_is_exist() {
    let mut h = harness("rw");
    plant_file(h.dir.path(), "taken", b"", 0o644);
    let args = nfs3_file::CREATE3args {
        where_dir: diropargs3 {
            dir: h.context.handles.fh3_for(h.dir.path()),
            name: "taken".into(),
        },
        how: nfs3_file::createhow3::GUARDED(nfs3::sattr3::default()),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_CREATE),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_EXIST);
}

#[tokio::test]
async fn mkdir_then_remove_round_trip() {
    let mut h = harness("rw");
    let root = h.context.handles.fh3_for(h.dir.path());
    let args = nfs3::dir::MKDIR3args {
        dirops: diropargs3 { dir: root.clone(), name: "sub".into() },
        attributes: nfs3::sattr3::default(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_MKDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    assert!(h.dir.path().join("sub").is_dir());

    let args = diropargs3 { dir: root, name: "sub".into() };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_RMDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    assert!(!h.dir.path().join("sub").exists());
}

#[tokio::test]
async fn access_reports_read_but_not_write_on_foreign_file() {
    let mut h = harness("rw,insecure");
    let file = plant_file(h.dir.path(), "shared", b"x", 0o644);
    // an identity that is neither the owner nor root
    let stranger = my_uid(h.dir.path()).wrapping_add(1).max(1);

    let mut args = args_of(&h.context.handles.fh3_for(&file));
    args.extend_from_slice(&args_of(&(ACCESS3_READ | ACCESS3_MODIFY)));
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_ACCESS),
        auth_sys(stranger, 99999, &[]),
        &args,
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let _attrs = deserialize::<post_op_attr>(&mut body).unwrap();
    let granted = deserialize::<u32>(&mut body).unwrap();
    assert_eq!(granted, ACCESS3_READ);
}

/// Decodes a READDIR reply body into (entries, cookieverf, eof).
fn decode_readdir(body: &mut impl Read) -> (Vec<(u64, Vec<u8>, u64)>, cookieverf3, bool) {
    let status = deserialize::<nfsstat3>(body).unwrap();
    assert_eq!(status, nfsstat3::NFS3_OK);
    let _dir_attr = deserialize::<post_op_attr>(body).unwrap();
    let verf = deserialize::<cookieverf3>(body).unwrap();
    let mut entries = Vec::new();
    while deserialize::<bool>(body).unwrap() {
        let entry = deserialize::<nfs3::dir::entry3>(body).unwrap();
        entries.push((entry.fileid, entry.name.0.clone(), entry.cookie));
    }
    let eof = deserialize::<bool>(body).unwrap();
    (entries, verf, eof)
}

#[tokio::test]
async fn readdir_cookie_resumes_and_stale_verifier_is_refused() {
    let mut h = harness("rw");
    for name in ["alpha", "beta", "gamma"] {
        plant_file(h.dir.path(), name, b"x", 0o644);
    }
    let root = h.context.handles.fh3_for(h.dir.path());

    // cookie 0: the full listing beginning with . and ..
    let args = nfs3::dir::READDIR3args {
        dir: root.clone(),
        cookie: 0,
        cookieverf: cookieverf3::default(),
        dircount: 4096,
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_READDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    let (entries, verf, eof) = decode_readdir(&mut body);
    assert!(eof);
    let names: Vec<_> = entries.iter().map(|(_, name, _)| name.clone()).collect();
    assert_eq!(names, [b".".to_vec(), b"..".to_vec(), b"alpha".to_vec(), b"beta".to_vec(),
        b"gamma".to_vec()]);

    // resume after "alpha" using its cookie and the same verifier
    let resume_cookie = entries[2].2;
    let args = nfs3::dir::READDIR3args {
        dir: root.clone(),
        cookie: resume_cookie,
        cookieverf: verf,
        dircount: 4096,
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_READDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    let (entries, _, eof) = decode_readdir(&mut body);
    assert!(eof);
    let names: Vec<_> = entries.iter().map(|(_, name, _)| name.clone()).collect();
    assert_eq!(names, [b"beta".to_vec(), b"gamma".to_vec()]);

    // a verifier that matches no current directory state is BAD_COOKIE
    let args = nfs3::dir::READDIR3args {
        dir: root,
        cookie: resume_cookie,
        cookieverf: [0xff; 8],
        dircount: 4096,
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_READDIR),
        auth_sys(1000, 1000, &[]),
        &args_of(&args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_BAD_COOKIE);
}

#[tokio::test]
async fn fsinfo_advertises_configured_transfer_sizes() {
    let mut h = support::harness_with("rw", |config| {
        config.read_size = 131072;
        config.write_size = 65536;
    });
    let dir_fh = h.context.handles.fh3_for(h.dir.path());
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_FSINFO),
        auth_none(),
        &args_of(&dir_fh),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3_OK);
    let mut resok = nfs3::fs::fsinfo3::default();
    resok.deserialize(&mut body).unwrap();
    assert_eq!(resok.rtmax, 131072);
    assert_eq!(resok.wtmax, 65536);
}

#[tokio::test]
async fn quota_hard_limit_surfaces_as_dquot() {
    let mut h = harness("rw");
    let file = plant_file(h.dir.path(), "limited", b"", 0o666);
    h.server.quota().set(h.dir.path(), 1000, 0, 4);

    let write_args = nfs3_file::WRITE3args {
        file: h.context.handles.fh3_for(&file),
        offset: 0,
        count: 8,
        stable: nfs3_file::stable_how::FILE_SYNC,
        data: b"too much".to_vec(),
    };
    let (xid, reply) = call(
        &mut h.context,
        NFS,
        V3,
        proc3(NfsProcedure3::NFSPROC3_WRITE),
        auth_sys(1000, 1000, &[]),
        &args_of(&write_args),
    )
    .await;
    let mut body = accepted_body(xid, &reply);
    assert_eq!(status_of(&mut body), nfsstat3::NFS3ERR_DQUOT);
    assert_eq!(std::fs::read(&file).unwrap(), b"");
}
