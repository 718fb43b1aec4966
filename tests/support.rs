//! Shared harness for the wire-level integration tests.
//!
//! Tests drive [`simple_nfsd::protocol::rpc::handle_rpc`] directly over
//! in-memory cursors: a serialized CALL goes in, the reply bytes come
//! out, and assertions run against the exact wire encoding. A tempdir
//! holds the export root so the `LocalFs` adapter operates on a real
//! directory tree.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use simple_nfsd::config::{ExportConfig, ServerConfig};
use simple_nfsd::exports::SystemResolver;
use simple_nfsd::protocol::rpc::{self, Context, Transport};
use simple_nfsd::server::NfsServer;
use simple_nfsd::vfs::LocalFs;
use simple_nfsd::xdr::rpc::{
    accept_body, auth_flavor, auth_sys_parms, call_body, opaque_auth, reply_body, rpc_body,
    rpc_msg,
};
use simple_nfsd::xdr::{deserialize, serialize_to_vec, Serialize};

static NEXT_XID: AtomicU32 = AtomicU32::new(0x11111111);

pub fn next_xid() -> u32 {
    NEXT_XID.fetch_add(1, Ordering::Relaxed)
}

pub struct Harness {
    pub dir: TempDir,
    pub server: NfsServer,
    pub context: Context,
}

/// A harness with one export of the tempdir root under the given
/// exports(5)-style option string.
pub fn harness(options: &str) -> Harness {
    harness_with(options, |_| {})
}

pub fn harness_with(options: &str, tune: impl FnOnce(&mut ServerConfig)) -> Harness {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("create export root");
    // tempdirs are 0700; the tests authenticate as arbitrary uids that
    // must still pass the mode-bit check on the export root
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o777))
        .expect("open up export root");
    let mut config = ServerConfig {
        exports: vec![ExportConfig {
            path: dir.path().to_path_buf(),
            clients: vec!["*".to_string()],
            options: options.to_string(),
            comment: String::new(),
        }],
        // tests stat freshly mutated files; the cache would hide that
        cache_enabled: false,
        ..ServerConfig::default()
    };
    tune(&mut config);
    let server = NfsServer::with_parts(config, Arc::new(LocalFs::new()), Arc::new(SystemResolver));
    let mut context = server.base_context(2049, Transport::Tcp);
    context.client_addr = client_addr();
    Harness { dir, server, context }
}

pub fn client_addr() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn auth_none() -> opaque_auth {
    opaque_auth::default()
}

/// An AUTH_SYS credential for the given identity.
pub fn auth_sys(uid: u32, gid: u32, gids: &[u32]) -> opaque_auth {
    let parms = auth_sys_parms {
        stamp: 0,
        machinename: b"client".to_vec(),
        uid,
        gid,
        gids: gids.to_vec(),
    };
    opaque_auth {
        flavor: auth_flavor::AUTH_SYS,
        body: serialize_to_vec(&parms).expect("serialize auth_sys"),
    }
}

/// Serializes one CALL and runs it through the dispatcher, returning the
/// xid used and the raw reply bytes (empty for suppressed replies).
pub async fn call(
    context: &mut Context,
    prog: u32,
    vers: u32,
    proc: u32,
    cred: opaque_auth,
    args: &[u8],
) -> (u32, Vec<u8>) {
    let xid = next_xid();
    let reply = call_with_xid(context, xid, prog, vers, proc, cred, args).await;
    (xid, reply)
}

pub async fn call_with_xid(
    context: &mut Context,
    xid: u32,
    prog: u32,
    vers: u32,
    proc: u32,
    cred: opaque_auth,
    args: &[u8],
) -> Vec<u8> {
    let msg = rpc_msg {
        xid,
        body: rpc_body::CALL(call_body {
            rpcvers: 2,
            prog,
            vers,
            proc,
            cred,
            verf: opaque_auth::default(),
        }),
    };
    let mut request = serialize_to_vec(&msg).expect("serialize call");
    request.extend_from_slice(args);

    let mut input = Cursor::new(request);
    let mut output = Cursor::new(Vec::new());
    let replied = rpc::handle_rpc(&mut input, &mut output, context)
        .await
        .expect("handle_rpc");
    if replied {
        output.into_inner()
    } else {
        Vec::new()
    }
}

/// Asserts the reply is MSG_ACCEPTED/SUCCESS for the xid and returns a
/// cursor positioned at the procedure results.
pub fn accepted_body(xid: u32, reply: &[u8]) -> Cursor<&[u8]> {
    let mut cursor = Cursor::new(reply);
    let msg = deserialize::<rpc_msg>(&mut cursor).expect("decode reply header");
    assert_eq!(msg.xid, xid, "reply xid mismatch");
    match msg.body {
        rpc_body::REPLY(reply_body::MSG_ACCEPTED(accepted)) => match accepted.reply_data {
            accept_body::SUCCESS => {}
            other => panic!("expected SUCCESS, got {other:?}"),
        },
        other => panic!("expected MSG_ACCEPTED, got {other:?}"),
    }
    cursor
}

/// Decodes the accept_stat of a reply without requiring SUCCESS.
pub fn accept_state(xid: u32, reply: &[u8]) -> accept_body {
    let mut cursor = Cursor::new(reply);
    let msg = deserialize::<rpc_msg>(&mut cursor).expect("decode reply header");
    assert_eq!(msg.xid, xid);
    match msg.body {
        rpc_body::REPLY(reply_body::MSG_ACCEPTED(accepted)) => accepted.reply_data,
        other => panic!("expected MSG_ACCEPTED, got {other:?}"),
    }
}

/// Decodes a denied reply.
pub fn denied_body(xid: u32, reply: &[u8]) -> simple_nfsd::xdr::rpc::rejected_reply {
    let mut cursor = Cursor::new(reply);
    let msg = deserialize::<rpc_msg>(&mut cursor).expect("decode reply header");
    assert_eq!(msg.xid, xid);
    match msg.body {
        rpc_body::REPLY(reply_body::MSG_DENIED(denied)) => denied,
        other => panic!("expected MSG_DENIED, got {other:?}"),
    }
}

/// Writes `contents` under the export root with the given mode.
pub fn plant_file(root: &Path, name: &str, contents: &[u8], mode: u32) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = root.join(name);
    std::fs::write(&path, contents).expect("plant file");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).expect("chmod");
    path
}

/// Serializes a value for use as procedure arguments.
pub fn args_of<T: Serialize>(value: &T) -> Vec<u8> {
    serialize_to_vec(value).expect("serialize args")
}
