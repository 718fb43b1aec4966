//! Per-program procedure handlers.
//!
//! Each submodule owns one RPC program (or one NFS version of program
//! 100003) and follows the same shape: a `handle_*` dispatcher keyed by
//! procedure number, and one `*proc*_name` free function per procedure
//! that decodes arguments from the input stream, performs the operation
//! through the shared context and writes a complete reply to the output
//! stream.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::exports::{AccessGrant, GateDenied};
use crate::handle::HandleError;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::nfsstat3;
use crate::protocol::xdr::{self, deserialize, Deserialize, Serialize};
use crate::vfs::FileInfo;

pub mod mount;
pub mod portmap;
pub mod v2;
pub mod v3;
pub mod v4;

/// Decodes procedure arguments, replying GARBAGE_ARGS and yielding `None`
/// when the bytes do not parse. Decode failures are a property of the
/// client's message, never a server error.
pub(crate) fn decode_args<T: Default + Deserialize>(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
) -> Result<Option<T>, anyhow::Error> {
    match deserialize::<T>(input) {
        Ok(args) => Ok(Some(args)),
        Err(e) => {
            debug!("argument decode failure for xid {}: {}", xid, e);
            xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
            Ok(None)
        }
    }
}

impl From<HandleError> for nfsstat3 {
    fn from(err: HandleError) -> nfsstat3 {
        match err {
            HandleError::Stale => nfsstat3::NFS3ERR_STALE,
            HandleError::BadHandle => nfsstat3::NFS3ERR_BADHANDLE,
        }
    }
}

impl From<GateDenied> for nfsstat3 {
    fn from(denied: GateDenied) -> nfsstat3 {
        match denied {
            GateDenied::Access => nfsstat3::NFS3ERR_ACCES,
            GateDenied::ReadOnly => nfsstat3::NFS3ERR_ROFS,
        }
    }
}

/// Joins a directory path with a client-supplied name component after
/// validating it: single component, no separators, no traversal, at most
/// 255 bytes.
pub(crate) fn child_path(dir: &Path, name: &[u8]) -> Result<PathBuf, nfsstat3> {
    if name.is_empty() || name == b"." || name == b".." {
        return Err(nfsstat3::NFS3ERR_ACCES);
    }
    if name.len() > 255 {
        return Err(nfsstat3::NFS3ERR_NAMETOOLONG);
    }
    if name.contains(&b'/') || name.contains(&0) {
        return Err(nfsstat3::NFS3ERR_ACCES);
    }
    #[cfg(unix)]
    let component = {
        use std::os::unix::ffi::OsStrExt;
        std::ffi::OsStr::from_bytes(name).to_os_string()
    };
    #[cfg(not(unix))]
    let component = std::ffi::OsString::from(String::from_utf8_lossy(name).into_owned());
    Ok(dir.join(component))
}

/// Runs the export gate for `path`, translating refusals into the v3
/// status space (v2/v4 handlers convert further).
pub(crate) fn gate_check(
    context: &Context,
    path: &Path,
    want_write: bool,
    target: Option<&FileInfo>,
) -> Result<AccessGrant, nfsstat3> {
    context
        .exports
        .read()
        .unwrap()
        .check(path, &context.principal, context.client_addr, want_write, target)
        .map_err(nfsstat3::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_path_validation() {
        let dir = Path::new("/srv/export");
        assert_eq!(child_path(dir, b"file").unwrap(), PathBuf::from("/srv/export/file"));
        assert_eq!(child_path(dir, b"..").unwrap_err(), nfsstat3::NFS3ERR_ACCES);
        assert_eq!(child_path(dir, b".").unwrap_err(), nfsstat3::NFS3ERR_ACCES);
        assert_eq!(child_path(dir, b"").unwrap_err(), nfsstat3::NFS3ERR_ACCES);
        assert_eq!(child_path(dir, b"a/b").unwrap_err(), nfsstat3::NFS3ERR_ACCES);
        assert_eq!(
            child_path(dir, &[b'x'; 256]).unwrap_err(),
            nfsstat3::NFS3ERR_NAMETOOLONG
        );
    }
}
