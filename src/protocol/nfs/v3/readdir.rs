//! NFSv3 READDIR procedure (procedure 16, RFC 1813 §3.3.16): return a
//! batch of directory entries bounded by the client's byte budget.
//!
//! Cookies are ordinals into the stable name-sorted listing (with `.`
//! and `..` first), so a cookie from one batch resumes at the next
//! entry. The cookie verifier is derived from the directory's mtime: it
//! stays stable across batches until the directory changes, after which
//! resuming with the old verifier is BAD_COOKIE. Cookie 0 accepts any
//! verifier.

use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, error, trace};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::{FileInfo, VfsDirEntry};
use crate::write_counter::WriteCounter;

use super::{cookieverf_for, file_handle, post_op, stat3};

/// The full listing the cookies index into: `.`, `..`, then the sorted
/// directory contents.
pub(super) async fn full_listing(
    context: &Context,
    dir_path: &Path,
    dir_info: &FileInfo,
) -> Result<Vec<VfsDirEntry>, nfsstat3> {
    let parent_fileid = match dir_path.parent() {
        Some(parent) => context
            .stat_cached(parent)
            .await
            .map(|info| info.fileid)
            .unwrap_or(dir_info.fileid),
        None => dir_info.fileid,
    };
    let mut listing = vec![
        VfsDirEntry { fileid: dir_info.fileid, name: b".".to_vec() },
        VfsDirEntry { fileid: parent_fileid, name: b"..".to_vec() },
    ];
    listing.extend(
        context
            .vfs
            .readdir(dir_path)
            .await
            .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?,
    );
    Ok(listing)
}

/// Validates the cookie/verifier pair against the current listing.
pub(super) fn check_cookie(
    cookie: u64,
    cookieverf: &nfs3::cookieverf3,
    current_verf: &nfs3::cookieverf3,
    listing_len: usize,
) -> Result<usize, nfsstat3> {
    if cookie == 0 {
        return Ok(0);
    }
    if cookieverf != current_verf {
        return Err(nfsstat3::NFS3ERR_BAD_COOKIE);
    }
    let start = cookie as usize;
    if start > listing_len {
        return Err(nfsstat3::NFS3ERR_BAD_COOKIE);
    }
    Ok(start)
}

pub async fn nfsproc3_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::dir::READDIR3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_readdir({:?},{:?})", xid, args);

    let resolved = file_handle(context, &args.dir)
        .and_then(|path| gate_check(context, &path, false, None).map(|_| path));
    let dir_path = match resolved {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let prepared = async {
        let (dir_info, dir_fattr) = stat3(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat3::NFS3ERR_NOTDIR);
        }
        gate_check(context, &dir_path, false, Some(&dir_info))?;
        let listing = full_listing(context, &dir_path, &dir_info).await?;
        let verf = cookieverf_for(&dir_info);
        let start = check_cookie(args.cookie, &args.cookieverf, &verf, listing.len())?;
        Ok::<_, nfsstat3>((dir_fattr, listing, verf, start))
    }
    .await;

    let (dir_fattr, listing, verf, start) = match prepared {
        Ok(prepared) => prepared,
        Err(stat) => {
            error!("nfsproc3_readdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            post_op(context, &dir_path).await.serialize(output)?;
            return Ok(());
        }
    };

    // leave room for the final list terminator and the eof flag
    let max_bytes_allowed = (args.dircount as usize).saturating_sub(128);
    let mut counting_output = WriteCounter::new(output);
    xdr::rpc::make_success_reply(xid).serialize(&mut counting_output)?;
    nfsstat3::NFS3_OK.serialize(&mut counting_output)?;
    nfs3::post_op_attr::attributes(dir_fattr).serialize(&mut counting_output)?;
    verf.serialize(&mut counting_output)?;

    let mut all_entries_written = true;
    let mut written = 0usize;
    for (index, entry) in listing.iter().enumerate().skip(start) {
        let wire_entry = nfs3::dir::entry3 {
            fileid: entry.fileid,
            name: entry.name.as_slice().into(),
            cookie: (index + 1) as u64,
        };
        let mut buf: Vec<u8> = Vec::new();
        true.serialize(&mut buf)?;
        wire_entry.serialize(&mut buf)?;
        if counting_output.bytes_written() + buf.len() >= max_bytes_allowed {
            trace!(" -- out of budget after {} entries", written);
            all_entries_written = false;
            break;
        }
        counting_output.write_all(&buf)?;
        written += 1;
    }
    false.serialize(&mut counting_output)?;
    let eof = all_entries_written;
    eof.serialize(&mut counting_output)?;
    debug!(
        "readdir {:?}: start {} sent {} of {} eof {}",
        xid,
        start,
        written,
        listing.len(),
        eof
    );
    Ok(())
}
