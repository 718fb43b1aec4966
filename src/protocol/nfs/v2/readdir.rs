//! NFSv2 READDIR procedure (procedure 16, RFC 1094 §2.2.17). The cookie
//! is a 4-byte opaque holding the ordinal of the last returned entry;
//! there is no verifier in version 2, so a directory changing between
//! batches can only be detected by the client.

use std::io::{Read, Write};

use tracing::{debug, error, trace};

use crate::protocol::nfs::decode_args;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs2::{self, nfsstat2};
use crate::protocol::xdr::{self, Serialize};
use crate::vfs::VfsDirEntry;
use crate::write_counter::WriteCounter;

use super::{file_handle2, gate2, stat2};

pub async fn nfsproc2_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs2::readdirargs2>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc2_readdir({:?},{:?})", xid, args);

    let prepared = async {
        let dir_path = file_handle2(context, &args.dir)?;
        gate2(context, &dir_path, false, None)?;
        let (dir_info, _) = stat2(context, &dir_path).await?;
        if !dir_info.is_dir() {
            return Err(nfsstat2::NFSERR_NOTDIR);
        }
        gate2(context, &dir_path, false, Some(&dir_info))?;

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
                .readdir(&dir_path)
                .await
                .map_err(|e| super::stat2_from(crate::fs_util::nfsstat3_from_io(&e)))?,
        );
        Ok::<_, nfsstat2>(listing)
    }
    .await;

    let listing = match prepared {
        Ok(listing) => listing,
        Err(stat) => {
            error!("nfsproc2_readdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };

    let start = u32::from_be_bytes(args.cookie) as usize;
    let start = start.min(listing.len());
    let max_bytes_allowed = (args.count as usize).saturating_sub(16);

    let mut counting_output = WriteCounter::new(output);
    xdr::rpc::make_success_reply(xid).serialize(&mut counting_output)?;
    nfsstat2::NFS_OK.serialize(&mut counting_output)?;

    let mut complete = true;
    let mut written = 0usize;
    for (index, entry) in listing.iter().enumerate().skip(start) {
        let wire_entry = nfs2::entry2 {
            fileid: entry.fileid as u32,
            name: entry.name.as_slice().into(),
            cookie: ((index + 1) as u32).to_be_bytes(),
        };
        let mut buf: Vec<u8> = Vec::new();
        true.serialize(&mut buf)?;
        wire_entry.serialize(&mut buf)?;
        if counting_output.bytes_written() + buf.len() >= max_bytes_allowed {
            trace!(" -- out of budget after {} entries", written);
            complete = false;
            break;
        }
        counting_output.write_all(&buf)?;
        written += 1;
    }
    false.serialize(&mut counting_output)?;
    complete.serialize(&mut counting_output)?;
    debug!("readdir2 {:?}: start {} sent {} eof {}", xid, start, written, complete);
    Ok(())
}
