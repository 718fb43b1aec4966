//! NFSv3 READDIRPLUS procedure (procedure 17, RFC 1813 §3.3.17): like
//! READDIR but each entry also carries attributes and a file handle,
//! saving the client a LOOKUP per entry. Two byte budgets apply: the
//! name/id/cookie portion against `dircount`, the whole reply against
//! `maxcount`.

use std::io::{Read, Write};

use tracing::{debug, error, trace};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};
use crate::write_counter::WriteCounter;

use super::readdir::{check_cookie, full_listing};
use super::{cookieverf_for, file_handle, post_op, stat3};

pub async fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::dir::READDIRPLUS3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_readdirplus({:?},{:?})", xid, args);

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
            error!("nfsproc3_readdirplus error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            post_op(context, &dir_path).await.serialize(output)?;
            return Ok(());
        }
    };

    let max_bytes_allowed = (args.maxcount as usize).saturating_sub(128);
    let max_dircount = args.dircount as usize;
    let mut counting_output = WriteCounter::new(output);
    xdr::rpc::make_success_reply(xid).serialize(&mut counting_output)?;
    nfsstat3::NFS3_OK.serialize(&mut counting_output)?;
    nfs3::post_op_attr::attributes(dir_fattr).serialize(&mut counting_output)?;
    verf.serialize(&mut counting_output)?;

    let mut all_entries_written = true;
    let mut accumulated_dircount = 0usize;
    let mut written = 0usize;
    for (index, entry) in listing.iter().enumerate().skip(start) {
        let entry_path = if entry.name == b"." {
            dir_path.clone()
        } else if entry.name == b".." {
            dir_path.parent().unwrap_or(&dir_path).to_path_buf()
        } else {
            dir_path.join(String::from_utf8_lossy(&entry.name).into_owned())
        };
        let name_attributes = post_op(context, &entry_path).await;
        let wire_entry = nfs3::dir::entryplus3 {
            fileid: entry.fileid,
            name: entry.name.as_slice().into(),
            cookie: (index + 1) as u64,
            name_attributes,
            name_handle: nfs3::post_op_fh3::handle(context.handles.fh3_for(&entry_path)),
        };
        let mut buf: Vec<u8> = Vec::new();
        true.serialize(&mut buf)?;
        wire_entry.serialize(&mut buf)?;
        // the dircount budget covers only fileid + name + cookie
        let entry_dircount = 8 + 4 + entry.name.len() + 8;
        if counting_output.bytes_written() + buf.len() >= max_bytes_allowed
            || accumulated_dircount + entry_dircount >= max_dircount
        {
            trace!(" -- out of budget after {} entries", written);
            all_entries_written = false;
            break;
        }
        counting_output.write_all(&buf)?;
        accumulated_dircount += entry_dircount;
        written += 1;
    }
    false.serialize(&mut counting_output)?;
    all_entries_written.serialize(&mut counting_output)?;
    debug!(
        "readdirplus {:?}: start {} sent {} of {} eof {}",
        xid,
        start,
        written,
        listing.len(),
        all_entries_written
    );
    Ok(())
}
