//! NFSv3 READ procedure (procedure 6, RFC 1813 §3.3.6): read a byte
//! range from a regular file. Reads at or past end of file return no
//! data with the EOF flag set.

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, error};

use crate::protocol::nfs::{decode_args, gate_check};
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs3::{self, nfsstat3};
use crate::protocol::xdr::{self, Serialize};

use super::{file_handle, post_op, stat3};

pub async fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &Context,
) -> Result<(), anyhow::Error> {
    let Some(args) = decode_args::<nfs3::file::READ3args>(xid, input, output)? else {
        return Ok(());
    };
    debug!("nfsproc3_read({:?},{:?})", xid, args);

    let path = match file_handle(context, &args.file) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let count = args.count.min(context.config.read_size);
    let reply = async {
        // export membership first, so nothing outside an export is even
        // stat'ed on a guessed handle
        gate_check(context, &path, false, None)?;
        let (info, _) = stat3(context, &path).await?;
        if info.is_dir() {
            return Err(nfsstat3::NFS3ERR_ISDIR);
        }
        gate_check(context, &path, false, Some(&info))?;

        let (data, eof) = match context.content_cache.get(&path, args.offset, count) {
            Some((data, eof)) => (data, eof),
            None => {
                let (data, eof) = context
                    .vfs
                    .read(&path, args.offset, count)
                    .await
                    .map_err(|e| crate::fs_util::nfsstat3_from_io(&e))?;
                let data = Arc::new(data);
                context.content_cache.insert(&path, args.offset, count, data.clone(), eof);
                (data, eof)
            }
        };
        Ok::<_, nfsstat3>((data, eof))
    }
    .await;

    match reply {
        Ok((data, eof)) => {
            debug!(" {:?} --> {} bytes eof:{}", xid, data.len(), eof);
            context.stats.record_bytes_read(data.len() as u64);
            let res = nfs3::file::READ3resok {
                file_attributes: post_op(context, &path).await,
                count: data.len() as u32,
                eof,
                data: data.as_ref().clone(),
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_read error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
