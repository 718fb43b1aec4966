//! NFSv4 attribute bitmap handling.
//!
//! Version 4 replaces the fixed attribute structs of its ancestors with
//! a negotiated bitmap: the client names the attributes it wants, the
//! server answers with the intersection of that set and what it
//! supports, packing the values in ascending attribute order.

use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::fs_util;
use crate::protocol::rpc::Context;
use crate::protocol::xdr::nfs4::{self, bitmap4, bitmap_contains, bitmap_set, nfsstat4};
use crate::protocol::xdr::{deserialize, Serialize};
use crate::vfs::FileInfo;

/// The attributes this server can return, in ascending order.
const SUPPORTED: &[u32] = &[
    nfs4::FATTR4_SUPPORTED_ATTRS,
    nfs4::FATTR4_TYPE,
    nfs4::FATTR4_FH_EXPIRE_TYPE,
    nfs4::FATTR4_CHANGE,
    nfs4::FATTR4_SIZE,
    nfs4::FATTR4_LINK_SUPPORT,
    nfs4::FATTR4_SYMLINK_SUPPORT,
    nfs4::FATTR4_NAMED_ATTR,
    nfs4::FATTR4_FSID,
    nfs4::FATTR4_UNIQUE_HANDLES,
    nfs4::FATTR4_LEASE_TIME,
    nfs4::FATTR4_FILEHANDLE,
    nfs4::FATTR4_FILEID,
    nfs4::FATTR4_MODE,
    nfs4::FATTR4_NUMLINKS,
    nfs4::FATTR4_OWNER,
    nfs4::FATTR4_OWNER_GROUP,
    nfs4::FATTR4_SPACE_USED,
    nfs4::FATTR4_TIME_ACCESS,
    nfs4::FATTR4_TIME_METADATA,
    nfs4::FATTR4_TIME_MODIFY,
];

/// Lease time advertised for the stateless server; nothing is actually
/// leased.
const LEASE_TIME: u32 = 90;

/// FH4_PERSISTENT: handles survive as long as the process.
const FH_EXPIRE_TYPE: u32 = 0;

/// The bitmap of every attribute this server serves.
pub fn supported_attrs() -> bitmap4 {
    let mut bitmap = bitmap4::new();
    for attr in SUPPORTED {
        bitmap_set(&mut bitmap, *attr);
    }
    bitmap
}

fn nfstime4_from(seconds: u32, nseconds: u32) -> nfs4::nfstime4 {
    nfs4::nfstime4 { seconds: seconds as i64, nseconds }
}

/// Encodes the requested-and-supported attributes of a file into a
/// [`nfs4::fattr4`]. GETATTR replies always include `supported_attrs`
/// regardless of the request.
pub fn encode_fattr4(
    context: &Context,
    path: &Path,
    info: &FileInfo,
    requested: &[u32],
    force_supported: bool,
) -> std::io::Result<nfs4::fattr4> {
    let mut mask = bitmap4::new();
    let mut vals: Vec<u8> = Vec::new();

    for &attr in SUPPORTED {
        let wanted = bitmap_contains(requested, attr)
            || (force_supported && attr == nfs4::FATTR4_SUPPORTED_ATTRS);
        if !wanted {
            continue;
        }
        bitmap_set(&mut mask, attr);
        match attr {
            nfs4::FATTR4_SUPPORTED_ATTRS => supported_attrs().serialize(&mut vals)?,
            nfs4::FATTR4_TYPE => (fs_util::ftype4_from(info.kind) as u32).serialize(&mut vals)?,
            nfs4::FATTR4_FH_EXPIRE_TYPE => FH_EXPIRE_TYPE.serialize(&mut vals)?,
            nfs4::FATTR4_CHANGE => {
                let change =
                    ((info.ctime.seconds as u64) << 32) | info.ctime.nseconds as u64;
                change.serialize(&mut vals)?;
            }
            nfs4::FATTR4_SIZE => info.size.serialize(&mut vals)?,
            nfs4::FATTR4_LINK_SUPPORT => true.serialize(&mut vals)?,
            nfs4::FATTR4_SYMLINK_SUPPORT => true.serialize(&mut vals)?,
            nfs4::FATTR4_NAMED_ATTR => false.serialize(&mut vals)?,
            nfs4::FATTR4_FSID => {
                nfs4::fsid4 { major: info.fsid, minor: 0 }.serialize(&mut vals)?
            }
            nfs4::FATTR4_UNIQUE_HANDLES => true.serialize(&mut vals)?,
            nfs4::FATTR4_LEASE_TIME => LEASE_TIME.serialize(&mut vals)?,
            nfs4::FATTR4_FILEHANDLE => context.handles.fh4_for(path).serialize(&mut vals)?,
            nfs4::FATTR4_FILEID => info.fileid.serialize(&mut vals)?,
            nfs4::FATTR4_MODE => info.mode.serialize(&mut vals)?,
            nfs4::FATTR4_NUMLINKS => info.nlink.serialize(&mut vals)?,
            nfs4::FATTR4_OWNER => info.uid.to_string().into_bytes().serialize(&mut vals)?,
            nfs4::FATTR4_OWNER_GROUP => {
                info.gid.to_string().into_bytes().serialize(&mut vals)?
            }
            nfs4::FATTR4_SPACE_USED => info.used.serialize(&mut vals)?,
            nfs4::FATTR4_TIME_ACCESS => {
                nfstime4_from(info.atime.seconds, info.atime.nseconds).serialize(&mut vals)?
            }
            nfs4::FATTR4_TIME_METADATA => {
                nfstime4_from(info.ctime.seconds, info.ctime.nseconds).serialize(&mut vals)?
            }
            nfs4::FATTR4_TIME_MODIFY => {
                nfstime4_from(info.mtime.seconds, info.mtime.nseconds).serialize(&mut vals)?
            }
            _ => unreachable!("attribute {attr} listed as supported but not encoded"),
        }
    }

    Ok(nfs4::fattr4 { attrmask: mask, attr_vals: vals })
}

/// The attribute changes a SETATTR-style fattr4 requests.
#[derive(Debug, Default)]
pub struct SettableAttrs {
    pub size: Option<u64>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
    /// The attrsset bitmap to echo back
    pub applied: bitmap4,
}

/// Decodes the settable subset of a [`nfs4::fattr4`]. Unknown or
/// read-only attributes in the mask fail with ATTRNOTSUPP; a value
/// stream that does not match its mask fails with BADXDR.
pub fn decode_settable_attrs(fattr: &nfs4::fattr4) -> Result<SettableAttrs, nfsstat4> {
    let mut out = SettableAttrs::default();
    let mut cursor = Cursor::new(fattr.attr_vals.as_slice());

    let max_attr = fattr.attrmask.len() as u32 * 32;
    for attr in 0..max_attr {
        if !bitmap_contains(&fattr.attrmask, attr) {
            continue;
        }
        match attr {
            nfs4::FATTR4_SIZE => {
                out.size =
                    Some(deserialize::<u64>(&mut cursor).map_err(|_| nfsstat4::NFS4ERR_BADXDR)?);
            }
            nfs4::FATTR4_MODE => {
                out.mode =
                    Some(deserialize::<u32>(&mut cursor).map_err(|_| nfsstat4::NFS4ERR_BADXDR)?);
            }
            nfs4::FATTR4_OWNER => {
                let owner = deserialize::<Vec<u8>>(&mut cursor)
                    .map_err(|_| nfsstat4::NFS4ERR_BADXDR)?;
                out.uid = parse_identity(&owner).ok_or(nfsstat4::NFS4ERR_INVAL).map(Some)?;
            }
            nfs4::FATTR4_OWNER_GROUP => {
                let group = deserialize::<Vec<u8>>(&mut cursor)
                    .map_err(|_| nfsstat4::NFS4ERR_BADXDR)?;
                out.gid = parse_identity(&group).ok_or(nfsstat4::NFS4ERR_INVAL).map(Some)?;
            }
            nfs4::FATTR4_TIME_ACCESS_SET => {
                out.atime = decode_settime(&mut cursor)?;
            }
            nfs4::FATTR4_TIME_MODIFY_SET => {
                out.mtime = decode_settime(&mut cursor)?;
            }
            _ => return Err(nfsstat4::NFS4ERR_ATTRNOTSUPP),
        }
        bitmap_set(&mut out.applied, attr);
    }
    Ok(out)
}

/// Numeric principal form ("1000" or "1000@domain").
fn parse_identity(raw: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(raw).ok()?;
    let numeric = text.split('@').next()?;
    numeric.parse().ok()
}

fn decode_settime(cursor: &mut Cursor<&[u8]>) -> Result<Option<SystemTime>, nfsstat4> {
    let how = deserialize::<u32>(cursor).map_err(|_| nfsstat4::NFS4ERR_BADXDR)?;
    match how {
        nfs4::SET_TO_SERVER_TIME4 => Ok(Some(SystemTime::now())),
        nfs4::SET_TO_CLIENT_TIME4 => {
            let time =
                deserialize::<nfs4::nfstime4>(cursor).map_err(|_| nfsstat4::NFS4ERR_BADXDR)?;
            Ok(Some(UNIX_EPOCH + Duration::new(time.seconds.max(0) as u64, time.nseconds)))
        }
        _ => Err(nfsstat4::NFS4ERR_BADXDR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settable_attrs_round_trip() {
        let mut fattr = nfs4::fattr4::default();
        bitmap_set(&mut fattr.attrmask, nfs4::FATTR4_SIZE);
        bitmap_set(&mut fattr.attrmask, nfs4::FATTR4_MODE);
        5u64.serialize(&mut fattr.attr_vals).unwrap();
        0o640u32.serialize(&mut fattr.attr_vals).unwrap();

        let attrs = decode_settable_attrs(&fattr).unwrap();
        assert_eq!(attrs.size, Some(5));
        assert_eq!(attrs.mode, Some(0o640));
        assert!(bitmap_contains(&attrs.applied, nfs4::FATTR4_SIZE));
        assert!(bitmap_contains(&attrs.applied, nfs4::FATTR4_MODE));
    }

    #[test]
    fn read_only_attr_in_setattr_mask_is_refused() {
        let mut fattr = nfs4::fattr4::default();
        bitmap_set(&mut fattr.attrmask, nfs4::FATTR4_FILEID);
        assert_eq!(decode_settable_attrs(&fattr).unwrap_err(), nfsstat4::NFS4ERR_ATTRNOTSUPP);
    }

    #[test]
    fn owner_strings_parse_numerically() {
        assert_eq!(parse_identity(b"1000"), Some(1000));
        assert_eq!(parse_identity(b"1000@example.com"), Some(1000));
        assert_eq!(parse_identity(b"alice"), None);
    }
}
