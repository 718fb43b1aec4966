//! XDR argument and result shapes for the NFSv3 directory operations:
//! MKDIR (procedure 9), SYMLINK (10), MKNOD (11), READDIR (16) and
//! READDIRPLUS (17), as defined in RFC 1813.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use crate::xdr::{
    deserialize, Deserialize, DeserializeStruct, Serialize, SerializeStruct,
};

use super::*;

/// Arguments for MKDIR (RFC 1813 §3.3.9).
#[derive(Debug, Default)]
pub struct MKDIR3args {
    /// Directory and name for the new directory
    pub dirops: diropargs3,
    /// Initial attributes
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

/// Arguments for SYMLINK (RFC 1813 §3.3.10).
#[derive(Debug, Default)]
pub struct SYMLINK3args {
    /// Directory and name for the new link
    pub dirops: diropargs3,
    /// Target path and attributes
    pub symlink: symlinkdata3,
}
DeserializeStruct!(SYMLINK3args, dirops, symlink);
SerializeStruct!(SYMLINK3args, dirops, symlink);

/// Device information for MKNOD of a character or block device.
#[derive(Debug, Default)]
pub struct devicedata3 {
    /// Attributes of the new device node
    pub dev_attributes: sattr3,
    /// Major and minor device numbers
    pub spec: specdata3,
}
DeserializeStruct!(devicedata3, dev_attributes, spec);
SerializeStruct!(devicedata3, dev_attributes, spec);

/// What MKNOD should create (RFC 1813 §3.3.11).
#[derive(Debug)]
pub enum mknoddata3 {
    /// Character device with device numbers
    CHR(devicedata3),
    /// Block device with device numbers
    BLK(devicedata3),
    /// Socket with plain attributes
    SOCK(sattr3),
    /// Named pipe with plain attributes
    FIFO(sattr3),
}

impl Default for mknoddata3 {
    fn default() -> mknoddata3 {
        mknoddata3::FIFO(sattr3::default())
    }
}

impl Serialize for mknoddata3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            mknoddata3::CHR(v) => {
                (ftype3::NF3CHR as u32).serialize(dest)?;
                v.serialize(dest)
            }
            mknoddata3::BLK(v) => {
                (ftype3::NF3BLK as u32).serialize(dest)?;
                v.serialize(dest)
            }
            mknoddata3::SOCK(v) => {
                (ftype3::NF3SOCK as u32).serialize(dest)?;
                v.serialize(dest)
            }
            mknoddata3::FIFO(v) => {
                (ftype3::NF3FIFO as u32).serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for mknoddata3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<ftype3>(src)? {
            ftype3::NF3CHR => *self = mknoddata3::CHR(deserialize(src)?),
            ftype3::NF3BLK => *self = mknoddata3::BLK(deserialize(src)?),
            ftype3::NF3SOCK => *self = mknoddata3::SOCK(deserialize(src)?),
            ftype3::NF3FIFO => *self = mknoddata3::FIFO(deserialize(src)?),
            other => {
                return Err(crate::xdr::invalid_data(format!(
                    "mknod type {other:?} is not a special file type"
                )))
            }
        }
        Ok(())
    }
}

/// Arguments for MKNOD (RFC 1813 §3.3.11).
#[derive(Debug, Default)]
pub struct MKNOD3args {
    /// Directory and name for the new special file
    pub where_dir: diropargs3,
    /// Type and device information
    pub what: mknoddata3,
}
DeserializeStruct!(MKNOD3args, where_dir, what);
SerializeStruct!(MKNOD3args, where_dir, what);

/// One READDIR entry (RFC 1813 §3.3.16).
#[derive(Debug, Default)]
pub struct entry3 {
    /// File identifier (inode number)
    pub fileid: fileid3,
    /// Entry name
    pub name: filename3,
    /// Cookie resuming iteration after this entry
    pub cookie: cookie3,
}
DeserializeStruct!(entry3, fileid, name, cookie);
SerializeStruct!(entry3, fileid, name, cookie);

/// Arguments for READDIR (RFC 1813 §3.3.16).
#[derive(Debug, Default)]
pub struct READDIR3args {
    /// Directory to read
    pub dir: nfs_fh3,
    /// Where to resume; 0 starts at the beginning
    pub cookie: cookie3,
    /// Verifier from the batch the cookie came from
    pub cookieverf: cookieverf3,
    /// Maximum bytes of directory information to return
    pub dircount: count3,
}
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, dircount);
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, dircount);

/// One READDIRPLUS entry: an [`entry3`] plus attributes and handle.
#[derive(Debug, Default)]
pub struct entryplus3 {
    /// File identifier (inode number)
    pub fileid: fileid3,
    /// Entry name
    pub name: filename3,
    /// Cookie resuming iteration after this entry
    pub cookie: cookie3,
    /// Attributes of the entry
    pub name_attributes: post_op_attr,
    /// File handle of the entry
    pub name_handle: post_op_fh3,
}
DeserializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);
SerializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);

/// Arguments for READDIRPLUS (RFC 1813 §3.3.17).
#[derive(Debug, Default)]
pub struct READDIRPLUS3args {
    /// Directory to read
    pub dir: nfs_fh3,
    /// Where to resume; 0 starts at the beginning
    pub cookie: cookie3,
    /// Verifier from the batch the cookie came from
    pub cookieverf: cookieverf3,
    /// Maximum bytes of name/id/cookie information to return
    pub dircount: count3,
    /// Maximum bytes of the whole reply
    pub maxcount: count3,
}
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);

/// Arguments for RENAME (RFC 1813 §3.3.14).
#[derive(Debug, Default)]
pub struct RENAME3args {
    /// Source directory and name
    pub from: diropargs3,
    /// Destination directory and name
    pub to: diropargs3,
}
DeserializeStruct!(RENAME3args, from, to);
SerializeStruct!(RENAME3args, from, to);
