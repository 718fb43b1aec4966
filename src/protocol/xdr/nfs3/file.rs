//! XDR argument and result shapes for the NFSv3 file operations: READ
//! (procedure 6), WRITE (7), CREATE (8), LINK (15) and COMMIT (21), as
//! defined in RFC 1813.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use crate::xdr::{
    deserialize, Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum,
    SerializeStruct,
};

use super::*;

/// Arguments for READ (RFC 1813 §3.3.6).
#[derive(Debug, Default)]
pub struct READ3args {
    /// File handle of the file to read
    pub file: nfs_fh3,
    /// Byte position to begin reading at
    pub offset: offset3,
    /// Number of bytes to read
    pub count: count3,
}
DeserializeStruct!(READ3args, file, offset, count);
SerializeStruct!(READ3args, file, offset, count);

/// Successful READ result.
#[derive(Debug, Default)]
pub struct READ3resok {
    /// File attributes after the read
    pub file_attributes: post_op_attr,
    /// Number of bytes actually read
    pub count: count3,
    /// True when the read reached end of file
    pub eof: bool,
    /// The data
    pub data: Vec<u8>,
}
DeserializeStruct!(READ3resok, file_attributes, count, eof, data);
SerializeStruct!(READ3resok, file_attributes, count, eof, data);

/// Requested durability of a WRITE (RFC 1813 §3.3.7).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    /// The server may buffer and reply before the data is durable
    #[default]
    UNSTABLE = 0,
    /// File data must be durable before the reply; metadata may lag
    DATA_SYNC = 1,
    /// File data and metadata must both be durable before the reply
    FILE_SYNC = 2,
}
SerializeEnum!(stable_how);
DeserializeEnum!(stable_how);

/// Arguments for WRITE (RFC 1813 §3.3.7).
#[derive(Debug, Default)]
pub struct WRITE3args {
    /// File handle of the file to write
    pub file: nfs_fh3,
    /// Byte position to begin writing at
    pub offset: offset3,
    /// Number of bytes of data
    pub count: count3,
    /// Requested durability
    pub stable: stable_how,
    /// The data to write
    pub data: Vec<u8>,
}
DeserializeStruct!(WRITE3args, file, offset, count, stable, data);
SerializeStruct!(WRITE3args, file, offset, count, stable, data);

/// Successful WRITE result. `committed` reports the durability actually
/// achieved, which is never weaker than what was requested.
#[derive(Debug, Default)]
pub struct WRITE3resok {
    /// Attributes before and after the write
    pub file_wcc: wcc_data,
    /// Number of bytes written
    pub count: count3,
    /// Durability actually achieved
    pub committed: stable_how,
    /// Server instance verifier; a change tells the client its unstable
    /// writes were lost
    pub verf: writeverf3,
}
DeserializeStruct!(WRITE3resok, file_wcc, count, committed, verf);
SerializeStruct!(WRITE3resok, file_wcc, count, committed, verf);

/// The three ways CREATE can construct a file (RFC 1813 §3.3.8).
#[derive(Debug)]
pub enum createhow3 {
    /// Create or reuse, applying the given attributes
    UNCHECKED(sattr3),
    /// Fail if the name exists, otherwise apply the given attributes
    GUARDED(sattr3),
    /// Idempotent create keyed by the client's verifier
    EXCLUSIVE(createverf3),
}

impl Default for createhow3 {
    fn default() -> createhow3 {
        createhow3::UNCHECKED(sattr3::default())
    }
}

impl Serialize for createhow3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createhow3::UNCHECKED(v) => {
                (createmode3::UNCHECKED as u32).serialize(dest)?;
                v.serialize(dest)
            }
            createhow3::GUARDED(v) => {
                (createmode3::GUARDED as u32).serialize(dest)?;
                v.serialize(dest)
            }
            createhow3::EXCLUSIVE(v) => {
                (createmode3::EXCLUSIVE as u32).serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for createhow3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<createmode3>(src)? {
            createmode3::UNCHECKED => *self = createhow3::UNCHECKED(deserialize(src)?),
            createmode3::GUARDED => *self = createhow3::GUARDED(deserialize(src)?),
            createmode3::EXCLUSIVE => *self = createhow3::EXCLUSIVE(deserialize(src)?),
        }
        Ok(())
    }
}

/// Arguments for CREATE (RFC 1813 §3.3.8).
#[derive(Debug, Default)]
pub struct CREATE3args {
    /// Directory and name for the new file
    pub where_dir: diropargs3,
    /// Creation mode and attributes
    pub how: createhow3,
}
DeserializeStruct!(CREATE3args, where_dir, how);
SerializeStruct!(CREATE3args, where_dir, how);

/// Successful CREATE/MKDIR/SYMLINK result.
#[derive(Debug, Default)]
pub struct CREATE3resok {
    /// Handle of the new object
    pub obj: post_op_fh3,
    /// Attributes of the new object
    pub obj_attributes: post_op_attr,
    /// Weak cache consistency data for the parent directory
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(CREATE3resok, obj, obj_attributes, dir_wcc);
SerializeStruct!(CREATE3resok, obj, obj_attributes, dir_wcc);

/// Arguments for LINK (RFC 1813 §3.3.15).
#[derive(Debug, Default)]
pub struct LINK3args {
    /// Handle of the existing file
    pub file: nfs_fh3,
    /// Directory and name of the new link
    pub link: diropargs3,
}
DeserializeStruct!(LINK3args, file, link);
SerializeStruct!(LINK3args, file, link);

/// Arguments for COMMIT (RFC 1813 §3.3.21).
#[derive(Debug, Default)]
pub struct COMMIT3args {
    /// File handle of the file to commit
    pub file: nfs_fh3,
    /// Start of the range to commit
    pub offset: offset3,
    /// Length of the range, 0 meaning to end of file
    pub count: count3,
}
DeserializeStruct!(COMMIT3args, file, offset, count);
SerializeStruct!(COMMIT3args, file, offset, count);

/// Successful COMMIT result.
#[derive(Debug, Default)]
pub struct COMMIT3resok {
    /// Attributes before and after the commit
    pub file_wcc: wcc_data,
    /// Server instance verifier, identical to the WRITE verifier
    pub verf: writeverf3,
}
DeserializeStruct!(COMMIT3resok, file_wcc, verf);
SerializeStruct!(COMMIT3resok, file_wcc, verf);
