//! XDR data types and constants for the stateless subset of NFS version 4
//! as defined in RFC 7530, plus the argument shapes of the session-style
//! operations (RFC 5661 names) that this server decodes and acknowledges
//! without tracking state.
//!
//! Version 4 folds every operation into COMPOUND: a tag, a minor version
//! and a sequence of operations that share a "current filehandle". Each
//! operation has its own argument and result shape; the compound handler
//! decodes arguments op by op, so this module only defines the pieces with
//! structure worth naming.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    deserialize, Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum,
    SerializeStruct,
};

/// The RPC program number for the NFS service.
pub const PROGRAM: u32 = 100003;
/// The NFS version 4 protocol version number.
pub const VERSION: u32 = 4;

/// Recommended minimum length of an NFSv4 file handle issued here.
pub const NFS4_FHSIZE_MIN: usize = 32;
/// Maximum length of an NFSv4 file handle accepted here.
pub const NFS4_FHSIZE_MAX: usize = 128;
/// Size in bytes of a verifier.
pub const NFS4_VERIFIER_SIZE: usize = 8;
/// Size in bytes of a session identifier.
pub const NFS4_SESSIONID_SIZE: usize = 16;
/// Size in bytes of the "other" part of a state identifier.
pub const NFS4_OTHER_SIZE: usize = 12;

pub type verifier4 = [u8; NFS4_VERIFIER_SIZE];
pub type sessionid4 = [u8; NFS4_SESSIONID_SIZE];
pub type bitmap4 = Vec<u32>;
pub type utf8str_cs = Vec<u8>;

/// Status codes returned by NFS version 4 operations (RFC 7530 §13).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat4 {
    /// The operation completed successfully
    #[default]
    NFS4_OK = 0,
    /// Not owner
    NFS4ERR_PERM = 1,
    /// No such file or directory
    NFS4ERR_NOENT = 2,
    /// A hard I/O error occurred
    NFS4ERR_IO = 5,
    /// No such device or address
    NFS4ERR_NXIO = 6,
    /// Permission denied
    NFS4ERR_ACCESS = 13,
    /// File exists
    NFS4ERR_EXIST = 17,
    /// Attempted cross-device hard link
    NFS4ERR_XDEV = 18,
    /// Not a directory
    NFS4ERR_NOTDIR = 20,
    /// Is a directory
    NFS4ERR_ISDIR = 21,
    /// Invalid argument
    NFS4ERR_INVAL = 22,
    /// File too large
    NFS4ERR_FBIG = 27,
    /// No space left on device
    NFS4ERR_NOSPC = 28,
    /// Read-only file system
    NFS4ERR_ROFS = 30,
    /// Too many hard links
    NFS4ERR_MLINK = 31,
    /// Filename too long
    NFS4ERR_NAMETOOLONG = 63,
    /// Directory not empty
    NFS4ERR_NOTEMPTY = 66,
    /// Quota hard limit exceeded
    NFS4ERR_DQUOT = 69,
    /// Invalid file handle
    NFS4ERR_STALE = 70,
    /// Illegal file handle
    NFS4ERR_BADHANDLE = 10001,
    /// READDIR cookie is stale
    NFS4ERR_BAD_COOKIE = 10003,
    /// Operation is not supported
    NFS4ERR_NOTSUPP = 10004,
    /// Response limit would be exceeded
    NFS4ERR_TOOSMALL = 10005,
    /// Undefined server error
    NFS4ERR_SERVERFAULT = 10006,
    /// Type not supported by the server
    NFS4ERR_BADTYPE = 10007,
    /// Retry the request later
    NFS4ERR_DELAY = 10008,
    /// Verify attributes compared equal
    NFS4ERR_SAME = 10009,
    /// Attributes compared unequal
    NFS4ERR_NOT_SAME = 10027,
    /// No current filehandle has been set
    NFS4ERR_NOFILEHANDLE = 10020,
    /// Unsupported minor version
    NFS4ERR_MINOR_VERS_MISMATCH = 10021,
    /// An attribute in a SETATTR mask is not settable here
    NFS4ERR_ATTRNOTSUPP = 10032,
    /// Arguments failed XDR decoding
    NFS4ERR_BADXDR = 10036,
    /// Operation number is illegal
    NFS4ERR_OP_ILLEGAL = 10044,
}
SerializeEnum!(nfsstat4);
DeserializeEnum!(nfsstat4);

/// File type (RFC 7530 §2).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfs_ftype4 {
    /// Regular file
    #[default]
    NF4REG = 1,
    /// Directory
    NF4DIR = 2,
    /// Block special device
    NF4BLK = 3,
    /// Character special device
    NF4CHR = 4,
    /// Symbolic link
    NF4LNK = 5,
    /// Socket
    NF4SOCK = 6,
    /// Named pipe
    NF4FIFO = 7,
    /// Attribute directory
    NF4ATTRDIR = 8,
    /// Named attribute
    NF4NAMEDATTR = 9,
}
SerializeEnum!(nfs_ftype4);
DeserializeEnum!(nfs_ftype4);

/// Operation numbers usable inside COMPOUND (RFC 7530 §15.2 plus the
/// session operations of RFC 5661 that this server stubs).
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfs_opnum4 {
    OP_ACCESS = 3,
    OP_CLOSE = 4,
    OP_COMMIT = 5,
    OP_CREATE = 6,
    OP_DELEGPURGE = 7,
    OP_DELEGRETURN = 8,
    OP_GETATTR = 9,
    OP_GETFH = 10,
    OP_LINK = 11,
    OP_LOCK = 12,
    OP_LOCKT = 13,
    OP_LOCKU = 14,
    OP_LOOKUP = 15,
    OP_LOOKUPP = 16,
    OP_NVERIFY = 17,
    OP_OPEN = 18,
    OP_OPENATTR = 19,
    OP_OPEN_CONFIRM = 20,
    OP_OPEN_DOWNGRADE = 21,
    OP_PUTFH = 22,
    OP_PUTPUBFH = 23,
    OP_PUTROOTFH = 24,
    OP_READ = 25,
    OP_READDIR = 26,
    OP_READLINK = 27,
    OP_REMOVE = 28,
    OP_RENAME = 29,
    OP_RENEW = 30,
    OP_RESTOREFH = 31,
    OP_SAVEFH = 32,
    OP_SECINFO = 33,
    OP_SETATTR = 34,
    OP_SETCLIENTID = 35,
    OP_SETCLIENTID_CONFIRM = 36,
    OP_VERIFY = 37,
    OP_WRITE = 38,
    OP_RELEASE_LOCKOWNER = 39,
    OP_BIND_CONN_TO_SESSION = 41,
    OP_EXCHANGE_ID = 42,
    OP_CREATE_SESSION = 43,
    OP_DESTROY_SESSION = 44,
    OP_GETDEVICEINFO = 47,
    OP_SEQUENCE = 53,
    OP_DESTROY_CLIENTID = 57,
    OP_RECLAIM_COMPLETE = 58,
    OP_ILLEGAL = 10044,
}
SerializeEnum!(nfs_opnum4);

// Mandatory and recommended attribute numbers served here (RFC 7530 §5).
pub const FATTR4_SUPPORTED_ATTRS: u32 = 0;
pub const FATTR4_TYPE: u32 = 1;
pub const FATTR4_FH_EXPIRE_TYPE: u32 = 2;
pub const FATTR4_CHANGE: u32 = 3;
pub const FATTR4_SIZE: u32 = 4;
pub const FATTR4_LINK_SUPPORT: u32 = 5;
pub const FATTR4_SYMLINK_SUPPORT: u32 = 6;
pub const FATTR4_NAMED_ATTR: u32 = 7;
pub const FATTR4_FSID: u32 = 8;
pub const FATTR4_UNIQUE_HANDLES: u32 = 9;
pub const FATTR4_LEASE_TIME: u32 = 10;
pub const FATTR4_RDATTR_ERROR: u32 = 11;
pub const FATTR4_FILEHANDLE: u32 = 19;
pub const FATTR4_FILEID: u32 = 20;
pub const FATTR4_MODE: u32 = 33;
pub const FATTR4_NUMLINKS: u32 = 35;
pub const FATTR4_OWNER: u32 = 36;
pub const FATTR4_OWNER_GROUP: u32 = 37;
pub const FATTR4_SPACE_USED: u32 = 45;
pub const FATTR4_TIME_ACCESS: u32 = 47;
pub const FATTR4_TIME_ACCESS_SET: u32 = 48;
pub const FATTR4_TIME_METADATA: u32 = 52;
pub const FATTR4_TIME_MODIFY: u32 = 53;
pub const FATTR4_TIME_MODIFY_SET: u32 = 54;

/// settime4 discriminants for the *_SET time attributes.
pub const SET_TO_SERVER_TIME4: u32 = 0;
pub const SET_TO_CLIENT_TIME4: u32 = 1;

/// True when `attr` is set in the bitmap.
pub fn bitmap_contains(bitmap: &[u32], attr: u32) -> bool {
    let word = (attr / 32) as usize;
    word < bitmap.len() && bitmap[word] & (1 << (attr % 32)) != 0
}

/// Sets `attr` in the bitmap, growing it as needed.
pub fn bitmap_set(bitmap: &mut bitmap4, attr: u32) {
    let word = (attr / 32) as usize;
    if bitmap.len() <= word {
        bitmap.resize(word + 1, 0);
    }
    bitmap[word] |= 1 << (attr % 32);
}

/// Timestamp: signed seconds and nanoseconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime4 {
    pub seconds: i64,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime4, seconds, nseconds);
SerializeStruct!(nfstime4, seconds, nseconds);

/// File system identifier.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fsid4 {
    pub major: u64,
    pub minor: u64,
}
DeserializeStruct!(fsid4, major, minor);
SerializeStruct!(fsid4, major, minor);

/// Attribute bundle: which attributes are present plus their packed
/// values in ascending attribute order.
#[derive(Clone, Debug, Default)]
pub struct fattr4 {
    pub attrmask: bitmap4,
    pub attr_vals: Vec<u8>,
}
DeserializeStruct!(fattr4, attrmask, attr_vals);
SerializeStruct!(fattr4, attrmask, attr_vals);

/// State identifier. This server is stateless; the special all-zero and
/// all-one stateids are accepted and everything else is ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct stateid4 {
    pub seqid: u32,
    pub other: [u8; NFS4_OTHER_SIZE],
}
DeserializeStruct!(stateid4, seqid, other);
SerializeStruct!(stateid4, seqid, other);

/// Directory change information returned by mutating operations.
#[derive(Copy, Clone, Debug, Default)]
pub struct change_info4 {
    /// True when before/after were captured atomically with the change
    pub atomic: bool,
    /// Change counter before the operation
    pub before: u64,
    /// Change counter after the operation
    pub after: u64,
}
DeserializeStruct!(change_info4, atomic, before, after);
SerializeStruct!(change_info4, atomic, before, after);

/// ACCESS bits (RFC 7530 §16.1); numerically identical to the v3 bits.
pub const ACCESS4_READ: u32 = 0x0001;
pub const ACCESS4_LOOKUP: u32 = 0x0002;
pub const ACCESS4_MODIFY: u32 = 0x0004;
pub const ACCESS4_EXTEND: u32 = 0x0008;
pub const ACCESS4_DELETE: u32 = 0x0010;
pub const ACCESS4_EXECUTE: u32 = 0x0020;

/// Stability levels for WRITE, identical in numbering to version 3.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how4 {
    #[default]
    UNSTABLE4 = 0,
    DATA_SYNC4 = 1,
    FILE_SYNC4 = 2,
}
SerializeEnum!(stable_how4);
DeserializeEnum!(stable_how4);

/// What CREATE should construct (RFC 7530 §16.4). Regular files are
/// created through OPEN in the full protocol; CREATE covers the rest.
#[derive(Debug)]
pub enum createtype4 {
    /// Symbolic link with the given target
    NF4LNK(utf8str_cs),
    /// Block device
    NF4BLK { specdata1: u32, specdata2: u32 },
    /// Character device
    NF4CHR { specdata1: u32, specdata2: u32 },
    /// Socket
    NF4SOCK,
    /// Named pipe
    NF4FIFO,
    /// Directory
    NF4DIR,
}

impl Default for createtype4 {
    fn default() -> createtype4 {
        createtype4::NF4DIR
    }
}

impl Serialize for createtype4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createtype4::NF4LNK(target) => {
                (nfs_ftype4::NF4LNK as u32).serialize(dest)?;
                target.serialize(dest)
            }
            createtype4::NF4BLK { specdata1, specdata2 } => {
                (nfs_ftype4::NF4BLK as u32).serialize(dest)?;
                specdata1.serialize(dest)?;
                specdata2.serialize(dest)
            }
            createtype4::NF4CHR { specdata1, specdata2 } => {
                (nfs_ftype4::NF4CHR as u32).serialize(dest)?;
                specdata1.serialize(dest)?;
                specdata2.serialize(dest)
            }
            createtype4::NF4SOCK => (nfs_ftype4::NF4SOCK as u32).serialize(dest),
            createtype4::NF4FIFO => (nfs_ftype4::NF4FIFO as u32).serialize(dest),
            createtype4::NF4DIR => (nfs_ftype4::NF4DIR as u32).serialize(dest),
        }
    }
}
impl Deserialize for createtype4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<nfs_ftype4>(src)? {
            nfs_ftype4::NF4LNK => *self = createtype4::NF4LNK(deserialize(src)?),
            nfs_ftype4::NF4BLK => {
                *self = createtype4::NF4BLK {
                    specdata1: deserialize(src)?,
                    specdata2: deserialize(src)?,
                }
            }
            nfs_ftype4::NF4CHR => {
                *self = createtype4::NF4CHR {
                    specdata1: deserialize(src)?,
                    specdata2: deserialize(src)?,
                }
            }
            nfs_ftype4::NF4SOCK => *self = createtype4::NF4SOCK,
            nfs_ftype4::NF4FIFO => *self = createtype4::NF4FIFO,
            nfs_ftype4::NF4DIR => *self = createtype4::NF4DIR,
            other => {
                return Err(crate::xdr::invalid_data(format!(
                    "createtype4 cannot create a {other:?}"
                )))
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session-style operation shapes (RFC 5661 wire forms). Decoded so that a
// compound cursor stays aligned; replied to with minimal acknowledgements.
// ---------------------------------------------------------------------------

/// Client identity presented by EXCHANGE_ID.
#[derive(Clone, Debug, Default)]
pub struct client_owner4 {
    pub co_verifier: verifier4,
    pub co_ownerid: Vec<u8>,
}
DeserializeStruct!(client_owner4, co_verifier, co_ownerid);
SerializeStruct!(client_owner4, co_verifier, co_ownerid);

/// Server identity returned by EXCHANGE_ID.
#[derive(Clone, Debug, Default)]
pub struct server_owner4 {
    pub so_minor_id: u64,
    pub so_major_id: Vec<u8>,
}
DeserializeStruct!(server_owner4, so_minor_id, so_major_id);
SerializeStruct!(server_owner4, so_minor_id, so_major_id);

/// State protection selector; only SP4_NONE is understood here.
pub const SP4_NONE: u32 = 0;

/// Implementation identity exchanged by EXCHANGE_ID.
#[derive(Clone, Debug, Default)]
pub struct nfs_impl_id4 {
    pub nii_domain: Vec<u8>,
    pub nii_name: Vec<u8>,
    pub nii_date: nfstime4,
}
DeserializeStruct!(nfs_impl_id4, nii_domain, nii_name, nii_date);
SerializeStruct!(nfs_impl_id4, nii_domain, nii_name, nii_date);

/// Channel attributes negotiated by CREATE_SESSION.
#[derive(Clone, Debug, Default)]
pub struct channel_attrs4 {
    pub ca_headerpadsize: u32,
    pub ca_maxrequestsize: u32,
    pub ca_maxresponsesize: u32,
    pub ca_maxresponsesize_cached: u32,
    pub ca_maxoperations: u32,
    pub ca_maxrequests: u32,
    pub ca_rdma_ird: Vec<u32>,
}
DeserializeStruct!(
    channel_attrs4,
    ca_headerpadsize,
    ca_maxrequestsize,
    ca_maxresponsesize,
    ca_maxresponsesize_cached,
    ca_maxoperations,
    ca_maxrequests,
    ca_rdma_ird
);
SerializeStruct!(
    channel_attrs4,
    ca_headerpadsize,
    ca_maxrequestsize,
    ca_maxresponsesize,
    ca_maxresponsesize_cached,
    ca_maxoperations,
    ca_maxrequests,
    ca_rdma_ird
);

/// SEQUENCE arguments.
#[derive(Clone, Debug, Default)]
pub struct SEQUENCE4args {
    pub sa_sessionid: sessionid4,
    pub sa_sequenceid: u32,
    pub sa_slotid: u32,
    pub sa_highest_slotid: u32,
    pub sa_cachethis: bool,
}
DeserializeStruct!(
    SEQUENCE4args,
    sa_sessionid,
    sa_sequenceid,
    sa_slotid,
    sa_highest_slotid,
    sa_cachethis
);
SerializeStruct!(
    SEQUENCE4args,
    sa_sessionid,
    sa_sequenceid,
    sa_slotid,
    sa_highest_slotid,
    sa_cachethis
);

/// SEQUENCE acknowledgement.
#[derive(Clone, Debug, Default)]
pub struct SEQUENCE4resok {
    pub sr_sessionid: sessionid4,
    pub sr_sequenceid: u32,
    pub sr_slotid: u32,
    pub sr_highest_slotid: u32,
    pub sr_target_highest_slotid: u32,
    pub sr_status_flags: u32,
}
DeserializeStruct!(
    SEQUENCE4resok,
    sr_sessionid,
    sr_sequenceid,
    sr_slotid,
    sr_highest_slotid,
    sr_target_highest_slotid,
    sr_status_flags
);
SerializeStruct!(
    SEQUENCE4resok,
    sr_sessionid,
    sr_sequenceid,
    sr_slotid,
    sr_highest_slotid,
    sr_target_highest_slotid,
    sr_status_flags
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_round_trip() {
        let mut bitmap = bitmap4::new();
        bitmap_set(&mut bitmap, FATTR4_SUPPORTED_ATTRS);
        bitmap_set(&mut bitmap, FATTR4_SIZE);
        bitmap_set(&mut bitmap, FATTR4_MODE);
        bitmap_set(&mut bitmap, FATTR4_TIME_MODIFY);
        assert_eq!(bitmap.len(), 2);
        assert!(bitmap_contains(&bitmap, FATTR4_SUPPORTED_ATTRS));
        assert!(bitmap_contains(&bitmap, FATTR4_SIZE));
        assert!(bitmap_contains(&bitmap, FATTR4_MODE));
        assert!(bitmap_contains(&bitmap, FATTR4_TIME_MODIFY));
        assert!(!bitmap_contains(&bitmap, FATTR4_OWNER));
        assert!(!bitmap_contains(&bitmap, 95));
    }
}
