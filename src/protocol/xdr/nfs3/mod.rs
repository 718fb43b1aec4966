//! XDR data types and constants for NFS version 3 as defined in RFC 1813.
//!
//! NFS version 3 is a stateless distributed file system protocol. This
//! module defines the constants, basic data types and compound structures
//! used to encode and decode its messages; the procedure argument/result
//! shapes live in the `file`, `dir` and `fs` submodules.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    deserialize, Deserialize, DeserializeBoolUnion, DeserializeEnum, DeserializeStruct, Serialize,
    SerializeBoolUnion, SerializeEnum, SerializeStruct,
};

pub mod dir;
pub mod file;
pub mod fs;

/// The RPC program number for the NFS service.
pub const PROGRAM: u32 = 100003;
/// The NFS version 3 protocol version number.
pub const VERSION: u32 = 3;

/// Maximum size in bytes of an NFSv3 opaque file handle.
pub const NFS3_FHSIZE: u32 = 64;
/// Size in bytes of the READDIR/READDIRPLUS cookie verifier.
pub const NFS3_COOKIEVERFSIZE: u32 = 8;
/// Size in bytes of the exclusive-CREATE verifier.
pub const NFS3_CREATEVERFSIZE: u32 = 8;
/// Size in bytes of the asynchronous-WRITE verifier.
pub const NFS3_WRITEVERFSIZE: u32 = 8;

/// A byte string used in NFS for filenames and paths.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct nfsstring(pub Vec<u8>);

impl nfsstring {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for nfsstring {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().into())
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for nfsstring {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}
impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// Procedure numbers for the NFS version 3 protocol.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum NfsProcedure3 {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_SETATTR = 2,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_ACCESS = 4,
    NFSPROC3_READLINK = 5,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_SYMLINK = 10,
    NFSPROC3_MKNOD = 11,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_LINK = 15,
    NFSPROC3_READDIR = 16,
    NFSPROC3_READDIRPLUS = 17,
    NFSPROC3_FSSTAT = 18,
    NFSPROC3_FSINFO = 19,
    NFSPROC3_PATHCONF = 20,
    NFSPROC3_COMMIT = 21,
    INVALID = 22,
}

/// Filename component.
pub type filename3 = nfsstring;
/// Pathname or symbolic link target.
pub type nfspath3 = nfsstring;
/// File identifier, unique within a filesystem.
pub type fileid3 = u64;
/// Directory iteration cookie.
pub type cookie3 = u64;
/// Cookie verifier for directory iteration.
pub type cookieverf3 = [u8; NFS3_COOKIEVERFSIZE as usize];
/// Verifier for exclusive CREATE.
pub type createverf3 = [u8; NFS3_CREATEVERFSIZE as usize];
/// Verifier for asynchronous WRITE, detects server restarts.
pub type writeverf3 = [u8; NFS3_WRITEVERFSIZE as usize];
pub type uid3 = u32;
pub type gid3 = u32;
pub type size3 = u64;
pub type offset3 = u64;
pub type mode3 = u32;
pub type count3 = u32;

/// Status codes returned by NFS version 3 procedures (RFC 1813 §2.6).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat3 {
    /// The call completed successfully
    #[default]
    NFS3_OK = 0,
    /// Not owner; the caller is neither privileged nor the owner
    NFS3ERR_PERM = 1,
    /// No such file or directory
    NFS3ERR_NOENT = 2,
    /// A hard I/O error occurred
    NFS3ERR_IO = 5,
    /// No such device or address
    NFS3ERR_NXIO = 6,
    /// Permission denied
    NFS3ERR_ACCES = 13,
    /// File exists
    NFS3ERR_EXIST = 17,
    /// Attempted cross-device hard link
    NFS3ERR_XDEV = 18,
    /// No such device
    NFS3ERR_NODEV = 19,
    /// Not a directory
    NFS3ERR_NOTDIR = 20,
    /// Is a directory
    NFS3ERR_ISDIR = 21,
    /// Invalid or unsupported argument
    NFS3ERR_INVAL = 22,
    /// File too large
    NFS3ERR_FBIG = 27,
    /// No space left on device
    NFS3ERR_NOSPC = 28,
    /// Read-only file system
    NFS3ERR_ROFS = 30,
    /// Too many hard links
    NFS3ERR_MLINK = 31,
    /// Filename too long
    NFS3ERR_NAMETOOLONG = 63,
    /// Directory not empty
    NFS3ERR_NOTEMPTY = 66,
    /// Quota hard limit exceeded
    NFS3ERR_DQUOT = 69,
    /// Invalid file handle; the object is gone or was never issued
    NFS3ERR_STALE = 70,
    /// File handle refers to a non-local file system
    NFS3ERR_REMOTE = 71,
    /// File handle failed internal consistency checks
    NFS3ERR_BADHANDLE = 10001,
    /// SETATTR guard mismatch
    NFS3ERR_NOT_SYNC = 10002,
    /// READDIR cookie is stale
    NFS3ERR_BAD_COOKIE = 10003,
    /// Operation is not supported
    NFS3ERR_NOTSUPP = 10004,
    /// Buffer or request is too small
    NFS3ERR_TOOSMALL = 10005,
    /// An error that maps to no legal NFSv3 status
    NFS3ERR_SERVERFAULT = 10006,
    /// Object type not supported by the server
    NFS3ERR_BADTYPE = 10007,
    /// Request started but cannot complete in time; retry later
    NFS3ERR_JUKEBOX = 10008,
}
SerializeEnum!(nfsstat3);
DeserializeEnum!(nfsstat3);

/// File type (RFC 1813 §2.3.5).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    /// Regular file
    #[default]
    NF3REG = 1,
    /// Directory
    NF3DIR = 2,
    /// Block special device
    NF3BLK = 3,
    /// Character special device
    NF3CHR = 4,
    /// Symbolic link
    NF3LNK = 5,
    /// Socket
    NF3SOCK = 6,
    /// Named pipe
    NF3FIFO = 7,
}
SerializeEnum!(ftype3);
DeserializeEnum!(ftype3);

/// Major and minor numbers of a special device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}
DeserializeStruct!(specdata3, specdata1, specdata2);
SerializeStruct!(specdata3, specdata1, specdata2);

/// The NFS version 3 file handle: an opaque byte string of up to
/// [`NFS3_FHSIZE`] bytes. This server always emits 64-byte handles; the
/// internal format belongs to [`crate::handle::FileHandleTable`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct nfs_fh3 {
    pub data: Vec<u8>,
}
DeserializeStruct!(nfs_fh3, data);
SerializeStruct!(nfs_fh3, data);

/// File timestamp: seconds and nanoseconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime3, seconds, nseconds);
SerializeStruct!(nfstime3, seconds, nseconds);

impl From<nfstime3> for filetime::FileTime {
    fn from(time: nfstime3) -> Self {
        filetime::FileTime::from_unix_time(time.seconds as i64, time.nseconds)
    }
}

/// Complete file attributes (RFC 1813 §2.3.5).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr3 {
    /// Object type
    pub ftype: ftype3,
    /// Permission bits
    pub mode: mode3,
    /// Number of hard links
    pub nlink: u32,
    /// Owner user id
    pub uid: uid3,
    /// Owner group id
    pub gid: gid3,
    /// Size in bytes
    pub size: size3,
    /// Bytes actually allocated on disk
    pub used: size3,
    /// Device numbers for special files
    pub rdev: specdata3,
    /// File system identifier
    pub fsid: u64,
    /// File identifier (inode number)
    pub fileid: fileid3,
    /// Last data access
    pub atime: nfstime3,
    /// Last data modification
    pub mtime: nfstime3,
    /// Last attribute change
    pub ctime: nfstime3,
}
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// The subset of attributes used for weak cache consistency checks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_attr {
    pub size: size3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(wcc_attr, size, mtime, ctime);
SerializeStruct!(wcc_attr, size, mtime, ctime);

/// Pre-operation attributes for weak cache consistency (RFC 1813 §2.3.8).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum pre_op_attr {
    /// No attributes available
    #[default]
    Void,
    /// Attributes sampled before the operation
    attributes(wcc_attr),
}
DeserializeBoolUnion!(pre_op_attr, attributes, wcc_attr);
SerializeBoolUnion!(pre_op_attr, attributes, wcc_attr);

/// Post-operation attributes, returned by almost every procedure so that
/// clients can keep their attribute caches coherent.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[repr(u32)]
pub enum post_op_attr {
    /// No attributes available
    #[default]
    Void,
    /// Attributes sampled after the operation
    attributes(fattr3),
}
DeserializeBoolUnion!(post_op_attr, attributes, fattr3);
SerializeBoolUnion!(post_op_attr, attributes, fattr3);

/// Weak cache consistency data: attributes before and after a mutation.
#[derive(Copy, Clone, Debug, Default)]
pub struct wcc_data {
    /// Attributes before the operation
    pub before: pre_op_attr,
    /// Attributes after the operation
    pub after: post_op_attr,
}
DeserializeStruct!(wcc_data, before, after);
SerializeStruct!(wcc_data, before, after);

/// Optional file handle in create-style results.
#[derive(Clone, Debug, Default)]
#[repr(u32)]
pub enum post_op_fh3 {
    /// No file handle returned
    #[default]
    Void,
    /// Handle of the created object
    handle(nfs_fh3),
}
DeserializeBoolUnion!(post_op_fh3, handle, nfs_fh3);
SerializeBoolUnion!(post_op_fh3, handle, nfs_fh3);

/// Optional mode for SETATTR.
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
pub enum set_mode3 {
    Void,
    mode(mode3),
}
DeserializeBoolUnion!(set_mode3, mode, mode3);
SerializeBoolUnion!(set_mode3, mode, mode3);

/// Optional owner uid for SETATTR.
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
pub enum set_uid3 {
    Void,
    uid(uid3),
}
DeserializeBoolUnion!(set_uid3, uid, uid3);
SerializeBoolUnion!(set_uid3, uid, uid3);

/// Optional owner gid for SETATTR.
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
pub enum set_gid3 {
    Void,
    gid(gid3),
}
DeserializeBoolUnion!(set_gid3, gid, gid3);
SerializeBoolUnion!(set_gid3, gid, gid3);

/// Optional size for SETATTR (truncate/extend).
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
pub enum set_size3 {
    Void,
    size(size3),
}
DeserializeBoolUnion!(set_size3, size, size3);
SerializeBoolUnion!(set_size3, size, size3);

/// How to set the access time during SETATTR.
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
pub enum set_atime {
    /// Leave atime unchanged
    DONT_CHANGE,
    /// Set atime to the server's current time
    SET_TO_SERVER_TIME,
    /// Set atime to the given client time
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_atime {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_atime::DONT_CHANGE => 0_u32.serialize(dest),
            set_atime::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_atime::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for set_atime {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_atime::DONT_CHANGE,
            1 => *self = set_atime::SET_TO_SERVER_TIME,
            2 => *self = set_atime::SET_TO_CLIENT_TIME(deserialize(src)?),
            c => return Err(super::invalid_data(format!("invalid set_atime value: {c}"))),
        }
        Ok(())
    }
}

/// How to set the modification time during SETATTR.
#[derive(Copy, Clone, Debug)]
#[repr(u32)]
pub enum set_mtime {
    /// Leave mtime unchanged
    DONT_CHANGE,
    /// Set mtime to the server's current time
    SET_TO_SERVER_TIME,
    /// Set mtime to the given client time
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_mtime {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_mtime::DONT_CHANGE => 0_u32.serialize(dest),
            set_mtime::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_mtime::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for set_mtime {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_mtime::DONT_CHANGE,
            1 => *self = set_mtime::SET_TO_SERVER_TIME,
            2 => *self = set_mtime::SET_TO_CLIENT_TIME(deserialize(src)?),
            c => return Err(super::invalid_data(format!("invalid set_mtime value: {c}"))),
        }
        Ok(())
    }
}

/// The attributes a SETATTR call may change.
#[derive(Copy, Clone, Debug)]
pub struct sattr3 {
    pub mode: set_mode3,
    pub uid: set_uid3,
    pub gid: set_gid3,
    pub size: set_size3,
    pub atime: set_atime,
    pub mtime: set_mtime,
}
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

impl Default for sattr3 {
    fn default() -> sattr3 {
        sattr3 {
            mode: set_mode3::Void,
            uid: set_uid3::Void,
            gid: set_gid3::Void,
            size: set_size3::Void,
            atime: set_atime::DONT_CHANGE,
            mtime: set_mtime::DONT_CHANGE,
        }
    }
}

/// A directory handle plus a name within it.
#[derive(Clone, Debug, Default)]
pub struct diropargs3 {
    /// Directory file handle
    pub dir: nfs_fh3,
    /// Name within the directory
    pub name: filename3,
}
DeserializeStruct!(diropargs3, dir, name);
SerializeStruct!(diropargs3, dir, name);

/// Attributes and target of a symbolic link being created.
#[derive(Debug, Default)]
pub struct symlinkdata3 {
    /// Attributes for the symbolic link
    pub symlink_attributes: sattr3,
    /// Target path the link points at
    pub symlink_data: nfspath3,
}
DeserializeStruct!(symlinkdata3, symlink_attributes, symlink_data);
SerializeStruct!(symlinkdata3, symlink_attributes, symlink_data);

/// ACCESS bit: read file data or read a directory.
pub const ACCESS3_READ: u32 = 0x0001;
/// ACCESS bit: look up names in a directory.
pub const ACCESS3_LOOKUP: u32 = 0x0002;
/// ACCESS bit: modify existing file contents.
pub const ACCESS3_MODIFY: u32 = 0x0004;
/// ACCESS bit: grow a file or add directory entries.
pub const ACCESS3_EXTEND: u32 = 0x0008;
/// ACCESS bit: delete a file or directory entry.
pub const ACCESS3_DELETE: u32 = 0x0010;
/// ACCESS bit: execute a file or traverse a directory.
pub const ACCESS3_EXECUTE: u32 = 0x0020;

/// How CREATE should behave when the target already exists.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    /// Create or reuse an existing file
    #[default]
    UNCHECKED = 0,
    /// Fail with EXIST when the file already exists
    GUARDED = 1,
    /// Exclusive create keyed by a client verifier
    EXCLUSIVE = 2,
}
SerializeEnum!(createmode3);
DeserializeEnum!(createmode3);

/// Optional ctime guard for SETATTR.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum sattrguard3 {
    /// Unconditional change
    #[default]
    Void,
    /// Only change when the object's ctime matches
    obj_ctime(nfstime3),
}
DeserializeBoolUnion!(sattrguard3, obj_ctime, nfstime3);
SerializeBoolUnion!(sattrguard3, obj_ctime, nfstime3);

/// Arguments for SETATTR (procedure 2).
#[derive(Clone, Debug, Default)]
pub struct SETATTR3args {
    /// Target file handle
    pub object: nfs_fh3,
    /// Attributes to set
    pub new_attributes: sattr3,
    /// Guard condition for an atomic change
    pub guard: sattrguard3,
}
DeserializeStruct!(SETATTR3args, object, new_attributes, guard);
SerializeStruct!(SETATTR3args, object, new_attributes, guard);
