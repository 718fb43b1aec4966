//! XDR data types and constants for NFS version 2 as defined in RFC 1094.
//!
//! Version 2 predates 64-bit file semantics: offsets, sizes and file ids
//! are 32 bits wide, file handles are a fixed 32 bytes, and timestamps are
//! second/microsecond pairs. Procedure handlers serialize the
//! status-discriminated result unions field by field, so only the argument
//! structs and the "ok" result bodies are modeled here.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum, SerializeStruct,
};

/// The RPC program number for the NFS service.
pub const PROGRAM: u32 = 100003;
/// The NFS version 2 protocol version number.
pub const VERSION: u32 = 2;

/// Size in bytes of the fixed-width version 2 file handle.
pub const FHSIZE: usize = 32;
/// Maximum data bytes in a READ or WRITE.
pub const MAXDATA: u32 = 8192;
/// Maximum bytes in a pathname argument.
pub const MAXPATHLEN: usize = 1024;
/// Maximum bytes in a filename component.
pub const MAXNAMLEN: usize = 255;
/// Size in bytes of the opaque READDIR cookie.
pub const COOKIESIZE: usize = 4;

/// The fixed-width version 2 file handle.
pub type fhandle2 = [u8; FHSIZE];
/// The opaque READDIR continuation cookie.
pub type nfscookie2 = [u8; COOKIESIZE];
/// Filename component.
pub type filename2 = super::nfs3::nfsstring;
/// Pathname or symlink target.
pub type path2 = super::nfs3::nfsstring;

/// Status codes returned by NFS version 2 procedures (RFC 1094 §2.3.1).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat2 {
    /// The call completed successfully
    #[default]
    NFS_OK = 0,
    /// Not owner
    NFSERR_PERM = 1,
    /// No such file or directory
    NFSERR_NOENT = 2,
    /// A hard I/O error occurred
    NFSERR_IO = 5,
    /// No such device or address
    NFSERR_NXIO = 6,
    /// Permission denied
    NFSERR_ACCES = 13,
    /// File exists
    NFSERR_EXIST = 17,
    /// No such device
    NFSERR_NODEV = 19,
    /// Not a directory
    NFSERR_NOTDIR = 20,
    /// Is a directory
    NFSERR_ISDIR = 21,
    /// File too large
    NFSERR_FBIG = 27,
    /// No space left on device
    NFSERR_NOSPC = 28,
    /// Read-only file system
    NFSERR_ROFS = 30,
    /// Filename too long
    NFSERR_NAMETOOLONG = 63,
    /// Directory not empty
    NFSERR_NOTEMPTY = 66,
    /// Quota hard limit exceeded
    NFSERR_DQUOT = 69,
    /// Invalid file handle
    NFSERR_STALE = 70,
    /// Write cache was flushed to disk
    NFSERR_WFLUSH = 99,
}
SerializeEnum!(nfsstat2);
DeserializeEnum!(nfsstat2);

/// File type (RFC 1094 §2.3.2). Version 2 folds every special file into
/// NFNON from the protocol's point of view; the extended values match the
/// historical implementation practice.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype2 {
    /// Not a file
    #[default]
    NFNON = 0,
    /// Regular file
    NFREG = 1,
    /// Directory
    NFDIR = 2,
    /// Block special device
    NFBLK = 3,
    /// Character special device
    NFCHR = 4,
    /// Symbolic link
    NFLNK = 5,
}
SerializeEnum!(ftype2);
DeserializeEnum!(ftype2);

/// Timestamp: seconds and microseconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct timeval2 {
    pub seconds: u32,
    pub useconds: u32,
}
DeserializeStruct!(timeval2, seconds, useconds);
SerializeStruct!(timeval2, seconds, useconds);

/// Complete file attributes (RFC 1094 §2.3.5), all counters 32 bits wide.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr2 {
    /// Object type
    pub ftype: ftype2,
    /// Permission bits
    pub mode: u32,
    /// Number of hard links
    pub nlink: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Size in bytes
    pub size: u32,
    /// Preferred block size for I/O
    pub blocksize: u32,
    /// Device number of a special file
    pub rdev: u32,
    /// Number of 512-byte blocks allocated
    pub blocks: u32,
    /// File system identifier
    pub fsid: u32,
    /// File identifier (inode number)
    pub fileid: u32,
    /// Last data access
    pub atime: timeval2,
    /// Last data modification
    pub mtime: timeval2,
    /// Last attribute change
    pub ctime: timeval2,
}
DeserializeStruct!(
    fattr2, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);
SerializeStruct!(
    fattr2, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);

/// Settable attributes (RFC 1094 §2.3.6). A value of `u32::MAX` (or a
/// timestamp with both fields `u32::MAX`) means "do not change".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct sattr2 {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub atime: timeval2,
    pub mtime: timeval2,
}
DeserializeStruct!(sattr2, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr2, mode, uid, gid, size, atime, mtime);

/// The "do not change" sentinel for [`sattr2`] fields.
pub const SATTR2_UNSET: u32 = u32::MAX;

impl Default for sattr2 {
    fn default() -> sattr2 {
        sattr2 {
            mode: SATTR2_UNSET,
            uid: SATTR2_UNSET,
            gid: SATTR2_UNSET,
            size: SATTR2_UNSET,
            atime: timeval2 { seconds: SATTR2_UNSET, useconds: SATTR2_UNSET },
            mtime: timeval2 { seconds: SATTR2_UNSET, useconds: SATTR2_UNSET },
        }
    }
}

impl sattr2 {
    /// True when the timestamp carries a real value rather than the
    /// "do not change" sentinel.
    pub fn time_is_set(time: &timeval2) -> bool {
        time.seconds != SATTR2_UNSET
    }
}

/// A directory handle plus a name within it.
#[derive(Clone, Debug, Default)]
pub struct diropargs2 {
    /// Directory file handle
    pub dir: fhandle2,
    /// Name within the directory
    pub name: filename2,
}
DeserializeStruct!(diropargs2, dir, name);
SerializeStruct!(diropargs2, dir, name);

/// Successful body of a directory operation result: the object's handle
/// and attributes.
#[derive(Clone, Debug, Default)]
pub struct diropok2 {
    pub file: fhandle2,
    pub attributes: fattr2,
}
DeserializeStruct!(diropok2, file, attributes);
SerializeStruct!(diropok2, file, attributes);

/// Arguments for SETATTR (procedure 2).
#[derive(Clone, Debug, Default)]
pub struct sattrargs2 {
    pub file: fhandle2,
    pub attributes: sattr2,
}
DeserializeStruct!(sattrargs2, file, attributes);
SerializeStruct!(sattrargs2, file, attributes);

/// Arguments for READ (procedure 6). `totalcount` is unused per RFC 1094.
#[derive(Clone, Debug, Default)]
pub struct readargs2 {
    pub file: fhandle2,
    pub offset: u32,
    pub count: u32,
    pub totalcount: u32,
}
DeserializeStruct!(readargs2, file, offset, count, totalcount);
SerializeStruct!(readargs2, file, offset, count, totalcount);

/// Arguments for WRITE (procedure 8). `beginoffset` and `totalcount` are
/// unused per RFC 1094.
#[derive(Clone, Debug, Default)]
pub struct writeargs2 {
    pub file: fhandle2,
    pub beginoffset: u32,
    pub offset: u32,
    pub totalcount: u32,
    pub data: Vec<u8>,
}
DeserializeStruct!(writeargs2, file, beginoffset, offset, totalcount, data);
SerializeStruct!(writeargs2, file, beginoffset, offset, totalcount, data);

/// Arguments for CREATE (9) and MKDIR (14).
#[derive(Clone, Debug, Default)]
pub struct createargs2 {
    pub where_dir: diropargs2,
    pub attributes: sattr2,
}
DeserializeStruct!(createargs2, where_dir, attributes);
SerializeStruct!(createargs2, where_dir, attributes);

/// Arguments for RENAME (procedure 11).
#[derive(Clone, Debug, Default)]
pub struct renameargs2 {
    pub from: diropargs2,
    pub to: diropargs2,
}
DeserializeStruct!(renameargs2, from, to);
SerializeStruct!(renameargs2, from, to);

/// Arguments for LINK (procedure 12).
#[derive(Clone, Debug, Default)]
pub struct linkargs2 {
    pub from: fhandle2,
    pub to: diropargs2,
}
DeserializeStruct!(linkargs2, from, to);
SerializeStruct!(linkargs2, from, to);

/// Arguments for SYMLINK (procedure 13).
#[derive(Clone, Debug, Default)]
pub struct symlinkargs2 {
    pub from: diropargs2,
    pub to: path2,
    pub attributes: sattr2,
}
DeserializeStruct!(symlinkargs2, from, to, attributes);
SerializeStruct!(symlinkargs2, from, to, attributes);

/// Arguments for READDIR (procedure 16).
#[derive(Clone, Debug, Default)]
pub struct readdirargs2 {
    pub dir: fhandle2,
    pub cookie: nfscookie2,
    pub count: u32,
}
DeserializeStruct!(readdirargs2, dir, cookie, count);
SerializeStruct!(readdirargs2, dir, cookie, count);

/// One READDIR entry. The linked-list chaining flag and the final eof
/// flag are emitted by the handler.
#[derive(Clone, Debug, Default)]
pub struct entry2 {
    pub fileid: u32,
    pub name: filename2,
    pub cookie: nfscookie2,
}
DeserializeStruct!(entry2, fileid, name, cookie);
SerializeStruct!(entry2, fileid, name, cookie);

/// Successful STATFS body (procedure 17).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct statfsok2 {
    /// Optimum transfer size in bytes
    pub tsize: u32,
    /// Block size of the file system
    pub bsize: u32,
    /// Total number of blocks
    pub blocks: u32,
    /// Number of free blocks
    pub bfree: u32,
    /// Number of free blocks available to the caller
    pub bavail: u32,
}
DeserializeStruct!(statfsok2, tsize, bsize, blocks, bfree, bavail);
SerializeStruct!(statfsok2, tsize, bsize, blocks, bfree, bavail);

/// Procedure numbers for the NFS version 2 protocol.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum NfsProcedure2 {
    NFSPROC_NULL = 0,
    NFSPROC_GETATTR = 1,
    NFSPROC_SETATTR = 2,
    NFSPROC_ROOT = 3,
    NFSPROC_LOOKUP = 4,
    NFSPROC_READLINK = 5,
    NFSPROC_READ = 6,
    NFSPROC_WRITECACHE = 7,
    NFSPROC_WRITE = 8,
    NFSPROC_CREATE = 9,
    NFSPROC_REMOVE = 10,
    NFSPROC_RENAME = 11,
    NFSPROC_LINK = 12,
    NFSPROC_SYMLINK = 13,
    NFSPROC_MKDIR = 14,
    NFSPROC_RMDIR = 15,
    NFSPROC_READDIR = 16,
    NFSPROC_STATFS = 17,
    INVALID = 18,
}

/// Maps a version 3 status onto the version 2 status space. Values with
/// no version 2 equivalent degrade to the closest legal code.
impl From<super::nfs3::nfsstat3> for nfsstat2 {
    fn from(stat: super::nfs3::nfsstat3) -> nfsstat2 {
        use super::nfs3::nfsstat3 as s3;
        match stat {
            s3::NFS3_OK => nfsstat2::NFS_OK,
            s3::NFS3ERR_PERM => nfsstat2::NFSERR_PERM,
            s3::NFS3ERR_NOENT => nfsstat2::NFSERR_NOENT,
            s3::NFS3ERR_IO => nfsstat2::NFSERR_IO,
            s3::NFS3ERR_NXIO => nfsstat2::NFSERR_NXIO,
            s3::NFS3ERR_ACCES => nfsstat2::NFSERR_ACCES,
            s3::NFS3ERR_EXIST => nfsstat2::NFSERR_EXIST,
            s3::NFS3ERR_NODEV => nfsstat2::NFSERR_NODEV,
            s3::NFS3ERR_NOTDIR => nfsstat2::NFSERR_NOTDIR,
            s3::NFS3ERR_ISDIR => nfsstat2::NFSERR_ISDIR,
            s3::NFS3ERR_FBIG => nfsstat2::NFSERR_FBIG,
            s3::NFS3ERR_NOSPC => nfsstat2::NFSERR_NOSPC,
            s3::NFS3ERR_ROFS => nfsstat2::NFSERR_ROFS,
            s3::NFS3ERR_NAMETOOLONG => nfsstat2::NFSERR_NAMETOOLONG,
            s3::NFS3ERR_NOTEMPTY => nfsstat2::NFSERR_NOTEMPTY,
            s3::NFS3ERR_DQUOT => nfsstat2::NFSERR_DQUOT,
            s3::NFS3ERR_STALE | s3::NFS3ERR_BADHANDLE => nfsstat2::NFSERR_STALE,
            // XDEV, MLINK, INVAL and the 10xxx family have no v2 slot
            _ => nfsstat2::NFSERR_IO,
        }
    }
}
