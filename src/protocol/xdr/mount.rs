//! MOUNT version 3 protocol wire types (RFC 1813 Appendix I). Clients use
//! MOUNT to obtain the root file handle of an export before issuing NFS
//! calls, and to enumerate what the server exports.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum, SerializeStruct,
};

/// MOUNT RPC program number.
pub const PROGRAM: u32 = 100005;
/// MOUNT RPC version number served here.
pub const VERSION: u32 = 3;

/// Maximum bytes in a dirpath argument (RFC 1813 Appendix I).
pub const MNTPATHLEN: usize = 1024;
/// Maximum bytes in a name argument.
pub const MNTNAMLEN: usize = 255;
/// Maximum bytes in a version 3 file handle.
pub const FHSIZE3: usize = 64;

/// A directory path argument, an XDR string.
pub type dirpath = Vec<u8>;
/// A client or group name.
pub type name = Vec<u8>;

/// Status codes returned by MOUNT version 3 procedures.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum mountstat3 {
    /// No error
    #[default]
    MNT3_OK = 0,
    /// Not owner
    MNT3ERR_PERM = 1,
    /// No such file or directory
    MNT3ERR_NOENT = 2,
    /// I/O error
    MNT3ERR_IO = 5,
    /// Permission denied
    MNT3ERR_ACCES = 13,
    /// Not a directory
    MNT3ERR_NOTDIR = 20,
    /// Invalid argument
    MNT3ERR_INVAL = 22,
    /// Filename too long
    MNT3ERR_NAMETOOLONG = 63,
    /// Operation not supported
    MNT3ERR_NOTSUPP = 10004,
    /// A failure on the server
    MNT3ERR_SERVERFAULT = 10006,
}
SerializeEnum!(mountstat3);
DeserializeEnum!(mountstat3);

/// Successful MNT result: the export's root file handle and the
/// authentication flavors the server accepts for it.
#[derive(Clone, Debug, Default)]
pub struct mountres3_ok {
    /// NFSv3 file handle of the export root
    pub fhandle: Vec<u8>,
    /// Acceptable auth flavors, in server preference order
    pub auth_flavors: Vec<u32>,
}
DeserializeStruct!(mountres3_ok, fhandle, auth_flavors);
SerializeStruct!(mountres3_ok, fhandle, auth_flavors);

/// One node of the mount list returned by DUMP.
#[derive(Clone, Debug, Default)]
pub struct mountbody {
    /// Hostname of the mounting client
    pub ml_hostname: name,
    /// Directory the client mounted
    pub ml_directory: dirpath,
    /// The rest of the list
    pub ml_next: Option<Box<mountbody>>,
}
DeserializeStruct!(mountbody, ml_hostname, ml_directory, ml_next);
SerializeStruct!(mountbody, ml_hostname, ml_directory, ml_next);

/// One node of a group list attached to an export node.
#[derive(Clone, Debug, Default)]
pub struct groupnode {
    /// Name of the group (a client spec)
    pub gr_name: name,
    /// The rest of the list
    pub gr_next: Option<Box<groupnode>>,
}
DeserializeStruct!(groupnode, gr_name, gr_next);
SerializeStruct!(groupnode, gr_name, gr_next);

/// One node of the export list returned by EXPORT.
#[derive(Clone, Debug, Default)]
pub struct exportnode {
    /// Exported directory
    pub ex_dir: dirpath,
    /// Client specs allowed to mount it
    pub ex_groups: Option<Box<groupnode>>,
    /// The rest of the list
    pub ex_next: Option<Box<exportnode>>,
}
DeserializeStruct!(exportnode, ex_dir, ex_groups, ex_next);
SerializeStruct!(exportnode, ex_dir, ex_groups, ex_next);

/// Procedure numbers for the MOUNT version 3 service.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum MountProcedure {
    /// Do nothing
    MOUNTPROC3_NULL = 0,
    /// Mount an export, returning its root file handle
    MOUNTPROC3_MNT = 1,
    /// List mounted clients
    MOUNTPROC3_DUMP = 2,
    /// Remove one mount entry for the calling client
    MOUNTPROC3_UMNT = 3,
    /// Remove all mount entries for the calling client
    MOUNTPROC3_UMNTALL = 4,
    /// List the export table
    MOUNTPROC3_EXPORT = 5,
    /// Sentinel for unknown procedure numbers
    INVALID,
}
SerializeEnum!(MountProcedure);
DeserializeEnum!(MountProcedure);
