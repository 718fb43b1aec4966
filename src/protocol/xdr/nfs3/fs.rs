//! XDR result shapes for the NFSv3 file system information operations:
//! FSSTAT (procedure 18), FSINFO (19) and PATHCONF (20), as defined in
//! RFC 1813.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use crate::xdr::{Deserialize, DeserializeStruct, Serialize, SerializeStruct};

use super::*;

/// FSINFO properties bit: hard links are supported.
pub const FSF_LINK: u32 = 0x0001;
/// FSINFO properties bit: symbolic links are supported.
pub const FSF_SYMLINK: u32 = 0x0002;
/// FSINFO properties bit: pathconf values are the same for all files.
pub const FSF_HOMOGENEOUS: u32 = 0x0008;
/// FSINFO properties bit: SETATTR can set file times.
pub const FSF_CANSETTIME: u32 = 0x0010;

/// Successful FSINFO result (RFC 1813 §3.3.19).
#[derive(Debug, Default)]
pub struct fsinfo3 {
    /// Attributes of the object the call was made against
    pub obj_attributes: post_op_attr,
    /// Maximum READ request size honored
    pub rtmax: u32,
    /// Preferred READ request size
    pub rtpref: u32,
    /// Suggested multiple for READ request sizes
    pub rtmult: u32,
    /// Maximum WRITE request size honored
    pub wtmax: u32,
    /// Preferred WRITE request size
    pub wtpref: u32,
    /// Suggested multiple for WRITE request sizes
    pub wtmult: u32,
    /// Preferred READDIR request size
    pub dtpref: u32,
    /// Maximum file size on this file system
    pub maxfilesize: size3,
    /// Server time granularity
    pub time_delta: nfstime3,
    /// FSF_* property bits
    pub properties: u32,
}
DeserializeStruct!(
    fsinfo3,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);
SerializeStruct!(
    fsinfo3,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);

/// Successful FSSTAT result (RFC 1813 §3.3.18).
#[derive(Debug, Default)]
pub struct FSSTAT3resok {
    /// Attributes of the object the call was made against
    pub obj_attributes: post_op_attr,
    /// Total bytes on the file system
    pub tbytes: size3,
    /// Free bytes
    pub fbytes: size3,
    /// Free bytes available to the caller
    pub abytes: size3,
    /// Total file slots
    pub tfiles: size3,
    /// Free file slots
    pub ffiles: size3,
    /// Free file slots available to the caller
    pub afiles: size3,
    /// Seconds the caller can expect these values to stay valid
    pub invarsec: u32,
}
DeserializeStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);
SerializeStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);

/// Successful PATHCONF result (RFC 1813 §3.3.20).
#[derive(Debug, Default)]
pub struct PATHCONF3resok {
    /// Attributes of the object the call was made against
    pub obj_attributes: post_op_attr,
    /// Maximum number of hard links to an object
    pub linkmax: u32,
    /// Maximum length of a filename component
    pub name_max: u32,
    /// True when names longer than name_max are rejected, not truncated
    pub no_trunc: bool,
    /// True when chown is restricted to the privileged user
    pub chown_restricted: bool,
    /// True when the server treats names case-insensitively
    pub case_insensitive: bool,
    /// True when the server preserves name case
    pub case_preserving: bool,
}
DeserializeStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
SerializeStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
