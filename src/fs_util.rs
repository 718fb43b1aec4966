//! Helpers bridging [`crate::vfs::FileInfo`] and the per-version wire
//! attribute shapes, plus the central `io::Error` to NFS status
//! translation used by every procedure handler.

use crate::protocol::xdr::nfs2;
use crate::protocol::xdr::nfs3;
use crate::protocol::xdr::nfs4;
use crate::vfs::{FileInfo, FileKind};

/// Converts adapter attributes into the version 3 wire shape.
pub fn fattr3_from(info: &FileInfo) -> nfs3::fattr3 {
    nfs3::fattr3 {
        ftype: match info.kind {
            FileKind::Regular => nfs3::ftype3::NF3REG,
            FileKind::Directory => nfs3::ftype3::NF3DIR,
            FileKind::BlockDevice => nfs3::ftype3::NF3BLK,
            FileKind::CharDevice => nfs3::ftype3::NF3CHR,
            FileKind::Symlink => nfs3::ftype3::NF3LNK,
            FileKind::Socket => nfs3::ftype3::NF3SOCK,
            FileKind::Fifo => nfs3::ftype3::NF3FIFO,
        },
        mode: info.mode,
        nlink: info.nlink,
        uid: info.uid,
        gid: info.gid,
        size: info.size,
        used: info.used,
        rdev: nfs3::specdata3 { specdata1: info.rdev.0, specdata2: info.rdev.1 },
        fsid: info.fsid,
        fileid: info.fileid,
        atime: nfs3::nfstime3 { seconds: info.atime.seconds, nseconds: info.atime.nseconds },
        mtime: nfs3::nfstime3 { seconds: info.mtime.seconds, nseconds: info.mtime.nseconds },
        ctime: nfs3::nfstime3 { seconds: info.ctime.seconds, nseconds: info.ctime.nseconds },
    }
}

/// Converts adapter attributes into the fixed-width version 2 shape.
/// 64-bit quantities saturate at the 32-bit limit.
pub fn fattr2_from(info: &FileInfo) -> nfs2::fattr2 {
    let clamp = |v: u64| v.min(u32::MAX as u64) as u32;
    nfs2::fattr2 {
        ftype: match info.kind {
            FileKind::Regular => nfs2::ftype2::NFREG,
            FileKind::Directory => nfs2::ftype2::NFDIR,
            FileKind::BlockDevice => nfs2::ftype2::NFBLK,
            FileKind::CharDevice => nfs2::ftype2::NFCHR,
            FileKind::Symlink => nfs2::ftype2::NFLNK,
            FileKind::Socket | FileKind::Fifo => nfs2::ftype2::NFNON,
        },
        mode: info.mode
            | match info.kind {
                // v2 carries the file type in the mode word too
                FileKind::Regular => 0o100000,
                FileKind::Directory => 0o040000,
                FileKind::BlockDevice => 0o060000,
                FileKind::CharDevice => 0o020000,
                FileKind::Symlink => 0o120000,
                FileKind::Socket => 0o140000,
                FileKind::Fifo => 0o010000,
            },
        nlink: info.nlink,
        uid: info.uid,
        gid: info.gid,
        size: clamp(info.size),
        blocksize: 4096,
        rdev: (info.rdev.0 << 8) | (info.rdev.1 & 0xff),
        blocks: clamp(info.used / 512),
        fsid: clamp(info.fsid),
        fileid: clamp(info.fileid),
        atime: nfs2::timeval2 { seconds: info.atime.seconds, useconds: info.atime.nseconds / 1000 },
        mtime: nfs2::timeval2 { seconds: info.mtime.seconds, useconds: info.mtime.nseconds / 1000 },
        ctime: nfs2::timeval2 { seconds: info.ctime.seconds, useconds: info.ctime.nseconds / 1000 },
    }
}

/// Maps adapter file kinds onto the version 4 type enum.
pub fn ftype4_from(kind: FileKind) -> nfs4::nfs_ftype4 {
    match kind {
        FileKind::Regular => nfs4::nfs_ftype4::NF4REG,
        FileKind::Directory => nfs4::nfs_ftype4::NF4DIR,
        FileKind::BlockDevice => nfs4::nfs_ftype4::NF4BLK,
        FileKind::CharDevice => nfs4::nfs_ftype4::NF4CHR,
        FileKind::Symlink => nfs4::nfs_ftype4::NF4LNK,
        FileKind::Socket => nfs4::nfs_ftype4::NF4SOCK,
        FileKind::Fifo => nfs4::nfs_ftype4::NF4FIFO,
    }
}

// Raw errno values used for errors io::ErrorKind does not name on every
// toolchain this crate supports.
const EXDEV: i32 = 18;
const EMLINK: i32 = 31;
const ENAMETOOLONG: i32 = 36;
const ENOTEMPTY: i32 = 39;
const EDQUOT: i32 = 122;
const ESTALE: i32 = 116;

/// Translates a filesystem error into the version 3 status space. The
/// version 2 and 4 handlers derive their statuses from this one.
pub fn nfsstat3_from_io(err: &std::io::Error) -> nfs3::nfsstat3 {
    use std::io::ErrorKind;

    if let Some(errno) = err.raw_os_error() {
        match errno {
            1 => return nfs3::nfsstat3::NFS3ERR_PERM,
            2 => return nfs3::nfsstat3::NFS3ERR_NOENT,
            5 => return nfs3::nfsstat3::NFS3ERR_IO,
            6 => return nfs3::nfsstat3::NFS3ERR_NXIO,
            13 => return nfs3::nfsstat3::NFS3ERR_ACCES,
            17 => return nfs3::nfsstat3::NFS3ERR_EXIST,
            EXDEV => return nfs3::nfsstat3::NFS3ERR_XDEV,
            19 => return nfs3::nfsstat3::NFS3ERR_NODEV,
            20 => return nfs3::nfsstat3::NFS3ERR_NOTDIR,
            21 => return nfs3::nfsstat3::NFS3ERR_ISDIR,
            22 => return nfs3::nfsstat3::NFS3ERR_INVAL,
            27 => return nfs3::nfsstat3::NFS3ERR_FBIG,
            28 => return nfs3::nfsstat3::NFS3ERR_NOSPC,
            30 => return nfs3::nfsstat3::NFS3ERR_ROFS,
            EMLINK => return nfs3::nfsstat3::NFS3ERR_MLINK,
            ENAMETOOLONG => return nfs3::nfsstat3::NFS3ERR_NAMETOOLONG,
            ENOTEMPTY => return nfs3::nfsstat3::NFS3ERR_NOTEMPTY,
            EDQUOT => return nfs3::nfsstat3::NFS3ERR_DQUOT,
            ESTALE => return nfs3::nfsstat3::NFS3ERR_STALE,
            _ => {}
        }
    }
    match err.kind() {
        ErrorKind::NotFound => nfs3::nfsstat3::NFS3ERR_NOENT,
        ErrorKind::PermissionDenied => nfs3::nfsstat3::NFS3ERR_ACCES,
        ErrorKind::AlreadyExists => nfs3::nfsstat3::NFS3ERR_EXIST,
        ErrorKind::InvalidInput => nfs3::nfsstat3::NFS3ERR_INVAL,
        _ => nfs3::nfsstat3::NFS3ERR_IO,
    }
}

/// Translates a version 3 status into the version 4 status space.
pub fn nfsstat4_from(stat: nfs3::nfsstat3) -> nfs4::nfsstat4 {
    use nfs3::nfsstat3 as s3;
    use nfs4::nfsstat4 as s4;
    match stat {
        s3::NFS3_OK => s4::NFS4_OK,
        s3::NFS3ERR_PERM => s4::NFS4ERR_PERM,
        s3::NFS3ERR_NOENT => s4::NFS4ERR_NOENT,
        s3::NFS3ERR_IO => s4::NFS4ERR_IO,
        s3::NFS3ERR_NXIO => s4::NFS4ERR_NXIO,
        s3::NFS3ERR_ACCES => s4::NFS4ERR_ACCESS,
        s3::NFS3ERR_EXIST => s4::NFS4ERR_EXIST,
        s3::NFS3ERR_XDEV => s4::NFS4ERR_XDEV,
        s3::NFS3ERR_NOTDIR => s4::NFS4ERR_NOTDIR,
        s3::NFS3ERR_ISDIR => s4::NFS4ERR_ISDIR,
        s3::NFS3ERR_INVAL => s4::NFS4ERR_INVAL,
        s3::NFS3ERR_FBIG => s4::NFS4ERR_FBIG,
        s3::NFS3ERR_NOSPC => s4::NFS4ERR_NOSPC,
        s3::NFS3ERR_ROFS => s4::NFS4ERR_ROFS,
        s3::NFS3ERR_MLINK => s4::NFS4ERR_MLINK,
        s3::NFS3ERR_NAMETOOLONG => s4::NFS4ERR_NAMETOOLONG,
        s3::NFS3ERR_NOTEMPTY => s4::NFS4ERR_NOTEMPTY,
        s3::NFS3ERR_DQUOT => s4::NFS4ERR_DQUOT,
        s3::NFS3ERR_STALE => s4::NFS4ERR_STALE,
        s3::NFS3ERR_BADHANDLE => s4::NFS4ERR_BADHANDLE,
        s3::NFS3ERR_BAD_COOKIE => s4::NFS4ERR_BAD_COOKIE,
        s3::NFS3ERR_NOTSUPP => s4::NFS4ERR_NOTSUPP,
        s3::NFS3ERR_TOOSMALL => s4::NFS4ERR_TOOSMALL,
        s3::NFS3ERR_BADTYPE => s4::NFS4ERR_BADTYPE,
        s3::NFS3ERR_JUKEBOX => s4::NFS4ERR_DELAY,
        _ => s4::NFS4ERR_SERVERFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::TimeSpec;

    #[test]
    fn fattr2_saturates_wide_values() {
        let info = FileInfo {
            kind: FileKind::Regular,
            mode: 0o644,
            size: u64::MAX,
            fileid: u64::MAX,
            mtime: TimeSpec { seconds: 7, nseconds: 5000 },
            ..FileInfo::default()
        };
        let fattr = fattr2_from(&info);
        assert_eq!(fattr.size, u32::MAX);
        assert_eq!(fattr.fileid, u32::MAX);
        assert_eq!(fattr.mode & 0o170000, 0o100000);
        assert_eq!(fattr.mtime.useconds, 5);
    }

    #[test]
    fn errno_translation() {
        let err = std::io::Error::from_raw_os_error(ENOTEMPTY);
        assert_eq!(nfsstat3_from_io(&err), nfs3::nfsstat3::NFS3ERR_NOTEMPTY);
        let err = std::io::Error::from_raw_os_error(EDQUOT);
        assert_eq!(nfsstat3_from_io(&err), nfs3::nfsstat3::NFS3ERR_DQUOT);
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "x");
        assert_eq!(nfsstat3_from_io(&err), nfs3::nfsstat3::NFS3ERR_NOENT);
    }
}
