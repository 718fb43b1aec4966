//! Virtual File System (VFS) adapter: the uniform filesystem primitives
//! the NFS procedure handlers are written against, and [`LocalFs`], the
//! implementation over a local directory tree.
//!
//! The adapter is deliberately path-based and stateless: the handle table
//! owns the mapping from wire handles to paths, the export gate owns
//! authorization, and the VFS only turns a path plus an operation into
//! filesystem effects. Errors are plain `io::Error`s; the per-version
//! status translation lives in `fs_util`.
//!
//! Operations never follow a symbolic link at the target position
//! (`stat` is an lstat), matching what the protocol expects: clients
//! resolve symlinks themselves via READLINK.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// What kind of object a path refers to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FileKind {
    #[default]
    Regular,
    Directory,
    Symlink,
    BlockDevice,
    CharDevice,
    Socket,
    Fifo,
}

/// A timestamp in seconds and nanoseconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeSpec {
    pub seconds: u32,
    pub nseconds: u32,
}

/// Protocol-agnostic file attributes; `fs_util` converts these into the
/// per-version wire shapes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub kind: FileKind,
    /// Permission bits (the low 12 bits of st_mode)
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Bytes actually allocated on disk
    pub used: u64,
    /// Major and minor device numbers for special files
    pub rdev: (u32, u32),
    /// File system identifier (device number)
    pub fsid: u64,
    /// File identifier (inode number)
    pub fileid: u64,
    pub atime: TimeSpec,
    pub mtime: TimeSpec,
    pub ctime: TimeSpec,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// One directory entry: the inode number and the raw name bytes.
#[derive(Clone, Debug)]
pub struct VfsDirEntry {
    pub fileid: u64,
    pub name: Vec<u8>,
}

/// Durability requested for a write.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stability {
    /// May be buffered; made durable by a later COMMIT
    #[default]
    Unstable,
    /// File data flushed before the reply
    DataSync,
    /// File data and metadata flushed before the reply
    FileSync,
}

/// File system capacity numbers reported by FSSTAT/STATFS.
#[derive(Copy, Clone, Debug)]
pub struct FsStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub avail_bytes: u64,
    pub total_files: u64,
    pub free_files: u64,
    pub avail_files: u64,
}

impl Default for FsStats {
    fn default() -> FsStats {
        // synthesized capacity; the local adapter has no portable statvfs
        FsStats {
            total_bytes: 1 << 40,
            free_bytes: 1 << 39,
            avail_bytes: 1 << 39,
            total_files: 1 << 24,
            free_files: 1 << 23,
            avail_files: 1 << 23,
        }
    }
}

/// The filesystem primitives the procedure handlers drive.
///
/// Paths handed to these methods come from the file-handle table and have
/// already passed the export gate; implementations do not re-authorize.
#[async_trait]
pub trait Vfs: Send + Sync {
    /// Attributes of a path without following a trailing symlink.
    async fn stat(&self, path: &Path) -> std::io::Result<FileInfo>;

    /// Reads up to `count` bytes at `offset`. The flag is true when the
    /// read reached end of file.
    async fn read(&self, path: &Path, offset: u64, count: u32)
        -> std::io::Result<(Vec<u8>, bool)>;

    /// Writes `data` at `offset` with the requested durability, returning
    /// the durability actually achieved (never weaker than requested).
    async fn write(
        &self,
        path: &Path,
        offset: u64,
        data: &[u8],
        stability: Stability,
    ) -> std::io::Result<Stability>;

    /// Creates a regular file. With `exclusive`, an existing file is an
    /// `AlreadyExists` error; otherwise it is reused.
    async fn create(&self, path: &Path, mode: u32, exclusive: bool) -> std::io::Result<FileInfo>;

    /// Truncates or extends a file to `size` bytes.
    async fn truncate(&self, path: &Path, size: u64) -> std::io::Result<()>;

    /// Changes permission bits.
    async fn set_mode(&self, path: &Path, mode: u32) -> std::io::Result<()>;

    /// Changes owner and/or group.
    async fn set_owner(
        &self,
        path: &Path,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> std::io::Result<()>;

    /// Changes access and/or modification times; `None` keeps the
    /// current value.
    async fn set_times(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> std::io::Result<()>;

    /// Creates a directory.
    async fn mkdir(&self, path: &Path, mode: u32) -> std::io::Result<FileInfo>;

    /// Removes an empty directory.
    async fn rmdir(&self, path: &Path) -> std::io::Result<()>;

    /// Removes a non-directory object.
    async fn remove(&self, path: &Path) -> std::io::Result<()>;

    /// Atomically renames within one filesystem.
    async fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Creates a symbolic link at `path` pointing at `target`.
    async fn symlink(&self, path: &Path, target: &Path) -> std::io::Result<FileInfo>;

    /// Reads the target of a symbolic link.
    async fn readlink(&self, path: &Path) -> std::io::Result<PathBuf>;

    /// Creates a hard link at `link` to the existing file.
    async fn link(&self, existing: &Path, link: &Path) -> std::io::Result<()>;

    /// The complete listing of a directory, sorted by name. Pagination
    /// and byte budgeting belong to the protocol handlers.
    async fn readdir(&self, path: &Path) -> std::io::Result<Vec<VfsDirEntry>>;

    /// Flushes a file's data and metadata to stable storage.
    async fn fsync(&self, path: &Path) -> std::io::Result<()>;

    /// Capacity numbers for the filesystem holding `path`.
    async fn statfs(&self, path: &Path) -> std::io::Result<FsStats>;
}

/// The adapter over a local directory tree, backed by `tokio::fs`.
#[derive(Debug, Default)]
pub struct LocalFs {
    fs_stats: FsStats,
}

impl LocalFs {
    pub fn new() -> LocalFs {
        LocalFs::default()
    }

    /// Overrides the synthesized capacity numbers.
    pub fn with_fs_stats(fs_stats: FsStats) -> LocalFs {
        LocalFs { fs_stats }
    }
}

#[cfg(unix)]
fn split_rdev(rdev: u64) -> (u32, u32) {
    // glibc encoding of dev_t
    let major = ((rdev >> 8) & 0xfff) as u32 | ((rdev >> 32) & !0xfff) as u32;
    let minor = (rdev & 0xff) as u32 | ((rdev >> 12) & !0xff) as u32;
    (major, minor)
}

#[cfg(unix)]
fn file_info_from(metadata: &std::fs::Metadata) -> FileInfo {
    use std::os::unix::fs::MetadataExt;

    let ftype = metadata.file_type();
    let kind = if ftype.is_dir() {
        FileKind::Directory
    } else if ftype.is_symlink() {
        FileKind::Symlink
    } else if ftype.is_file() {
        FileKind::Regular
    } else {
        use std::os::unix::fs::FileTypeExt;
        if ftype.is_block_device() {
            FileKind::BlockDevice
        } else if ftype.is_char_device() {
            FileKind::CharDevice
        } else if ftype.is_socket() {
            FileKind::Socket
        } else {
            FileKind::Fifo
        }
    };

    let timespec = |secs: i64, nsecs: i64| TimeSpec {
        seconds: secs.max(0) as u32,
        nseconds: nsecs.max(0) as u32,
    };

    FileInfo {
        kind,
        mode: metadata.mode() & 0o7777,
        nlink: metadata.nlink() as u32,
        uid: metadata.uid(),
        gid: metadata.gid(),
        size: metadata.len(),
        used: metadata.blocks() * 512,
        rdev: split_rdev(metadata.rdev()),
        fsid: metadata.dev(),
        fileid: metadata.ino(),
        atime: timespec(metadata.atime(), metadata.atime_nsec()),
        mtime: timespec(metadata.mtime(), metadata.mtime_nsec()),
        ctime: timespec(metadata.ctime(), metadata.ctime_nsec()),
    }
}

#[async_trait]
impl Vfs for LocalFs {
    async fn stat(&self, path: &Path) -> std::io::Result<FileInfo> {
        let metadata = tokio::fs::symlink_metadata(path).await?;
        Ok(file_info_from(&metadata))
    }

    async fn read(
        &self,
        path: &Path,
        offset: u64,
        count: u32,
    ) -> std::io::Result<(Vec<u8>, bool)> {
        let mut file = File::open(path).await?;
        let len = file.metadata().await?.len();
        if offset >= len {
            return Ok((Vec::new(), true));
        }
        file.seek(SeekFrom::Start(offset)).await?;
        let wanted = count.min((len - offset).min(u32::MAX as u64) as u32) as usize;
        let mut data = vec![0u8; wanted];
        let mut filled = 0;
        while filled < wanted {
            let n = file.read(&mut data[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        let eof = offset + filled as u64 >= len;
        Ok((data, eof))
    }

    async fn write(
        &self,
        path: &Path,
        offset: u64,
        data: &[u8],
        stability: Stability,
    ) -> std::io::Result<Stability> {
        let mut file = OpenOptions::new().write(true).open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        match stability {
            Stability::Unstable => {
                file.flush().await?;
                Ok(Stability::Unstable)
            }
            Stability::DataSync => {
                file.sync_data().await?;
                Ok(Stability::DataSync)
            }
            Stability::FileSync => {
                file.sync_all().await?;
                Ok(Stability::FileSync)
            }
        }
    }

    async fn create(&self, path: &Path, mode: u32, exclusive: bool) -> std::io::Result<FileInfo> {
        let mut options = OpenOptions::new();
        options.write(true);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        let file = options.open(path).await?;
        let metadata = file.metadata().await?;
        debug!("created {:?} mode {:o}", path, mode);
        Ok(file_info_from(&metadata))
    }

    async fn truncate(&self, path: &Path, size: u64) -> std::io::Result<()> {
        let file = OpenOptions::new().write(true).open(path).await?;
        file.set_len(size).await
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> std::io::Result<()> {
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).await
    }

    async fn set_owner(
        &self,
        path: &Path,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> std::io::Result<()> {
        std::os::unix::fs::chown(path, uid, gid)
    }

    async fn set_times(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> std::io::Result<()> {
        use filetime::FileTime;

        let current = tokio::fs::symlink_metadata(path).await?;
        let atime = match atime {
            Some(t) => FileTime::from_system_time(t),
            None => FileTime::from_last_access_time(&current),
        };
        let mtime = match mtime {
            Some(t) => FileTime::from_system_time(t),
            None => FileTime::from_last_modification_time(&current),
        };
        filetime::set_file_times(path, atime, mtime)
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> std::io::Result<FileInfo> {
        tokio::fs::create_dir(path).await?;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        self.stat(path).await
    }

    async fn rmdir(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_dir(path).await
    }

    async fn remove(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn symlink(&self, path: &Path, target: &Path) -> std::io::Result<FileInfo> {
        tokio::fs::symlink(target, path).await?;
        self.stat(path).await
    }

    async fn readlink(&self, path: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::read_link(path).await
    }

    async fn link(&self, existing: &Path, link: &Path) -> std::io::Result<()> {
        tokio::fs::hard_link(existing, link).await
    }

    async fn readdir(&self, path: &Path) -> std::io::Result<Vec<VfsDirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            entries.push(VfsDirEntry {
                fileid: entry.ino(),
                name: entry.file_name().as_bytes().to_vec(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn fsync(&self, path: &Path) -> std::io::Result<()> {
        let file = File::open(path).await?;
        file.sync_all().await
    }

    async fn statfs(&self, _path: &Path) -> std::io::Result<FsStats> {
        Ok(self.fs_stats)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_past_eof_is_empty_with_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let fs = LocalFs::new();
        let (data, eof) = fs.read(&path, 100, 10).await.unwrap();
        assert!(data.is_empty());
        assert!(eof);

        let (data, eof) = fs.read(&path, 0, 5).await.unwrap();
        assert_eq!(data, b"hello");
        assert!(eof);

        let (data, eof) = fs.read(&path, 0, 3).await.unwrap();
        assert_eq!(data, b"hel");
        assert!(!eof);
    }

    #[tokio::test]
    async fn write_at_offset_extends_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let fs = LocalFs::new();
        fs.create(&path, 0o644, false).await.unwrap();
        fs.write(&path, 0, b"hello", Stability::FileSync).await.unwrap();
        // append at the current size
        fs.write(&path, 5, b" world", Stability::FileSync).await.unwrap();
        let info = fs.stat(&path).await.unwrap();
        assert_eq!(info.size, 11);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn readdir_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new();
        for name in ["zebra", "alpha", "mid"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        let entries = fs.readdir(dir.path()).await.unwrap();
        let names: Vec<_> =
            entries.iter().map(|e| String::from_utf8(e.name.clone()).unwrap()).collect();
        assert_eq!(names, ["alpha", "mid", "zebra"]);
        assert!(entries.iter().all(|e| e.fileid != 0));
    }

    #[tokio::test]
    async fn exclusive_create_fails_on_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        let fs = LocalFs::new();
        fs.create(&path, 0o644, true).await.unwrap();
        let err = fs.create(&path, 0o644, true).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        // unchecked create reuses the file
        fs.create(&path, 0o644, false).await.unwrap();
    }

    #[tokio::test]
    async fn symlink_and_readlink() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new();
        let link = dir.path().join("link");
        fs.symlink(&link, Path::new("target/elsewhere")).await.unwrap();
        let info = fs.stat(&link).await.unwrap();
        assert_eq!(info.kind, FileKind::Symlink);
        assert_eq!(fs.readlink(&link).await.unwrap(), PathBuf::from("target/elsewhere"));
    }
}
