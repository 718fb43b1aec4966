//! The file-handle table: the bidirectional mapping between opaque wire
//! handles and filesystem paths.
//!
//! Handles are keyed by a monotonically increasing 64-bit id assigned on
//! first use of a path and never recycled. The path never appears in the
//! handle bytes, so a client cannot forge a handle for an unexported path;
//! at worst it can guess an id, and the export gate still stands between a
//! guessed handle and the filesystem.
//!
//! Wire encodings are version specific and frozen:
//!
//! - NFSv2: 32 bytes; bytes `[0..4)` hold the id as a big-endian u32,
//!   the rest are zero.
//! - NFSv3: 64 bytes; bytes `[0..8)` hold the id as a big-endian u64,
//!   the rest are zero.
//! - NFSv4: a 28-byte body: `{version_tag: u32 = 1, id: u64, 16 zero
//!   bytes}`, carried as a length-prefixed opaque.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::protocol::xdr::nfs2::fhandle2;
use crate::protocol::xdr::nfs3::nfs_fh3;

/// Version tag embedded in every NFSv4 handle issued by this table.
const NFS4_HANDLE_VERSION: u32 = 1;
/// Total body length of an NFSv4 handle.
const NFS4_HANDLE_LEN: usize = 28;

/// Why a presented handle could not be resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// Well-formed handle that this process never issued, or whose object
    /// is gone
    Stale,
    /// Handle bytes that fail structural checks
    BadHandle,
}

#[derive(Default)]
struct Tables {
    by_path: HashMap<PathBuf, u64>,
    by_id: HashMap<u64, PathBuf>,
    next_id: u64,
}

/// Concurrency-safe bidirectional handle table.
pub struct FileHandleTable {
    inner: RwLock<Tables>,
}

impl Default for FileHandleTable {
    fn default() -> Self {
        FileHandleTable::new()
    }
}

impl FileHandleTable {
    pub fn new() -> FileHandleTable {
        // id 0 is never issued so a zeroed handle can never resolve
        FileHandleTable { inner: RwLock::new(Tables { next_id: 1, ..Tables::default() }) }
    }

    /// Returns the id for a path, assigning one on first sight.
    /// Idempotent for a given path within one process lifetime.
    pub fn id_for(&self, path: &Path) -> u64 {
        if let Some(id) = self.inner.read().unwrap().by_path.get(path) {
            return *id;
        }
        let mut tables = self.inner.write().unwrap();
        if let Some(id) = tables.by_path.get(path) {
            return *id;
        }
        let id = tables.next_id;
        tables.next_id += 1;
        tables.by_path.insert(path.to_path_buf(), id);
        tables.by_id.insert(id, path.to_path_buf());
        id
    }

    /// Resolves an id back to its path. Ids never issued are stale.
    pub fn path_for_id(&self, id: u64) -> Result<PathBuf, HandleError> {
        self.inner.read().unwrap().by_id.get(&id).cloned().ok_or(HandleError::Stale)
    }

    /// Number of paths the table has issued handles for.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- NFSv2 ---

    /// Encodes the version 2 handle for a path.
    pub fn fh2_for(&self, path: &Path) -> fhandle2 {
        let id = self.id_for(path);
        let mut handle = [0u8; 32];
        // v2 ids are 32-bit on the wire; the table would need four billion
        // distinct paths to wrap
        handle[0..4].copy_from_slice(&(id as u32).to_be_bytes());
        handle
    }

    /// Decodes a version 2 handle and resolves it.
    pub fn path_for_fh2(&self, handle: &fhandle2) -> Result<PathBuf, HandleError> {
        let id = u32::from_be_bytes(handle[0..4].try_into().unwrap()) as u64;
        self.path_for_id(id)
    }

    // --- NFSv3 ---

    /// Encodes the version 3 handle for a path. Always 64 bytes.
    pub fn fh3_for(&self, path: &Path) -> nfs_fh3 {
        let id = self.id_for(path);
        let mut data = vec![0u8; 64];
        data[0..8].copy_from_slice(&id.to_be_bytes());
        nfs_fh3 { data }
    }

    /// Decodes a version 3 handle and resolves it. Accepts any handle of
    /// 8 to 64 bytes whose leading 8 bytes hold the id.
    pub fn path_for_fh3(&self, handle: &nfs_fh3) -> Result<PathBuf, HandleError> {
        if handle.data.len() < 8 || handle.data.len() > 64 {
            return Err(HandleError::BadHandle);
        }
        let id = u64::from_be_bytes(handle.data[0..8].try_into().unwrap());
        self.path_for_id(id)
    }

    // --- NFSv4 ---

    /// Encodes the version 4 handle body for a path.
    pub fn fh4_for(&self, path: &Path) -> Vec<u8> {
        let id = self.id_for(path);
        let mut data = Vec::with_capacity(NFS4_HANDLE_LEN);
        data.extend_from_slice(&NFS4_HANDLE_VERSION.to_be_bytes());
        data.extend_from_slice(&id.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    /// Decodes a version 4 handle body and resolves it. A zero-length
    /// handle is stale per the protocol contract; anything else that is
    /// not a tagged 28-byte body is structurally bad.
    pub fn path_for_fh4(&self, handle: &[u8]) -> Result<PathBuf, HandleError> {
        if handle.is_empty() {
            return Err(HandleError::Stale);
        }
        if handle.len() != NFS4_HANDLE_LEN {
            return Err(HandleError::BadHandle);
        }
        let tag = u32::from_be_bytes(handle[0..4].try_into().unwrap());
        if tag != NFS4_HANDLE_VERSION {
            return Err(HandleError::BadHandle);
        }
        let id = u64::from_be_bytes(handle[4..12].try_into().unwrap());
        self.path_for_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_distinct() {
        let table = FileHandleTable::new();
        let a = table.id_for(Path::new("/srv/export/a"));
        let b = table.id_for(Path::new("/srv/export/b"));
        assert_ne!(a, b);
        assert_eq!(a, table.id_for(Path::new("/srv/export/a")));
        assert_eq!(table.path_for_id(a).unwrap(), Path::new("/srv/export/a"));
    }

    #[test]
    fn unknown_id_is_stale() {
        let table = FileHandleTable::new();
        assert_eq!(table.path_for_id(42).unwrap_err(), HandleError::Stale);
        assert_eq!(table.path_for_id(0).unwrap_err(), HandleError::Stale);
    }

    #[test]
    fn fh2_layout_is_frozen() {
        let table = FileHandleTable::new();
        let handle = table.fh2_for(Path::new("/srv/export"));
        assert_eq!(handle.len(), 32);
        assert_eq!(&handle[0..4], &1u32.to_be_bytes());
        assert!(handle[4..].iter().all(|&b| b == 0));
        assert_eq!(table.path_for_fh2(&handle).unwrap(), Path::new("/srv/export"));
    }

    #[test]
    fn fh3_layout_is_frozen() {
        let table = FileHandleTable::new();
        let handle = table.fh3_for(Path::new("/srv/export/file"));
        assert_eq!(handle.data.len(), 64);
        assert_eq!(&handle.data[0..8], &1u64.to_be_bytes());
        assert!(handle.data[8..].iter().all(|&b| b == 0));
        assert_eq!(table.path_for_fh3(&handle).unwrap(), Path::new("/srv/export/file"));
    }

    #[test]
    fn fh3_round_trips_exactly() {
        let table = FileHandleTable::new();
        let first = table.fh3_for(Path::new("/x"));
        let path = table.path_for_fh3(&first).unwrap();
        assert_eq!(table.fh3_for(&path), first);
    }

    #[test]
    fn fh4_layout_is_frozen() {
        let table = FileHandleTable::new();
        let handle = table.fh4_for(Path::new("/srv/export"));
        assert_eq!(handle.len(), 28);
        assert_eq!(&handle[0..4], &1u32.to_be_bytes());
        assert_eq!(&handle[4..12], &1u64.to_be_bytes());
        assert!(handle[12..].iter().all(|&b| b == 0));
        assert_eq!(table.path_for_fh4(&handle).unwrap(), Path::new("/srv/export"));
    }

    #[test]
    fn fh4_rejects_malformed() {
        let table = FileHandleTable::new();
        table.id_for(Path::new("/srv/export"));
        assert_eq!(table.path_for_fh4(&[]).unwrap_err(), HandleError::Stale);
        assert_eq!(table.path_for_fh4(&[0u8; 12]).unwrap_err(), HandleError::BadHandle);
        let mut wrong_tag = table.fh4_for(Path::new("/srv/export"));
        wrong_tag[3] = 9;
        assert_eq!(table.path_for_fh4(&wrong_tag).unwrap_err(), HandleError::BadHandle);
    }

    #[test]
    fn short_fh3_is_bad() {
        let table = FileHandleTable::new();
        let handle = nfs_fh3 { data: vec![0; 4] };
        assert_eq!(table.path_for_fh3(&handle).unwrap_err(), HandleError::BadHandle);
        let handle = nfs_fh3 { data: vec![0; 65] };
        assert_eq!(table.path_for_fh3(&handle).unwrap_err(), HandleError::BadHandle);
    }
}
