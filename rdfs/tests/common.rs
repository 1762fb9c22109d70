//! Shared helpers for command tests.

use std::path::Path;

use libdfs::DfsPath;
use libdfs::store::localdir::LocalDirStore;

pub fn p(s: &str) -> DfsPath {
    DfsPath::new(s).unwrap()
}

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Store over a scratch directory with a small block size so block reports
/// have more than one entry.
pub fn scratch_store(root: &Path) -> LocalDirStore {
    LocalDirStore::with_layout(
        root,
        64 * 1024,
        2,
        vec!["node-0".into(), "node-1".into(), "node-2".into()],
    )
}
