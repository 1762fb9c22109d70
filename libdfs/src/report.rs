//! Block placement reports for single files.

use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::path::DfsPath;
use crate::store::{BlockLocation, RemoteStore};

/// Placement summary for one file. `blocks` is always sorted by ascending
/// offset, whatever order the store returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileBlockReport {
    pub path: DfsPath,
    pub total_length: u64,
    pub block_size: u64,
    pub replication: u16,
    pub blocks: Vec<BlockLocation>,
}

/// Combines `status` and `block_locations` into one ordered report.
pub struct BlockReporter<'a, S: RemoteStore> {
    store: &'a S,
}

impl<'a, S: RemoteStore> BlockReporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Report on a single file. Directories and missing paths fail with
    /// `NotFound`.
    pub async fn report(&self, path: &DfsPath) -> Result<FileBlockReport> {
        let status = self.store.status(path).await?;
        if status.is_dir {
            return Err(ClientError::NotFound(format!(
                "{path}: directory where a file is required"
            )));
        }
        let mut blocks = self.store.block_locations(path).await?;
        blocks.sort_by_key(|b| b.offset);
        Ok(FileBlockReport {
            path: status.path,
            total_length: status.size,
            block_size: status.block_size,
            replication: status.replication,
            blocks,
        })
    }
}
