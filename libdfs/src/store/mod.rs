//! Remote store abstraction: namespace + streaming byte access.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::path::DfsPath;

pub mod localdir;
pub mod memory;

/// Default block size reported by the bundled backends, 128 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 128 * 1024 * 1024;

/// One child of a listed directory. The `path` is fully resolved by the
/// store, so walkers and callers never re-derive it from strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub path: DfsPath,
    pub is_dir: bool,
    /// Byte length for files; 0 for directories.
    pub size: u64,
}

/// Metadata for a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub path: DfsPath,
    pub is_dir: bool,
    pub size: u64,
    /// Nominal block size the file is split into; 0 for directories.
    pub block_size: u64,
    /// Replica count per block; 0 for directories.
    pub replication: u16,
}

/// Where one block of a file physically lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockLocation {
    /// Byte offset of the block within the file.
    pub offset: u64,
    pub length: u64,
    pub hosts: Vec<String>,
}

/// Positioned reader over one remote file.
///
/// `seek` re-anchors to an absolute offset; seeking past the end fails with
/// [`crate::ClientError::Seek`] (the length boundary itself is allowed).
/// `read_chunk` returns the number of bytes placed at the front of `buf`,
/// with `Ok(0)` meaning end of file.
#[async_trait]
pub trait ReadStream: Send {
    async fn seek(&mut self, offset: u64) -> Result<()>;
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Writer for one remote file being created.
///
/// Bytes become visible only after `close` succeeds; dropping a stream
/// without closing discards everything written so far, so an aborted upload
/// never leaves a partial remote file.
#[async_trait]
pub trait WriteStream: Send + std::fmt::Debug {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Capability surface of a remote cluster as seen by one client.
///
/// Everything above this trait (transfer engine, walker, block reporter) is
/// backend-agnostic; the bundled implementations are [`memory::InMemoryStore`]
/// and [`localdir::LocalDirStore`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a file for reading, positioned at offset 0.
    async fn open_read(&self, path: &DfsPath) -> Result<Box<dyn ReadStream>>;

    /// Start writing a new file. Fails with `RemoteWrite` when the path
    /// already exists and `overwrite` is false. Missing parent directories
    /// are created.
    async fn open_write(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn WriteStream>>;

    async fn status(&self, path: &DfsPath) -> Result<FileStatus>;

    /// List a directory. Listing a file yields that single entry; entries
    /// come back sorted by path.
    async fn list(&self, path: &DfsPath) -> Result<Vec<DirEntry>>;

    /// Block placement for a file. Ordering is backend-defined; callers that
    /// need offset order go through [`crate::report::BlockReporter`].
    async fn block_locations(&self, path: &DfsPath) -> Result<Vec<BlockLocation>>;

    /// Rename a file or directory. The destination must not exist.
    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<()>;

    /// Delete a path. A non-empty directory requires `recursive`.
    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<()>;

    /// Create a directory and any missing ancestors. Idempotent.
    async fn mkdirs(&self, path: &DfsPath) -> Result<()>;
}

/// Split a file of `len` bytes into block descriptors, rotating replica
/// placement across the host pool the way a balanced cluster would.
pub(crate) fn synthesize_blocks(
    len: u64,
    block_size: u64,
    replication: u16,
    hosts: &[String],
) -> Vec<BlockLocation> {
    let mut blocks = Vec::new();
    if len == 0 || block_size == 0 || hosts.is_empty() {
        return blocks;
    }
    let replicas = usize::from(replication.max(1)).min(hosts.len());
    let mut offset = 0u64;
    let mut index = 0usize;
    while offset < len {
        let length = block_size.min(len - offset);
        let assigned = (0..replicas)
            .map(|r| hosts[(index + r) % hosts.len()].clone())
            .collect();
        blocks.push(BlockLocation {
            offset,
            length,
            hosts: assigned,
        });
        offset += length;
        index += 1;
    }
    blocks
}
