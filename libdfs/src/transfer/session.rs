//! Descriptions of a transfer that outlive a single engine call.

use std::path::PathBuf;

use crate::error::{ClientError, Result};
use crate::path::DfsPath;

/// Half-open byte range `[start, end)`. `end: None` reads to end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// The whole file.
    pub fn full() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }

    /// From `start` to end of file.
    pub fn from_offset(start: u64) -> Self {
        Self { start, end: None }
    }

    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// `length` bytes starting at `start`; saturates at the end of the
    /// addressable space.
    pub fn with_length(start: u64, length: u64) -> Self {
        Self {
            start,
            end: Some(start.saturating_add(length)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(end) = self.end {
            if end < self.start {
                return Err(ClientError::InvalidArgument(format!(
                    "byte range end {end} precedes start {}",
                    self.start
                )));
            }
        }
        Ok(())
    }

    /// Bounded length, or `None` when the range runs to end of file.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|e| e.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl Default for ByteRange {
    fn default() -> Self {
        Self::full()
    }
}

/// Which way bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// Record of one logical transfer.
///
/// `bytes_transferred` advances as chunks land, including on runs that fail
/// partway, so [`crate::transfer::TransferEngine::resume_download`] can pick
/// up exactly where the last attempt stopped.
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub remote_path: DfsPath,
    pub local_path: PathBuf,
    pub direction: Direction,
    pub chunk_size: usize,
    pub range: ByteRange,
    pub bytes_transferred: u64,
}

impl TransferSession {
    pub fn download(
        remote: DfsPath,
        local: impl Into<PathBuf>,
        range: ByteRange,
        chunk_size: usize,
    ) -> Self {
        Self {
            remote_path: remote,
            local_path: local.into(),
            direction: Direction::Download,
            chunk_size,
            range,
            bytes_transferred: 0,
        }
    }

    pub fn upload(local: impl Into<PathBuf>, remote: DfsPath, chunk_size: usize) -> Self {
        Self {
            remote_path: remote,
            local_path: local.into(),
            direction: Direction::Upload,
            chunk_size,
            range: ByteRange::full(),
            bytes_transferred: 0,
        }
    }

    /// Absolute remote offset the next resumed chunk starts at.
    pub fn resume_offset(&self) -> u64 {
        self.range.start + self.bytes_transferred
    }
}
