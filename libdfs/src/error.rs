use std::io;

use thiserror::Error;

/// Failure taxonomy shared by every client operation.
///
/// `TransientIo` is the only variant the transfer engine retries; everything
/// else surfaces to the caller unchanged.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The path does not exist, or names a directory where a file is required.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("seek to offset {offset} past end of {path} (length {len})")]
    Seek { path: String, offset: u64, len: u64 },

    #[error("remote store rejected write to {path}: {reason}")]
    RemoteWrite { path: String, reason: String },

    #[error("transient i/o failure while {context}: {source}")]
    TransientIo {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("namespace cycle: {0} reported more than once")]
    NamespaceCycle(String),

    #[error("walk exceeded depth limit {limit} below {path}")]
    DepthLimit { path: String, limit: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    pub fn transient(context: impl Into<String>, source: io::Error) -> Self {
        Self::TransientIo {
            context: context.into(),
            source,
        }
    }

    /// Whether a bounded retry at the chunk boundary is allowed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
