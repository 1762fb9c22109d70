//! Segmented transfer engine: chunked, offset-addressed, resumable copies
//! between local byte streams and the remote store.

pub mod engine;
pub mod session;

pub use engine::{DEFAULT_CHUNK_SIZE, TransferEngine, TransferOptions};
pub use session::{ByteRange, Direction, TransferSession};
