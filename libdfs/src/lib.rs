//! Client-side data movement core for a block-replicated distributed
//! filesystem: a segmented transfer engine, an iterative namespace walker,
//! and block placement reporting, all over a pluggable [`store::RemoteStore`].

pub mod error;
pub mod path;
pub mod report;
pub mod store;
pub mod transfer;
pub mod walk;

// re-export the types every caller touches
pub use error::{ClientError, Result};
pub use path::DfsPath;
pub use store::RemoteStore;
