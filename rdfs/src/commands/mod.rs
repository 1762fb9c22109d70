//! Command implementations, generic over the backing [`RemoteStore`] so the
//! integration tests can run them against a scratch directory.

use std::path::PathBuf;

use clap::Args;
use libdfs::ClientError;
use libdfs::store::DEFAULT_BLOCK_SIZE;
use libdfs::store::localdir::LocalDirStore;

pub mod namespace;
pub mod transfer;

/// Where the remote namespace lives and how its block layout is advertised.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory backing the remote namespace
    #[arg(
        long,
        env = "RDFS_STORE_ROOT",
        default_value = "/var/lib/rdfs",
        global = true
    )]
    pub store_root: PathBuf,

    /// Block size reported for remote files, in bytes
    #[arg(
        long,
        env = "RDFS_BLOCK_SIZE",
        default_value_t = DEFAULT_BLOCK_SIZE,
        global = true
    )]
    pub block_size: u64,

    /// Replica count reported per block
    #[arg(long, env = "RDFS_REPLICATION", default_value_t = 3, global = true)]
    pub replication: u16,
}

impl StoreArgs {
    /// One reporting host per advertised replica, named like a small cluster.
    pub fn open_store(&self) -> LocalDirStore {
        let hosts = (0..self.replication.max(1))
            .map(|i| format!("node-{i}"))
            .collect();
        LocalDirStore::with_layout(&self.store_root, self.block_size, self.replication, hosts)
    }
}

/// Exit status for a failed command: 2 for caller mistakes, 1 for everything
/// else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::InvalidArgument(_) | ClientError::InvalidPath(_)) => 2,
        _ => 1,
    }
}
