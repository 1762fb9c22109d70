//! Namespace commands: listing, block reports, mkdir, rename, delete.

use clap::Args;
use libdfs::DfsPath;
use libdfs::report::BlockReporter;
use libdfs::store::{DirEntry, RemoteStore};
use libdfs::walk::{NamespaceWalker, WalkEvent, WalkOptions};

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path to list
    #[arg(value_name = "REMOTE_PATH", default_value = "/")]
    pub path: DfsPath,

    /// Walk the whole subtree depth-first
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Stop at the first unlistable directory instead of skipping it
    #[arg(long, requires = "recursive")]
    pub fail_fast: bool,

    /// Emit entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BlockinfoArgs {
    /// Remote file to inspect
    #[arg(value_name = "REMOTE_PATH")]
    pub path: DfsPath,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn ls<S: RemoteStore>(store: &S, args: LsArgs) -> anyhow::Result<()> {
    if args.recursive {
        let walker = NamespaceWalker::with_options(
            store,
            WalkOptions {
                fail_fast: args.fail_fast,
                ..Default::default()
            },
        );
        let mut entries: Vec<DirEntry> = Vec::new();
        let stats = walker
            .walk(&args.path, |event| match event {
                WalkEvent::Entry(entry) => {
                    if args.json {
                        entries.push(entry.clone());
                    } else {
                        print_entry(entry);
                    }
                }
                WalkEvent::ListError { path, error } => {
                    eprintln!("rdfs: ls: {path}: {error}");
                }
            })
            .await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        if stats.list_errors > 0 {
            anyhow::bail!("could not list {} directories", stats.list_errors);
        }
    } else {
        let entries = store.list(&args.path).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for entry in &entries {
                print_entry(entry);
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &DirEntry) {
    if entry.is_dir {
        println!("Dir: {}", entry.path);
    } else {
        println!("File: {}", entry.path);
    }
}

pub async fn blockinfo<S: RemoteStore>(store: &S, args: BlockinfoArgs) -> anyhow::Result<()> {
    let report = BlockReporter::new(store).report(&args.path).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Path: {}", report.path);
    println!("Length: {}", report.total_length);
    println!("Block size: {}", report.block_size);
    println!("Replication: {}", report.replication);
    for (i, block) in report.blocks.iter().enumerate() {
        println!(
            "Block {}: offset={} length={} hosts={}",
            i,
            block.offset,
            block.length,
            block.hosts.join(",")
        );
    }
    Ok(())
}

pub async fn mkdir<S: RemoteStore>(store: &S, path: &DfsPath) -> anyhow::Result<()> {
    store.mkdirs(path).await?;
    Ok(())
}

pub async fn mv<S: RemoteStore>(store: &S, src: &DfsPath, dst: &DfsPath) -> anyhow::Result<()> {
    store.rename(src, dst).await?;
    Ok(())
}

pub async fn rm<S: RemoteStore>(store: &S, path: &DfsPath, recursive: bool) -> anyhow::Result<()> {
    store.delete(path, recursive).await?;
    Ok(())
}
