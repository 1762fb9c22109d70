use clap::{Parser, Subcommand};
use libdfs::DfsPath;
use rdfs::commands::namespace::{BlockinfoArgs, LsArgs};
use rdfs::commands::transfer::{DownloadArgs, UploadArgs};
use rdfs::commands::{self, StoreArgs};

#[derive(Parser)]
#[command(name = "rdfs")]
#[command(about = "Move files in and out of a block-replicated DFS namespace", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Copy a remote file, or a byte range of one, to a local path")]
    Download(DownloadArgs),
    #[command(about = "Copy a local file into the remote namespace")]
    Upload(UploadArgs),
    #[command(about = "List a remote path, optionally walking the whole subtree")]
    Ls(LsArgs),
    #[command(about = "Show length, block size and replica placement of a remote file")]
    Blockinfo(BlockinfoArgs),
    #[command(about = "Create a remote directory and its missing parents")]
    Mkdir {
        #[arg(value_name = "REMOTE_PATH")]
        path: DfsPath,
    },
    #[command(about = "Rename a remote file or directory")]
    Mv {
        #[arg(value_name = "SRC")]
        src: DfsPath,
        #[arg(value_name = "DST")]
        dst: DfsPath,
    },
    #[command(about = "Delete a remote file or directory")]
    Rm {
        #[arg(value_name = "REMOTE_PATH")]
        path: DfsPath,
        /// Delete directories and their contents
        #[arg(short, long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let store = cli.store.open_store();

    let result = match cli.command {
        Commands::Download(args) => commands::transfer::download(&store, args).await,
        Commands::Upload(args) => commands::transfer::upload(&store, args).await,
        Commands::Ls(args) => commands::namespace::ls(&store, args).await,
        Commands::Blockinfo(args) => commands::namespace::blockinfo(&store, args).await,
        Commands::Mkdir { path } => commands::namespace::mkdir(&store, &path).await,
        Commands::Mv { src, dst } => commands::namespace::mv(&store, &src, &dst).await,
        Commands::Rm { path, recursive } => commands::namespace::rm(&store, &path, recursive).await,
    };

    if let Err(err) = result {
        eprintln!("rdfs: {err:#}");
        std::process::exit(commands::exit_code(&err));
    }
}
