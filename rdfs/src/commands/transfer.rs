//! `download` and `upload`: chunked copies with a progress bar wrapped
//! around the local end of the stream.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::Poll;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use libdfs::ClientError;
use libdfs::DfsPath;
use libdfs::store::RemoteStore;
use libdfs::transfer::{ByteRange, DEFAULT_CHUNK_SIZE, TransferEngine, TransferOptions};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite, BufWriter, ReadBuf};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Remote file to read
    #[arg(value_name = "REMOTE_PATH")]
    pub remote: DfsPath,

    /// Local destination file
    #[arg(value_name = "LOCAL_PATH")]
    pub local: PathBuf,

    /// First byte to read
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Number of bytes to read; to end of file when omitted
    #[arg(long)]
    pub length: Option<u64>,

    /// Copy granularity in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Continue a partial download, appending to the local file
    #[arg(long, conflicts_with_all = ["offset", "length"])]
    pub resume: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local source file
    #[arg(value_name = "LOCAL_PATH")]
    pub local: PathBuf,

    /// Remote destination path
    #[arg(value_name = "REMOTE_PATH")]
    pub remote: DfsPath,

    /// Replace an existing remote file
    #[arg(long)]
    pub overwrite: bool,

    /// Copy granularity in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

pub async fn download<S: RemoteStore>(store: &S, args: DownloadArgs) -> anyhow::Result<()> {
    let status = store.status(&args.remote).await?;
    if status.is_dir {
        return Err(ClientError::NotFound(format!(
            "{}: directory where a file is required",
            args.remote
        ))
        .into());
    }

    // With --resume the local file length is the ground truth for progress.
    let already_local = if args.resume {
        match tokio::fs::metadata(&args.local).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        }
    } else {
        0
    };
    let range = if args.resume {
        ByteRange::from_offset(already_local)
    } else {
        match args.length {
            Some(length) => ByteRange::with_length(args.offset, length),
            None => ByteRange::from_offset(args.offset),
        }
    };

    let end = range.end.unwrap_or(status.size).min(status.size);
    let expected = end.saturating_sub(range.start.min(end));
    let bar = transfer_bar(expected, format!("Downloading {}", args.remote))?;

    let file = if args.resume {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&args.local)
            .await
    } else {
        File::create(&args.local).await
    }
    .with_context(|| format!("failed to open local file {}", args.local.display()))?;
    let mut sink = ProgressWriter::new(file, bar.clone());

    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let engine = TransferEngine::with_options(
        store,
        TransferOptions {
            chunk_size: args.chunk_size,
            cancel,
            ..Default::default()
        },
    );
    let result = engine.download_to(&args.remote, &mut sink, range).await;
    watcher.abort();
    let written = result?;
    bar.finish_and_clear();

    if args.resume && already_local > 0 {
        println!(
            "Resumed {}: {} new bytes ({} already local)",
            args.remote, written, already_local
        );
    } else {
        println!(
            "Downloaded {} bytes from {} to {}",
            written,
            args.remote,
            args.local.display()
        );
    }
    Ok(())
}

pub async fn upload<S: RemoteStore>(store: &S, args: UploadArgs) -> anyhow::Result<()> {
    let meta = tokio::fs::metadata(&args.local)
        .await
        .with_context(|| format!("cannot read local file {}", args.local.display()))?;
    if meta.is_dir() {
        anyhow::bail!("{} is a directory, not a file", args.local.display());
    }

    let bar = transfer_bar(meta.len(), format!("Uploading {}", args.local.display()))?;
    let file = File::open(&args.local)
        .await
        .with_context(|| format!("cannot read local file {}", args.local.display()))?;
    let mut source = ProgressReader::new(file, bar.clone());

    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let engine = TransferEngine::with_options(
        store,
        TransferOptions {
            chunk_size: args.chunk_size,
            overwrite: args.overwrite,
            cancel,
            ..Default::default()
        },
    );
    let result = engine.upload_from(&mut source, &args.remote).await;
    watcher.abort();
    let sent = result?;
    bar.finish_and_clear();

    println!(
        "Uploaded {} bytes from {} to {}",
        sent,
        args.local.display(),
        args.remote
    );
    Ok(())
}

fn transfer_bar(total: u64, message: String) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(total);
    bar.set_style(ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")?
        .progress_chars("#>-"));
    bar.set_message(message);
    Ok(bar)
}

/// Cancels the transfer token on ctrl-c. Abort the handle once the transfer
/// finishes on its own.
fn cancel_on_ctrl_c(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel.cancel(),
            Err(err) => tracing::warn!("cannot listen for ctrl-c: {err}"),
        }
    })
}

struct ProgressWriter<W: AsyncWrite + Unpin> {
    inner: BufWriter<W>,
    bar: ProgressBar,
}

impl<W: AsyncWrite + Unpin> ProgressWriter<W> {
    fn new(writer: W, bar: ProgressBar) -> Self {
        Self {
            inner: BufWriter::new(writer),
            bar,
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> Poll<std::result::Result<usize, std::io::Error>> {
        let res = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &res {
            self.bar.inc(*n as u64);
        }
        res
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::result::Result<(), std::io::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::result::Result<(), std::io::Error>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

struct ProgressReader<R: AsyncRead + Unpin> {
    inner: R,
    bar: ProgressBar,
}

impl<R: AsyncRead + Unpin> ProgressReader<R> {
    fn new(reader: R, bar: ProgressBar) -> Self {
        Self { inner: reader, bar }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &res {
            self.bar.inc((buf.filled().len() - before) as u64);
        }
        res
    }
}
