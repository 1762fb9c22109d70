//! The chunked copy loops.
//!
//! Downloads pull fixed-size chunks from a positioned [`ReadStream`] and
//! write only the bytes each read actually returned, so a short final chunk
//! never drags stale buffer contents into the output. Uploads push chunks
//! through a [`WriteStream`] and finalize with `close`, which keeps aborted
//! uploads invisible remotely.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::path::DfsPath;
use crate::store::{ReadStream, RemoteStore, WriteStream};

use super::session::{ByteRange, Direction, TransferSession};

/// Default copy granularity, 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Knobs for one engine instance.
#[derive(Clone)]
pub struct TransferOptions {
    pub chunk_size: usize,
    /// Allow uploads to replace an existing remote file.
    pub overwrite: bool,
    /// Transient-failure retries per chunk.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent attempt.
    pub retry_delay: Duration,
    /// Checked between chunks; cancelling aborts with `ClientError::Cancelled`.
    pub cancel: CancellationToken,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overwrite: false,
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            cancel: CancellationToken::new(),
        }
    }
}

/// Moves bytes between local streams and one [`RemoteStore`].
pub struct TransferEngine<'a, S: RemoteStore> {
    store: &'a S,
    opts: TransferOptions,
}

impl<'a, S: RemoteStore> TransferEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_options(store, TransferOptions::default())
    }

    pub fn with_options(store: &'a S, opts: TransferOptions) -> Self {
        Self { store, opts }
    }

    /// Download a whole remote file into `local`. Returns bytes written.
    pub async fn download(&self, remote: &DfsPath, local: &Path) -> Result<u64> {
        self.download_range(remote, local, ByteRange::full()).await
    }

    /// Download `range` of `remote`, appending to `local` (created if
    /// missing). The remote file is opened before the local one is touched,
    /// so a missing remote path leaves nothing behind locally.
    pub async fn download_range(
        &self,
        remote: &DfsPath,
        local: &Path,
        range: ByteRange,
    ) -> Result<u64> {
        let mut transferred = 0u64;
        self.run_download(remote, local, range, self.opts.chunk_size, &mut transferred)
            .await?;
        Ok(transferred)
    }

    /// Download into any writable sink. The caller owns sink placement and
    /// buffering; bytes arrive in offset order starting at `range.start`.
    pub async fn download_to<W>(
        &self,
        remote: &DfsPath,
        sink: &mut W,
        range: ByteRange,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.ensure_live()?;
        let mut transferred = 0u64;
        let mut stream = self.open_positioned(remote, range).await?;
        self.copy_chunks(
            remote,
            stream.as_mut(),
            sink,
            range,
            self.opts.chunk_size,
            &mut transferred,
        )
        .await?;
        Ok(transferred)
    }

    /// Continue a download session from where it stopped. Progress already
    /// recorded in the session is skipped remotely and the new bytes append
    /// to the local file. Returns the bytes moved by this call; the session
    /// counter advances even when the call fails partway.
    pub async fn resume_download(&self, session: &mut TransferSession) -> Result<u64> {
        if session.direction != Direction::Download {
            return Err(ClientError::InvalidArgument(
                "resume_download requires a download session".into(),
            ));
        }
        let range = ByteRange::new(session.resume_offset(), session.range.end);
        let remote = session.remote_path.clone();
        let local = session.local_path.clone();
        let before = session.bytes_transferred;
        self.run_download(
            &remote,
            &local,
            range,
            session.chunk_size,
            &mut session.bytes_transferred,
        )
        .await?;
        Ok(session.bytes_transferred - before)
    }

    /// Upload a local file in a single pass. Returns bytes sent.
    pub async fn upload(&self, local: &Path, remote: &DfsPath) -> Result<u64> {
        self.ensure_live()?;
        let meta = tokio::fs::metadata(local)
            .await
            .map_err(|e| local_not_found(local, e))?;
        if meta.is_dir() {
            return Err(ClientError::NotFound(format!(
                "{}: directory where a file is required",
                local.display()
            )));
        }
        let mut file = File::open(local)
            .await
            .map_err(|e| local_not_found(local, e))?;
        self.upload_from(&mut file, remote).await
    }

    /// Upload from any byte source. The remote file becomes visible only
    /// after the final `close`; failure or cancellation midway discards the
    /// pending object.
    pub async fn upload_from<R>(&self, source: &mut R, remote: &DfsPath) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ensure_live()?;
        let chunk_size = positive_chunk(self.opts.chunk_size)?;
        let mut stream = self.store.open_write(remote, self.opts.overwrite).await?;
        let mut buf = vec![0u8; chunk_size];
        let mut total = 0u64;
        loop {
            self.ensure_live()?;
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.write_chunk_with_retry(remote, stream.as_mut(), &buf[..n])
                .await?;
            total += n as u64;
        }
        stream.close().await?;
        tracing::debug!("uploaded {} bytes to {}", total, remote);
        Ok(total)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.opts.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        Ok(())
    }

    async fn open_positioned(
        &self,
        remote: &DfsPath,
        range: ByteRange,
    ) -> Result<Box<dyn ReadStream>> {
        range.validate()?;
        let mut stream = self.store.open_read(remote).await?;
        if range.start > 0 {
            stream.seek(range.start).await?;
        }
        Ok(stream)
    }

    async fn run_download(
        &self,
        remote: &DfsPath,
        local: &Path,
        range: ByteRange,
        chunk_size: usize,
        progress: &mut u64,
    ) -> Result<()> {
        self.ensure_live()?;
        let mut stream = self.open_positioned(remote, range).await?;
        // Only now is the local file created.
        let mut sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(local)
            .await?;
        self.copy_chunks(remote, stream.as_mut(), &mut sink, range, chunk_size, progress)
            .await?;
        tracing::debug!("downloaded {} bytes from {}", progress, remote);
        Ok(())
    }

    async fn copy_chunks<W>(
        &self,
        remote: &DfsPath,
        stream: &mut dyn ReadStream,
        sink: &mut W,
        range: ByteRange,
        chunk_size: usize,
        progress: &mut u64,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let chunk_size = positive_chunk(chunk_size)?;
        let mut buf = vec![0u8; chunk_size];
        let mut pos = range.start;
        loop {
            self.ensure_live()?;
            let want = match range.end {
                Some(end) => {
                    let remaining = end - pos;
                    if remaining == 0 {
                        break;
                    }
                    if remaining >= chunk_size as u64 {
                        chunk_size
                    } else {
                        remaining as usize
                    }
                }
                None => chunk_size,
            };
            let n = self
                .read_chunk_with_retry(remote, stream, &mut buf[..want], pos)
                .await?;
            if n == 0 {
                break;
            }
            // Write only what this read returned; the buffer tail is stale.
            sink.write_all(&buf[..n]).await?;
            pos += n as u64;
            *progress += n as u64;
        }
        sink.flush().await?;
        Ok(())
    }

    async fn read_chunk_with_retry(
        &self,
        remote: &DfsPath,
        stream: &mut dyn ReadStream,
        buf: &mut [u8],
        pos: u64,
    ) -> Result<usize> {
        let mut attempt = 0u32;
        loop {
            match stream.read_chunk(buf).await {
                Ok(n) => return Ok(n),
                Err(e) if e.is_transient() && attempt < self.opts.max_retries => {
                    attempt += 1;
                    let delay = self.opts.retry_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "transient read failure on {} at offset {} (attempt {}/{}), retrying in {:?}: {}",
                        remote,
                        pos,
                        attempt,
                        self.opts.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    // A torn read may have advanced the stream; re-anchor.
                    stream.seek(pos).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn write_chunk_with_retry(
        &self,
        remote: &DfsPath,
        stream: &mut dyn WriteStream,
        data: &[u8],
    ) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match stream.write_chunk(data).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.opts.max_retries => {
                    attempt += 1;
                    let delay = self.opts.retry_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "transient write failure on {} (attempt {}/{}), retrying in {:?}: {}",
                        remote,
                        attempt,
                        self.opts.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn positive_chunk(chunk_size: usize) -> Result<usize> {
    if chunk_size == 0 {
        return Err(ClientError::InvalidArgument(
            "chunk_size must be positive".into(),
        ));
    }
    Ok(chunk_size)
}

fn local_not_found(local: &Path, e: io::Error) -> ClientError {
    if e.kind() == io::ErrorKind::NotFound {
        ClientError::NotFound(local.display().to_string())
    } else {
        ClientError::Io(e)
    }
}
