//! Local-directory store: maps the remote namespace onto a directory tree.
//!
//! Useful as a fake cluster for the CLI and integration tests. Pending
//! writes land in a `.staging` area under the root and only move to their
//! final path on close, so readers never observe half-written files.

use std::io::{self, SeekFrom};
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{
    File, create_dir_all, metadata, read_dir, remove_dir, remove_dir_all, remove_file, rename,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::path::DfsPath;

use super::{
    BlockLocation, DEFAULT_BLOCK_SIZE, DirEntry, FileStatus, ReadStream, RemoteStore, WriteStream,
    synthesize_blocks,
};

const STAGING_DIR: &str = ".staging";

/// Directory-backed store. Block metadata is synthesized from the configured
/// layout; the name `.staging` is reserved at the root.
pub struct LocalDirStore {
    root: PathBuf,
    block_size: u64,
    replication: u16,
    hosts: Vec<String>,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_layout(root, DEFAULT_BLOCK_SIZE, 1, vec!["localhost".into()])
    }

    pub fn with_layout(
        root: impl Into<PathBuf>,
        block_size: u64,
        replication: u16,
        hosts: Vec<String>,
    ) -> Self {
        Self {
            root: root.into(),
            block_size,
            replication,
            hosts,
        }
    }

    fn fs_path(&self, path: &DfsPath) -> PathBuf {
        if path.is_root() {
            self.root.clone()
        } else {
            self.root.join(&path.as_str()[1..])
        }
    }

    // ENOTDIR means an ancestor is a file, so the path does not exist either.
    fn not_found(path: &DfsPath, e: io::Error) -> ClientError {
        match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                ClientError::NotFound(path.to_string())
            }
            _ => ClientError::Io(e),
        }
    }
}

#[async_trait]
impl RemoteStore for LocalDirStore {
    async fn open_read(&self, path: &DfsPath) -> Result<Box<dyn ReadStream>> {
        let fs = self.fs_path(path);
        let meta = metadata(&fs).await.map_err(|e| Self::not_found(path, e))?;
        if meta.is_dir() {
            return Err(ClientError::NotFound(format!(
                "{path}: directory where a file is required"
            )));
        }
        let file = File::open(&fs).await.map_err(|e| Self::not_found(path, e))?;
        Ok(Box::new(LocalReadStream {
            path: path.to_string(),
            file,
            len: meta.len(),
        }))
    }

    async fn open_write(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn WriteStream>> {
        if path.is_root() {
            return Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "cannot write to the namespace root".into(),
            });
        }
        let final_path = self.fs_path(path);
        match metadata(&final_path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(ClientError::RemoteWrite {
                    path: path.to_string(),
                    reason: "path is a directory".into(),
                });
            }
            Ok(_) if !overwrite => {
                return Err(ClientError::RemoteWrite {
                    path: path.to_string(),
                    reason: "path already exists".into(),
                });
            }
            Ok(_) => {}
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::NotADirectory => {}
            Err(e) => return Err(ClientError::Io(e)),
        }
        if let Some(parent) = final_path.parent() {
            create_dir_all(parent).await.map_err(|e| {
                if e.kind() == io::ErrorKind::NotADirectory {
                    ClientError::RemoteWrite {
                        path: path.to_string(),
                        reason: "a file occupies a parent directory slot".into(),
                    }
                } else {
                    ClientError::Io(e)
                }
            })?;
        }
        let staging = self.root.join(STAGING_DIR);
        create_dir_all(&staging).await?;
        let temp_path = staging.join(Uuid::new_v4().to_string());
        let file = File::create(&temp_path).await?;
        Ok(Box::new(LocalWriteStream {
            remote: path.to_string(),
            temp_path,
            final_path,
            writer: BufWriter::new(file),
            closed: false,
        }))
    }

    async fn status(&self, path: &DfsPath) -> Result<FileStatus> {
        let meta = match metadata(self.fs_path(path)).await {
            Ok(meta) => meta,
            // The namespace root exists even before the backing dir does.
            Err(e) if path.is_root() && e.kind() == io::ErrorKind::NotFound => {
                return Ok(FileStatus {
                    path: path.clone(),
                    is_dir: true,
                    size: 0,
                    block_size: 0,
                    replication: 0,
                });
            }
            Err(e) => return Err(Self::not_found(path, e)),
        };
        Ok(if meta.is_dir() {
            FileStatus {
                path: path.clone(),
                is_dir: true,
                size: 0,
                block_size: 0,
                replication: 0,
            }
        } else {
            FileStatus {
                path: path.clone(),
                is_dir: false,
                size: meta.len(),
                block_size: self.block_size,
                replication: self.replication,
            }
        })
    }

    async fn list(&self, path: &DfsPath) -> Result<Vec<DirEntry>> {
        let fs = self.fs_path(path);
        let meta = match metadata(&fs).await {
            Ok(meta) => meta,
            Err(e) if path.is_root() && e.kind() == io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(Self::not_found(path, e)),
        };
        if !meta.is_dir() {
            return Ok(vec![DirEntry {
                path: path.clone(),
                is_dir: false,
                size: meta.len(),
            }]);
        }
        let mut rd = read_dir(&fs).await.map_err(|e| Self::not_found(path, e))?;
        let mut entries = Vec::new();
        while let Some(ent) = rd.next_entry().await? {
            let name = ent.file_name();
            let Some(name) = name.to_str() else { continue };
            if path.is_root() && name == STAGING_DIR {
                continue;
            }
            let child_meta = ent.metadata().await?;
            entries.push(DirEntry {
                path: path.join(name)?,
                is_dir: child_meta.is_dir(),
                size: if child_meta.is_dir() {
                    0
                } else {
                    child_meta.len()
                },
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn block_locations(&self, path: &DfsPath) -> Result<Vec<BlockLocation>> {
        let meta = metadata(self.fs_path(path))
            .await
            .map_err(|e| Self::not_found(path, e))?;
        if meta.is_dir() {
            return Err(ClientError::NotFound(format!(
                "{path}: directory where a file is required"
            )));
        }
        Ok(synthesize_blocks(
            meta.len(),
            self.block_size,
            self.replication,
            &self.hosts,
        ))
    }

    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<()> {
        if src.is_root() {
            return Err(ClientError::InvalidArgument(
                "cannot rename the namespace root".into(),
            ));
        }
        if dst.as_str().starts_with(&format!("{}/", src.as_str())) || src == dst {
            return Err(ClientError::InvalidArgument(format!(
                "cannot rename {src} into itself"
            )));
        }
        let src_fs = self.fs_path(src);
        let dst_fs = self.fs_path(dst);
        metadata(&src_fs).await.map_err(|e| Self::not_found(src, e))?;
        if metadata(&dst_fs).await.is_ok() {
            return Err(ClientError::RemoteWrite {
                path: dst.to_string(),
                reason: "destination already exists".into(),
            });
        }
        if let Some(parent) = dst_fs.parent() {
            create_dir_all(parent).await.map_err(|e| {
                if e.kind() == io::ErrorKind::NotADirectory {
                    ClientError::RemoteWrite {
                        path: dst.to_string(),
                        reason: "a file occupies a parent directory slot".into(),
                    }
                } else {
                    ClientError::Io(e)
                }
            })?;
        }
        rename(&src_fs, &dst_fs).await?;
        Ok(())
    }

    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<()> {
        if path.is_root() {
            return Err(ClientError::InvalidArgument(
                "cannot delete the namespace root".into(),
            ));
        }
        let fs = self.fs_path(path);
        let meta = metadata(&fs).await.map_err(|e| Self::not_found(path, e))?;
        if !meta.is_dir() {
            remove_file(&fs).await?;
            return Ok(());
        }
        let mut rd = read_dir(&fs).await?;
        let occupied = rd.next_entry().await?.is_some();
        if occupied && !recursive {
            return Err(ClientError::InvalidArgument(format!(
                "directory not empty: {path}"
            )));
        }
        if occupied {
            remove_dir_all(&fs).await?;
        } else {
            remove_dir(&fs).await?;
        }
        Ok(())
    }

    async fn mkdirs(&self, path: &DfsPath) -> Result<()> {
        let fs = self.fs_path(path);
        match metadata(&fs).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "a file already exists at this path".into(),
            }),
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::NotADirectory =>
            {
                create_dir_all(&fs).await.map_err(|e| {
                    if e.kind() == io::ErrorKind::NotADirectory {
                        ClientError::RemoteWrite {
                            path: path.to_string(),
                            reason: "a file occupies a parent directory slot".into(),
                        }
                    } else {
                        ClientError::Io(e)
                    }
                })
            }
            Err(e) => Err(ClientError::Io(e)),
        }
    }
}

struct LocalReadStream {
    path: String,
    file: File,
    /// Length captured at open; the seek boundary check runs against it.
    len: u64,
}

#[async_trait]
impl ReadStream for LocalReadStream {
    async fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(ClientError::Seek {
                path: self.path.clone(),
                offset,
                len: self.len,
            });
        }
        self.file.seek(SeekFrom::Start(offset)).await?;
        Ok(())
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf).await?)
    }
}

#[derive(Debug)]
struct LocalWriteStream {
    remote: String,
    temp_path: PathBuf,
    final_path: PathBuf,
    writer: BufWriter<File>,
    closed: bool,
}

#[async_trait]
impl WriteStream for LocalWriteStream {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.writer
            .flush()
            .await
            .map_err(|e| ClientError::RemoteWrite {
                path: self.remote.clone(),
                reason: format!("flush failed: {e}"),
            })?;
        rename(&self.temp_path, &self.final_path)
            .await
            .map_err(|e| ClientError::RemoteWrite {
                path: self.remote.clone(),
                reason: format!("finalize failed: {e}"),
            })?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for LocalWriteStream {
    fn drop(&mut self) {
        if !self.closed {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
