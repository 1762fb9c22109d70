//! In-memory store: the test and local-development backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{ClientError, Result};
use crate::path::DfsPath;

use super::{
    BlockLocation, DEFAULT_BLOCK_SIZE, DirEntry, FileStatus, ReadStream, RemoteStore, WriteStream,
    synthesize_blocks,
};

#[derive(Debug)]
struct FileNode {
    data: Arc<Vec<u8>>,
    /// Explicit placement injected by tests; `None` means synthesize from
    /// the configured layout.
    blocks: Option<Vec<BlockLocation>>,
}

#[derive(Debug)]
struct Namespace {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, FileNode>,
}

impl Namespace {
    fn new() -> Self {
        // The root always exists.
        Self {
            dirs: BTreeSet::from(["/".to_string()]),
            files: BTreeMap::new(),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.dirs.contains(key) || self.files.contains_key(key)
    }

    fn ensure_parents(&mut self, path: &DfsPath) -> Result<()> {
        let mut cur = path.parent();
        let mut missing = Vec::new();
        while let Some(dir) = cur {
            if self.files.contains_key(dir.as_str()) {
                return Err(ClientError::RemoteWrite {
                    path: dir.to_string(),
                    reason: "a file occupies a parent directory slot".into(),
                });
            }
            if self.dirs.contains(dir.as_str()) {
                break;
            }
            missing.push(dir.as_str().to_string());
            cur = dir.parent();
        }
        self.dirs.extend(missing);
        Ok(())
    }

    fn children_of(&self, dir: &str) -> Vec<DirEntry> {
        let mut entries: Vec<DirEntry> = self
            .dirs
            .iter()
            .filter(|d| direct_child_of(d, dir))
            .map(|d| DirEntry {
                path: DfsPath::from_normalized(d.clone()),
                is_dir: true,
                size: 0,
            })
            .chain(
                self.files
                    .iter()
                    .filter(|(f, _)| direct_child_of(f, dir))
                    .map(|(f, node)| DirEntry {
                        path: DfsPath::from_normalized(f.clone()),
                        is_dir: false,
                        size: node.data.len() as u64,
                    }),
            )
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

fn direct_child_of(candidate: &str, dir: &str) -> bool {
    let rest = if dir == "/" {
        candidate.strip_prefix('/')
    } else {
        candidate
            .strip_prefix(dir)
            .and_then(|r| r.strip_prefix('/'))
    };
    matches!(rest, Some(r) if !r.is_empty() && !r.contains('/'))
}

fn subtree_key(path: &DfsPath) -> String {
    format!("{}/", path.as_str())
}

/// Whole namespace held in memory behind one lock.
///
/// Block placement is synthesized from the configured layout unless a test
/// injected explicit locations with [`InMemoryStore::set_block_locations`].
pub struct InMemoryStore {
    state: Arc<Mutex<Namespace>>,
    block_size: u64,
    replication: u16,
    hosts: Vec<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_layout(
            DEFAULT_BLOCK_SIZE,
            3,
            vec!["dn-0".into(), "dn-1".into(), "dn-2".into()],
        )
    }

    pub fn with_layout(block_size: u64, replication: u16, hosts: Vec<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Namespace::new())),
            block_size,
            replication,
            hosts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Namespace> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a file directly, creating missing parents.
    pub fn insert_file(&self, path: &DfsPath, data: impl Into<Vec<u8>>) -> Result<()> {
        if path.is_root() {
            return Err(ClientError::InvalidArgument(
                "cannot create a file at the namespace root".into(),
            ));
        }
        let mut ns = self.lock();
        if ns.dirs.contains(path.as_str()) {
            return Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "path is a directory".into(),
            });
        }
        ns.ensure_parents(path)?;
        ns.files.insert(
            path.as_str().to_string(),
            FileNode {
                data: Arc::new(data.into()),
                blocks: None,
            },
        );
        Ok(())
    }

    /// Read a file's current contents; test convenience.
    pub fn file_contents(&self, path: &DfsPath) -> Result<Vec<u8>> {
        let ns = self.lock();
        ns.files
            .get(path.as_str())
            .map(|node| node.data.as_ref().clone())
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }

    /// Override the reported placement of an existing file, in any order.
    pub fn set_block_locations(&self, path: &DfsPath, blocks: Vec<BlockLocation>) -> Result<()> {
        let mut ns = self.lock();
        match ns.files.get_mut(path.as_str()) {
            Some(node) => {
                node.blocks = Some(blocks);
                Ok(())
            }
            None => Err(ClientError::NotFound(path.to_string())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn open_read(&self, path: &DfsPath) -> Result<Box<dyn ReadStream>> {
        let ns = self.lock();
        if ns.dirs.contains(path.as_str()) {
            return Err(ClientError::NotFound(format!(
                "{path}: directory where a file is required"
            )));
        }
        match ns.files.get(path.as_str()) {
            Some(node) => Ok(Box::new(MemoryReadStream {
                path: path.to_string(),
                data: Arc::clone(&node.data),
                pos: 0,
            })),
            None => Err(ClientError::NotFound(path.to_string())),
        }
    }

    async fn open_write(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn WriteStream>> {
        if path.is_root() {
            return Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "cannot write to the namespace root".into(),
            });
        }
        let mut ns = self.lock();
        if ns.dirs.contains(path.as_str()) {
            return Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "path is a directory".into(),
            });
        }
        if !overwrite && ns.files.contains_key(path.as_str()) {
            return Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "path already exists".into(),
            });
        }
        ns.ensure_parents(path)?;
        Ok(Box::new(MemoryWriteStream {
            state: Arc::clone(&self.state),
            path: path.as_str().to_string(),
            buf: Vec::new(),
            closed: false,
        }))
    }

    async fn status(&self, path: &DfsPath) -> Result<FileStatus> {
        let ns = self.lock();
        if ns.dirs.contains(path.as_str()) {
            return Ok(FileStatus {
                path: path.clone(),
                is_dir: true,
                size: 0,
                block_size: 0,
                replication: 0,
            });
        }
        match ns.files.get(path.as_str()) {
            Some(node) => Ok(FileStatus {
                path: path.clone(),
                is_dir: false,
                size: node.data.len() as u64,
                block_size: self.block_size,
                replication: self.replication,
            }),
            None => Err(ClientError::NotFound(path.to_string())),
        }
    }

    async fn list(&self, path: &DfsPath) -> Result<Vec<DirEntry>> {
        let ns = self.lock();
        if ns.dirs.contains(path.as_str()) {
            return Ok(ns.children_of(path.as_str()));
        }
        match ns.files.get(path.as_str()) {
            Some(node) => Ok(vec![DirEntry {
                path: path.clone(),
                is_dir: false,
                size: node.data.len() as u64,
            }]),
            None => Err(ClientError::NotFound(path.to_string())),
        }
    }

    async fn block_locations(&self, path: &DfsPath) -> Result<Vec<BlockLocation>> {
        let ns = self.lock();
        if ns.dirs.contains(path.as_str()) {
            return Err(ClientError::NotFound(format!(
                "{path}: directory where a file is required"
            )));
        }
        match ns.files.get(path.as_str()) {
            Some(node) => Ok(match &node.blocks {
                Some(blocks) => blocks.clone(),
                None => synthesize_blocks(
                    node.data.len() as u64,
                    self.block_size,
                    self.replication,
                    &self.hosts,
                ),
            }),
            None => Err(ClientError::NotFound(path.to_string())),
        }
    }

    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<()> {
        if src.is_root() {
            return Err(ClientError::InvalidArgument(
                "cannot rename the namespace root".into(),
            ));
        }
        if dst.as_str().starts_with(&subtree_key(src)) || src == dst {
            return Err(ClientError::InvalidArgument(format!(
                "cannot rename {src} into itself"
            )));
        }
        let mut ns = self.lock();
        if !ns.exists(src.as_str()) {
            return Err(ClientError::NotFound(src.to_string()));
        }
        if ns.exists(dst.as_str()) {
            return Err(ClientError::RemoteWrite {
                path: dst.to_string(),
                reason: "destination already exists".into(),
            });
        }
        ns.ensure_parents(dst)?;
        if let Some(node) = ns.files.remove(src.as_str()) {
            ns.files.insert(dst.as_str().to_string(), node);
            return Ok(());
        }
        // Directory: move the node and every descendant key.
        ns.dirs.remove(src.as_str());
        ns.dirs.insert(dst.as_str().to_string());
        let prefix = subtree_key(src);
        let moved_dirs: Vec<String> = ns
            .dirs
            .iter()
            .filter(|d| d.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved_dirs {
            ns.dirs.remove(&old);
            ns.dirs
                .insert(format!("{}/{}", dst.as_str(), &old[prefix.len()..]));
        }
        let moved_files: Vec<String> = ns
            .files
            .keys()
            .filter(|f| f.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved_files {
            if let Some(node) = ns.files.remove(&old) {
                ns.files
                    .insert(format!("{}/{}", dst.as_str(), &old[prefix.len()..]), node);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<()> {
        if path.is_root() {
            return Err(ClientError::InvalidArgument(
                "cannot delete the namespace root".into(),
            ));
        }
        let mut ns = self.lock();
        if ns.files.remove(path.as_str()).is_some() {
            return Ok(());
        }
        if !ns.dirs.contains(path.as_str()) {
            return Err(ClientError::NotFound(path.to_string()));
        }
        let prefix = subtree_key(path);
        let occupied = ns.dirs.iter().any(|d| d.starts_with(&prefix))
            || ns.files.keys().any(|f| f.starts_with(&prefix));
        if occupied && !recursive {
            return Err(ClientError::InvalidArgument(format!(
                "directory not empty: {path}"
            )));
        }
        ns.dirs.retain(|d| d != path.as_str() && !d.starts_with(&prefix));
        ns.files.retain(|f, _| !f.starts_with(&prefix));
        Ok(())
    }

    async fn mkdirs(&self, path: &DfsPath) -> Result<()> {
        let mut ns = self.lock();
        if ns.files.contains_key(path.as_str()) {
            return Err(ClientError::RemoteWrite {
                path: path.to_string(),
                reason: "a file already exists at this path".into(),
            });
        }
        ns.ensure_parents(path)?;
        if !path.is_root() {
            ns.dirs.insert(path.as_str().to_string());
        }
        Ok(())
    }
}

struct MemoryReadStream {
    path: String,
    data: Arc<Vec<u8>>,
    pos: usize,
}

#[async_trait]
impl ReadStream for MemoryReadStream {
    async fn seek(&mut self, offset: u64) -> Result<()> {
        let len = self.data.len() as u64;
        if offset > len {
            return Err(ClientError::Seek {
                path: self.path.clone(),
                offset,
                len,
            });
        }
        self.pos = offset as usize;
        Ok(())
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Debug)]
struct MemoryWriteStream {
    state: Arc<Mutex<Namespace>>,
    path: String,
    buf: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl WriteStream for MemoryWriteStream {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut ns = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        ns.files.insert(
            self.path.clone(),
            FileNode {
                data: Arc::new(std::mem::take(&mut self.buf)),
                blocks: None,
            },
        );
        self.closed = true;
        Ok(())
    }
}
