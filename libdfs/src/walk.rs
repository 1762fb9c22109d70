//! Depth-first namespace traversal over a [`RemoteStore`].
//!
//! The frontier is an explicit stack, so arbitrarily deep trees cost heap
//! instead of call stack. Entry paths come straight from store listings;
//! nothing here re-derives a path from its parent's string.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::path::DfsPath;
use crate::store::{DirEntry, RemoteStore};

/// Traversal behavior.
#[derive(Clone)]
pub struct WalkOptions {
    /// Abort on the first listing failure instead of reporting it and
    /// skipping the subtree. Failure to list the root always aborts.
    pub fail_fast: bool,
    /// Maximum directory depth below the root before the walk aborts with
    /// `ClientError::DepthLimit`.
    pub max_depth: usize,
    pub cancel: CancellationToken,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_depth: 1024,
            cancel: CancellationToken::new(),
        }
    }
}

/// What the visitor sees during a walk.
pub enum WalkEvent<'a> {
    /// A file or directory, in depth-first preorder.
    Entry(&'a DirEntry),
    /// A directory listing that failed in continue mode; its subtree is
    /// skipped.
    ListError {
        path: &'a DfsPath,
        error: &'a ClientError,
    },
}

/// Tally of one finished walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub files: u64,
    pub dirs: u64,
    pub list_errors: u64,
}

/// Iterative depth-first walker.
pub struct NamespaceWalker<'a, S: RemoteStore> {
    store: &'a S,
    opts: WalkOptions,
}

impl<'a, S: RemoteStore> NamespaceWalker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_options(store, WalkOptions::default())
    }

    pub fn with_options(store: &'a S, opts: WalkOptions) -> Self {
        Self { store, opts }
    }

    /// Visit everything under `root` in strict depth-first preorder: entries
    /// in listing order, and a subdirectory's contents before its later
    /// siblings. The root itself is not emitted.
    ///
    /// A store that reports the same directory twice (through any parent) is
    /// treated as cyclic and aborts the walk.
    pub async fn walk<F>(&self, root: &DfsPath, mut visit: F) -> Result<WalkStats>
    where
        F: FnMut(WalkEvent<'_>),
    {
        if self.opts.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let mut stats = WalkStats::default();
        let mut seen: HashSet<DfsPath> = HashSet::new();
        seen.insert(root.clone());

        // Failure to list the root aborts in both modes.
        let root_entries = self.store.list(root).await?;
        // Each frame is the partially consumed listing of one directory, so
        // stack height equals the current nesting depth.
        let mut stack: Vec<std::vec::IntoIter<DirEntry>> = vec![root_entries.into_iter()];

        loop {
            if self.opts.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            let entry = match stack.last_mut() {
                None => break,
                Some(frame) => match frame.next() {
                    Some(entry) => entry,
                    None => {
                        stack.pop();
                        continue;
                    }
                },
            };
            visit(WalkEvent::Entry(&entry));
            if !entry.is_dir {
                stats.files += 1;
                continue;
            }
            stats.dirs += 1;
            if !seen.insert(entry.path.clone()) {
                return Err(ClientError::NamespaceCycle(entry.path.to_string()));
            }
            if stack.len() + 1 > self.opts.max_depth {
                return Err(ClientError::DepthLimit {
                    path: entry.path.to_string(),
                    limit: self.opts.max_depth,
                });
            }
            match self.store.list(&entry.path).await {
                Ok(children) => stack.push(children.into_iter()),
                Err(e) => {
                    if self.opts.fail_fast {
                        return Err(e);
                    }
                    tracing::warn!("skipping unlistable directory {}: {}", entry.path, e);
                    stats.list_errors += 1;
                    visit(WalkEvent::ListError {
                        path: &entry.path,
                        error: &e,
                    });
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn p(s: &str) -> DfsPath {
        DfsPath::new(s).unwrap()
    }

    async fn sample_tree() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_file(&p("/a/1.txt"), b"1".to_vec()).unwrap();
        store.insert_file(&p("/a/sub/2.txt"), b"22".to_vec()).unwrap();
        store.insert_file(&p("/b/3.txt"), b"333".to_vec()).unwrap();
        store.mkdirs(&p("/c")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn preorder_visits_dirs_before_their_contents() {
        let store = sample_tree().await;
        let walker = NamespaceWalker::new(&store);
        let mut order = Vec::new();
        let stats = walker
            .walk(&DfsPath::root(), |ev| {
                if let WalkEvent::Entry(e) = ev {
                    order.push(e.path.to_string());
                }
            })
            .await
            .unwrap();

        assert_eq!(
            order,
            ["/a", "/a/1.txt", "/a/sub", "/a/sub/2.txt", "/b", "/b/3.txt", "/c"]
        );
        assert_eq!(stats.files, 3);
        assert_eq!(stats.dirs, 4);
        assert_eq!(stats.list_errors, 0);
    }

    #[tokio::test]
    async fn walk_of_subdirectory_emits_only_that_subtree() {
        let store = sample_tree().await;
        let walker = NamespaceWalker::new(&store);
        let mut order = Vec::new();
        walker
            .walk(&p("/a"), |ev| {
                if let WalkEvent::Entry(e) = ev {
                    order.push(e.path.to_string());
                }
            })
            .await
            .unwrap();
        assert_eq!(order, ["/a/1.txt", "/a/sub", "/a/sub/2.txt"]);
    }

    #[tokio::test]
    async fn missing_root_fails_even_in_continue_mode() {
        let store = InMemoryStore::new();
        let walker = NamespaceWalker::new(&store);
        let err = walker.walk(&p("/absent"), |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn depth_guard_trips_on_deep_trees() {
        let store = InMemoryStore::new();
        store.mkdirs(&p("/d0/d1/d2/d3/d4")).await.unwrap();
        let walker = NamespaceWalker::with_options(
            &store,
            WalkOptions {
                max_depth: 3,
                ..Default::default()
            },
        );
        let err = walker.walk(&DfsPath::root(), |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::DepthLimit { limit: 3, .. }));
    }

    #[tokio::test]
    async fn walking_a_file_visits_it_once() {
        let store = sample_tree().await;
        let walker = NamespaceWalker::new(&store);
        let mut count = 0;
        let stats = walker
            .walk(&p("/a/1.txt"), |ev| {
                if let WalkEvent::Entry(e) = ev {
                    assert_eq!(e.path.as_str(), "/a/1.txt");
                    assert!(!e.is_dir);
                    count += 1;
                }
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.dirs, 0);
    }

    // A store that keeps reporting the same directory, as a broken or
    // adversarial namespace would.
    struct CyclicStore;

    #[async_trait::async_trait]
    impl RemoteStore for CyclicStore {
        async fn open_read(
            &self,
            path: &DfsPath,
        ) -> crate::error::Result<Box<dyn crate::store::ReadStream>> {
            Err(ClientError::NotFound(path.to_string()))
        }

        async fn open_write(
            &self,
            path: &DfsPath,
            _overwrite: bool,
        ) -> crate::error::Result<Box<dyn crate::store::WriteStream>> {
            Err(ClientError::NotFound(path.to_string()))
        }

        async fn status(&self, path: &DfsPath) -> crate::error::Result<crate::store::FileStatus> {
            Err(ClientError::NotFound(path.to_string()))
        }

        async fn list(&self, _path: &DfsPath) -> crate::error::Result<Vec<DirEntry>> {
            Ok(vec![DirEntry {
                path: DfsPath::new("/x").unwrap(),
                is_dir: true,
                size: 0,
            }])
        }

        async fn block_locations(
            &self,
            path: &DfsPath,
        ) -> crate::error::Result<Vec<crate::store::BlockLocation>> {
            Err(ClientError::NotFound(path.to_string()))
        }

        async fn rename(&self, src: &DfsPath, _dst: &DfsPath) -> crate::error::Result<()> {
            Err(ClientError::NotFound(src.to_string()))
        }

        async fn delete(&self, path: &DfsPath, _recursive: bool) -> crate::error::Result<()> {
            Err(ClientError::NotFound(path.to_string()))
        }

        async fn mkdirs(&self, path: &DfsPath) -> crate::error::Result<()> {
            Err(ClientError::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn repeated_directory_reports_abort_as_a_cycle() {
        let store = CyclicStore;
        let walker = NamespaceWalker::new(&store);
        let err = walker.walk(&DfsPath::root(), |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::NamespaceCycle(_)));
    }

    #[tokio::test]
    async fn cancelled_walk_stops_at_a_boundary() {
        let store = sample_tree().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let walker = NamespaceWalker::with_options(
            &store,
            WalkOptions {
                cancel,
                ..Default::default()
            },
        );
        let err = walker.walk(&DfsPath::root(), |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }
}
