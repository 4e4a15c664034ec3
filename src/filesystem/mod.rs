//! A bucket presented as a tree of files and directories.
//!
//! [`Filesystem`] reconciles in-memory [`Node`] trees with the flat key
//! space of a [`Bucket`]:
//! - a directory and a file never share a name; writing one deletes the
//!   other first;
//! - each synchronized directory gets an empty `.keep-empty-directory`
//!   object so it stays visible once emptied (see
//!   [`Filesystem::dont_keep_empty_directories`]);
//! - names removed from a directory are deleted, recursively;
//! - nodes read from the bucket are remembered with their path, and writing
//!   the same instance back to the same path is skipped until that path is
//!   deleted.

pub mod local;
pub(crate) mod loaded;
pub mod tree;

use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::bucket::Bucket;
use crate::errors::FilesystemError;
use crate::path::Path;
use loaded::Loaded;
pub use tree::{Content, Directory, File, Name, Node, NodeId};

/// Placeholder object making a directory visible while it has no children.
pub const KEEP_EMPTY_DIRECTORY: &str = ".keep-empty-directory";

/// Name of the directory returned by [`Filesystem::root`].
pub const ROOT_NAME: &str = "root";

pub struct Filesystem {
    bucket: Bucket,
    loaded: Loaded,
    keep_empty_directories: bool,
}

impl Filesystem {
    pub fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            loaded: Loaded::default(),
            keep_empty_directories: true,
        }
    }

    /// Do not write `.keep-empty-directory` placeholders: empty directories
    /// then vanish from listings, as they do natively in S3.
    pub fn dont_keep_empty_directories(mut self) -> Self {
        self.keep_empty_directories = false;
        self
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Write `node` at the top of the bucket.
    pub async fn add(&self, node: &Node) -> Result<(), FilesystemError> {
        self.upload(&Path::none(), node).await
    }

    /// The node named `name` at the top of the bucket.
    ///
    /// A directory comes back with its whole structure listed; contents of
    /// its files are only fetched when read.
    pub async fn get(&self, name: &Name) -> Result<Option<Node>, FilesystemError> {
        let directory = Path::directory([name.as_str()]);
        if self.bucket.contains(&directory).await? {
            let children = self.children(&directory).await?;
            let directory_node = Directory::with_children(name.clone(), children);
            self.loaded.remember(directory_node.id(), directory);
            return Ok(Some(Node::Directory(directory_node)));
        }

        let path = Path::file([name.as_str()]);
        match self.bucket.get(&path).await? {
            Some(content) => {
                let file = File::new(name.clone(), content);
                self.loaded.remember(file.id(), path);
                Ok(Some(Node::File(file)))
            }
            None => Ok(None),
        }
    }

    pub async fn contains(&self, name: &Name) -> Result<bool, FilesystemError> {
        Ok(self.bucket.contains(&Path::file([name.as_str()])).await?
            || self
                .bucket
                .contains(&Path::directory([name.as_str()]))
                .await?)
    }

    /// Delete `name` and everything below it.
    pub async fn remove(&self, name: &Name) -> Result<(), FilesystemError> {
        self.do_remove(Path::file([name.as_str()])).await
    }

    /// The whole bucket as a directory named `root`.
    pub async fn root(&self) -> Result<Directory, FilesystemError> {
        let children = self.children(&Path::none()).await?;
        // ROOT_NAME is a valid name.
        let name = Name::new(ROOT_NAME)?;
        Ok(Directory::with_children(name, children))
    }

    /// Stop remembering where `node` and its descendants were loaded from,
    /// so the next `add` writes them unconditionally.
    ///
    /// Every `get` and `root` records one entry per node it returns, and
    /// entries only go away here or when their path is deleted.  A
    /// long-lived `Filesystem` should forget trees it is done with.
    pub fn forget(&self, node: &Node) {
        self.loaded.forget(node);
    }

    // ── Synchronization ─────────────────────────────────────────────

    fn upload<'a>(
        &'a self,
        parent: &'a Path,
        node: &'a Node,
    ) -> BoxFuture<'a, Result<(), FilesystemError>> {
        async move {
            let target = node.path_in(parent);
            if self.loaded.is_at(node.id(), &target) {
                info!("'{}' is unchanged since loaded, skipping", target);
                return Ok(());
            }

            match node {
                Node::Directory(directory) => {
                    self.remove_file_named_like(parent, directory).await?;
                    let uploaded = self.upload_children(&target, directory).await?;
                    self.remove_dropped_children(&uploaded, &target, directory)
                        .await?;
                }
                Node::File(file) => {
                    self.do_remove(target.as_directory()).await?;
                    let content = file.content().read().await?;
                    self.bucket
                        .upload(&target, content)
                        .await
                        .map_err(|source| FilesystemError::UploadFailed {
                            path: target.to_string(),
                            source,
                        })?;
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Delete the file a directory is about to shadow.
    async fn remove_file_named_like(
        &self,
        parent: &Path,
        directory: &Directory,
    ) -> Result<(), FilesystemError> {
        let file = parent.resolve(&Path::file([directory.name().as_str()]));
        if self.bucket.get(&file).await?.is_some() {
            debug!("Deleting file '{}' shadowed by a directory", file);
            self.loaded.forget_path(&file);
            self.bucket.delete(&file).await?;
        }
        Ok(())
    }

    /// Write every child (and the placeholder), returning the names written.
    async fn upload_children(
        &self,
        target: &Path,
        directory: &Directory,
    ) -> Result<BTreeSet<Name>, FilesystemError> {
        let mut uploaded = BTreeSet::new();
        for child in directory.children() {
            self.upload(target, child).await?;
            uploaded.insert(child.name().clone());
        }

        if self.keep_empty_directories {
            let placeholder = Node::File(File::new(
                Name::new(KEEP_EMPTY_DIRECTORY)?,
                Content::none(),
            ));
            self.upload(target, &placeholder).await?;
            uploaded.insert(placeholder.name().clone());
        }

        Ok(uploaded)
    }

    /// Delete what the directory lost since it was built.
    async fn remove_dropped_children(
        &self,
        uploaded: &BTreeSet<Name>,
        target: &Path,
        directory: &Directory,
    ) -> Result<(), FilesystemError> {
        for name in directory.removed().filter(|name| !uploaded.contains(*name)) {
            // A bare name does not say whether it was a file or a directory;
            // removing it as a file also removes a directory of that name.
            self.do_remove(target.resolve(&Path::file([name.as_str()])))
                .await?;
        }
        Ok(())
    }

    /// Delete everything below `path` (as a directory), then `path` itself.
    fn do_remove(&self, path: Path) -> BoxFuture<'_, Result<(), FilesystemError>> {
        async move {
            self.loaded.forget_path(&path);
            self.remove_descendants(path.as_directory()).await?;
            self.bucket.delete(&path).await?;
            Ok(())
        }
        .boxed()
    }

    /// Delete every key below `directory`, deepest first.
    async fn remove_descendants(&self, directory: Path) -> Result<(), FilesystemError> {
        // The listing completes before any delete is sent.
        let entries: Vec<Path> = self.bucket.list(&directory)?.try_collect().await?;
        for entry in entries {
            let path = directory.resolve(&entry);
            if path.segments() == directory.segments() {
                warn!("Skipping '{}': listed inside itself", entry);
                continue;
            }
            self.do_remove(path).await?;
        }
        Ok(())
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Nodes below `folder`, files with deferred content.
    fn children<'a>(
        &'a self,
        folder: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Node>, FilesystemError>> {
        async move {
            let entries: Vec<Path> = self.bucket.list(folder)?.try_collect().await?;

            let mut nodes = Vec::with_capacity(entries.len());
            for entry in entries {
                let path = folder.resolve(&entry);
                let Some(raw) = entry.name() else {
                    continue;
                };
                if raw == KEEP_EMPTY_DIRECTORY {
                    continue;
                }
                let name = match Name::new(raw) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!("Skipping '{}': {}", path, e);
                        continue;
                    }
                };

                let node = if entry.is_directory() {
                    Node::Directory(Directory::with_children(name, self.children(&path).await?))
                } else {
                    Node::File(File::new(
                        name,
                        Content::Remote {
                            bucket: self.bucket.clone(),
                            path: path.clone(),
                        },
                    ))
                };
                self.loaded.remember(node.id(), path);
                nodes.push(node);
            }

            Ok(nodes)
        }
        .boxed()
    }
}
