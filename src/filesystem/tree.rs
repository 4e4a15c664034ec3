//! In-memory file trees.
//!
//! A [`Node`] is either a [`File`] or a [`Directory`].  Every node carries a
//! [`NodeId`] identifying this exact instance: clones share it, while any
//! mutation of a directory gives the directory a fresh one.

use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bucket::Bucket;
use crate::errors::{BucketError, ValidationError};
use crate::path::{Path, SEPARATOR};

/// Identity of a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Name of a file or directory: non-empty, no separator, not `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        if value.is_empty() || value == "." || value == ".." || value.contains(SEPARATOR) {
            return Err(ValidationError::InvalidName {
                name: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// File content, either held in memory or fetched from a bucket on read.
#[derive(Debug, Clone)]
pub enum Content {
    Bytes(Bytes),
    /// Fetched on every [`Content::read`].  An object that disappeared in
    /// the meantime reads as empty.
    Remote { bucket: Bucket, path: Path },
}

impl Content {
    /// Empty content.
    pub fn none() -> Self {
        Content::Bytes(Bytes::new())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Content::Remote { .. })
    }

    pub async fn read(&self) -> Result<Bytes, BucketError> {
        match self {
            Content::Bytes(bytes) => Ok(bytes.clone()),
            Content::Remote { bucket, path } => Ok(bucket.get(path).await?.unwrap_or_default()),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(Bytes::from(bytes))
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Bytes(Bytes::copy_from_slice(text.as_bytes()))
    }
}

/// A named piece of content.
#[derive(Debug, Clone)]
pub struct File {
    id: NodeId,
    name: Name,
    content: Content,
}

impl File {
    pub fn new(name: Name, content: impl Into<Content>) -> Self {
        Self {
            id: NodeId::next(),
            name,
            content: content.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn content(&self) -> &Content {
        &self.content
    }
}

/// A named set of children, plus the names removed from it since it was
/// built.  A name is never both a child and removed.
#[derive(Debug, Clone)]
pub struct Directory {
    id: NodeId,
    name: Name,
    children: BTreeMap<Name, Node>,
    removed: BTreeSet<Name>,
}

impl Directory {
    pub fn new(name: Name) -> Self {
        Self::with_children(name, Vec::new())
    }

    /// A directory holding `children`; a later child replaces an earlier
    /// one of the same name.
    pub fn with_children(name: Name, children: impl IntoIterator<Item = Node>) -> Self {
        Self {
            id: NodeId::next(),
            name,
            children: children
                .into_iter()
                .map(|child| (child.name().clone(), child))
                .collect(),
            removed: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Add or replace a child.
    pub fn add(&mut self, child: impl Into<Node>) {
        let child = child.into();
        self.removed.remove(child.name());
        self.children.insert(child.name().clone(), child);
        self.id = NodeId::next();
    }

    /// Remove a child, remembering its name so a sync deletes it.
    pub fn remove(&mut self, name: &Name) {
        self.children.remove(name);
        self.removed.insert(name.clone());
        self.id = NodeId::next();
    }

    pub fn get(&self, name: &Name) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.children.contains_key(name)
    }

    /// Children ordered by name.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    pub fn removed(&self) -> impl Iterator<Item = &Name> {
        self.removed.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    File(File),
    Directory(Directory),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::File(file) => file.id(),
            Node::Directory(directory) => directory.id(),
        }
    }

    pub fn name(&self) -> &Name {
        match self {
            Node::File(file) => file.name(),
            Node::Directory(directory) => directory.name(),
        }
    }

    /// Path of this node inside `parent`.
    pub(crate) fn path_in(&self, parent: &Path) -> Path {
        let name = [self.name().as_str()];
        match self {
            Node::File(_) => parent.resolve(&Path::file(name)),
            Node::Directory(_) => parent.resolve(&Path::directory(name)),
        }
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Directory> for Node {
    fn from(directory: Directory) -> Self {
        Node::Directory(directory)
    }
}
