//! Where each node instance was read from the bucket.
//!
//! Entries are a cache: a missing entry only costs a redundant upload, while
//! a stale one would skip a needed write.  Entries are therefore dropped as
//! soon as the path they point at is deleted.

use std::collections::HashMap;
use std::sync::RwLock;

use super::tree::{Node, NodeId};
use crate::path::Path;

#[derive(Debug, Default)]
pub(crate) struct Loaded {
    paths: RwLock<HashMap<NodeId, Path>>,
}

impl Loaded {
    pub(crate) fn remember(&self, id: NodeId, path: Path) {
        self.paths.write().expect("rwlock poisoned").insert(id, path);
    }

    /// Whether `id` was last seen at exactly `path`.
    pub(crate) fn is_at(&self, id: NodeId, path: &Path) -> bool {
        self.paths
            .read()
            .expect("rwlock poisoned")
            .get(&id)
            .is_some_and(|known| known == path)
    }

    /// Drop the entries of `node` and of all its descendants.
    pub(crate) fn forget(&self, node: &Node) {
        let mut paths = self.paths.write().expect("rwlock poisoned");
        let mut pending = vec![node];
        while let Some(node) = pending.pop() {
            paths.remove(&node.id());
            if let Node::Directory(directory) = node {
                pending.extend(directory.children());
            }
        }
    }

    /// Drop every entry pointing at `path`, at its directory form, or below
    /// it.
    pub(crate) fn forget_path(&self, path: &Path) {
        let directory = path.as_directory();
        let depth = path.segments().len();
        self.paths.write().expect("rwlock poisoned").retain(|_, known| {
            let below = known.segments().len() > depth
                && known.segments().starts_with(path.segments());
            !(below || *known == *path || *known == directory)
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.paths.read().expect("rwlock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::tree::{Directory, File, Name};

    #[test]
    fn test_remember_and_forget() {
        let loaded = Loaded::default();
        let file = File::new(Name::new("f").unwrap(), "");
        let directory =
            Directory::with_children(Name::new("d").unwrap(), [Node::File(file.clone())]);

        loaded.remember(file.id(), Path::parse("d/f"));
        loaded.remember(directory.id(), Path::parse("d/"));
        assert!(loaded.is_at(file.id(), &Path::parse("d/f")));
        assert!(!loaded.is_at(file.id(), &Path::parse("f")));
        assert_eq!(loaded.len(), 2);

        loaded.forget(&Node::Directory(directory));
        assert_eq!(loaded.len(), 0);
        assert!(!loaded.is_at(file.id(), &Path::parse("d/f")));
    }

    #[test]
    fn test_forget_path_drops_entries_at_and_below() {
        let loaded = Loaded::default();
        let ids: Vec<NodeId> = (0..5)
            .map(|_| File::new(Name::new("x").unwrap(), "").id())
            .collect();
        loaded.remember(ids[0], Path::parse("a"));
        loaded.remember(ids[1], Path::parse("a/"));
        loaded.remember(ids[2], Path::parse("a/b/c"));
        loaded.remember(ids[3], Path::parse("ab"));
        loaded.remember(ids[4], Path::parse("b/a"));

        loaded.forget_path(&Path::parse("a/"));
        assert!(loaded.is_at(ids[0], &Path::parse("a")));
        assert_eq!(loaded.len(), 3);

        loaded.forget_path(&Path::parse("a"));
        assert_eq!(loaded.len(), 2);
        assert!(loaded.is_at(ids[3], &Path::parse("ab")));
        assert!(loaded.is_at(ids[4], &Path::parse("b/a")));
    }
}
