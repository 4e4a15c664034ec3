//! Mirroring between local disk trees and [`Node`]s.

use anyhow::Context;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path as LocalPath, PathBuf};

use super::tree::{Directory, File, Name, Node};

/// Build a node from a local file or directory, contents read eagerly.
pub fn read_tree(source: &LocalPath) -> anyhow::Result<Node> {
    let raw = source
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", source.display()))?;
    let name = Name::new(raw)?;

    let metadata = std::fs::metadata(source)
        .with_context(|| format!("cannot read {}", source.display()))?;
    if !metadata.is_dir() {
        let data = std::fs::read(source)
            .with_context(|| format!("cannot read {}", source.display()))?;
        return Ok(Node::File(File::new(name, data)));
    }

    let mut children = Vec::new();
    for entry in std::fs::read_dir(source)? {
        children.push(read_tree(&entry?.path())?);
    }
    Ok(Node::Directory(Directory::with_children(name, children)))
}

/// Write `node` inside the existing directory `destination`, reading
/// deferred contents as needed.  Returns the path written.
pub fn write_tree<'a>(
    node: &'a Node,
    destination: &'a LocalPath,
) -> BoxFuture<'a, anyhow::Result<PathBuf>> {
    async move {
        let target = destination.join(node.name().as_str());
        match node {
            Node::File(file) => {
                let data = file.content().read().await?;
                std::fs::write(&target, &data)
                    .with_context(|| format!("cannot write {}", target.display()))?;
            }
            Node::Directory(directory) => {
                std::fs::create_dir_all(&target)
                    .with_context(|| format!("cannot create {}", target.display()))?;
                for child in directory.children() {
                    write_tree(child, &target).await?;
                }
            }
        }
        Ok(target)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_read_then_write_tree() {
        let source = tempfile::tempdir().expect("failed to create temp dir");
        let tree = source.path().join("project");
        std::fs::create_dir_all(tree.join("src")).unwrap();
        std::fs::write(tree.join("README"), "readme").unwrap();
        std::fs::write(tree.join("src").join("main.rs"), "fn main() {}").unwrap();

        let node = read_tree(&tree).unwrap();
        let Node::Directory(directory) = &node else {
            panic!("expected a directory");
        };
        assert_eq!(directory.name().as_str(), "project");
        let Some(Node::File(readme)) = directory.get(&Name::new("README").unwrap()) else {
            panic!("expected a file");
        };
        assert_eq!(readme.content().read().await.unwrap(), Bytes::from("readme"));

        let destination = tempfile::tempdir().expect("failed to create temp dir");
        let written = write_tree(&node, destination.path()).await.unwrap();
        assert_eq!(written, destination.path().join("project"));
        assert_eq!(
            std::fs::read_to_string(written.join("src").join("main.rs")).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_read_single_file() {
        let source = tempfile::tempdir().expect("failed to create temp dir");
        let path = source.path().join("note.txt");
        std::fs::write(&path, "x").unwrap();

        let node = read_tree(&path).unwrap();
        assert!(matches!(node, Node::File(_)));
        assert_eq!(node.name().as_str(), "note.txt");
    }

    #[test]
    fn test_read_missing_path_fails() {
        let source = tempfile::tempdir().expect("failed to create temp dir");
        assert!(read_tree(&source.path().join("absent")).is_err());
    }
}
