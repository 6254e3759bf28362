//! Body store for Arbor.
//!
//! The body store keeps the raw content of files, addressed by the same
//! materialized paths as the metadata store. It has no transactions of
//! its own.

mod fs;

pub use fs::FsBodyStore;

use crate::tree::{NodePath, ValidationError};
use crate::{ArborError, Result};

/// Content of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBody {
    pub path: NodePath,
    pub content: Vec<u8>,
}

/// Content of a folder and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderBody {
    pub path: NodePath,
    pub folders: Vec<FolderBody>,
    pub files: Vec<FileBody>,
}

impl FolderBody {
    /// The same tree with every path moved from under `old` to under `new`.
    pub fn rebase(&self, old: &NodePath, new: &NodePath) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            path: self.path.rebase(old, new)?,
            folders: self
                .folders
                .iter()
                .map(|folder| folder.rebase(old, new))
                .collect::<std::result::Result<_, _>>()?,
            files: self
                .files
                .iter()
                .map(|file| -> std::result::Result<FileBody, ValidationError> {
                    Ok(FileBody {
                        path: file.path.rebase(old, new)?,
                        content: file.content.clone(),
                    })
                })
                .collect::<std::result::Result<_, _>>()?,
        })
    }

    /// Drop every descendant whose path `keep` rejects, along with
    /// everything below it.
    pub fn retain(&mut self, keep: &impl Fn(&NodePath) -> bool) {
        self.folders.retain(|folder| keep(&folder.path));
        self.files.retain(|file| keep(&file.path));
        for folder in &mut self.folders {
            folder.retain(keep);
        }
    }
}

/// Content operations keyed by materialized path.
///
/// Folder paths address directories, file paths address byte content.
pub trait BodyStore: Send + Sync {
    /// Create the directory at `path`, including missing parents.
    fn create_directory(&self, path: &NodePath) -> Result<()>;

    /// Write `content` as the file at `path`. The parent directory must exist.
    fn create_file(&self, path: &NodePath, content: &[u8]) -> Result<()>;

    /// Move the entry at `old` (and, for a directory, everything inside it)
    /// to `new`. Fails with a conflict if `new` is taken.
    fn rename(&self, old: &NodePath, new: &NodePath) -> Result<()>;

    /// Remove the entry at `path` recursively.
    ///
    /// Returns `false` if there was nothing to remove.
    fn remove(&self, path: &NodePath) -> Result<bool>;

    /// Read the content of the file at `path`.
    fn read_file(&self, path: &NodePath) -> Result<Vec<u8>>;

    /// Paths of the direct children of the directory at `path`, sorted.
    fn list_directory(&self, path: &NodePath) -> Result<Vec<NodePath>>;

    /// Read the directory at `path` with all of its content.
    fn read_directory_tree(&self, path: &NodePath) -> Result<FolderBody> {
        let mut tree = FolderBody {
            path: path.clone(),
            folders: Vec::new(),
            files: Vec::new(),
        };
        for child in self.list_directory(path)? {
            if child.is_folder() {
                tree.folders.push(self.read_directory_tree(&child)?);
            } else {
                let content = self.read_file(&child)?;
                tree.files.push(FileBody {
                    path: child,
                    content,
                });
            }
        }
        Ok(tree)
    }

    /// Write a whole tree, creating its directories first.
    fn write_tree(&self, tree: &FolderBody) -> Result<()> {
        self.create_directory(&tree.path)?;
        for file in &tree.files {
            self.create_file(&file.path, &file.content)?;
        }
        for folder in &tree.folders {
            self.write_tree(folder)?;
        }
        Ok(())
    }

    /// Copy the entry at `old` to `new`, recursively for directories.
    fn copy_tree(&self, old: &NodePath, new: &NodePath) -> Result<()> {
        if old.is_folder() != new.is_folder() {
            return Err(ValidationError::PathMalformed(new.to_string()).into());
        }
        if old.is_folder() {
            let tree = self.read_directory_tree(old)?.rebase(old, new)?;
            self.write_tree(&tree)
        } else {
            let content = self.read_file(old)?;
            self.create_file(new, &content)
        }
    }
}

/// Map a missing body-store entry to a not-found error.
pub(crate) fn content_not_found(path: &NodePath) -> ArborError {
    ArborError::NotFound(format!("content at {path}"))
}
