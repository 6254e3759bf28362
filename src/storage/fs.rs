//! Filesystem body store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::{content_not_found, BodyStore};
use crate::tree::{Name, NodePath, ValidationError};
use crate::{ArborError, Result};

/// Directory under the base path that mirrors the folder tree.
const TREE_DIR: &str = "tree";
/// Directory under the base path holding in-flight writes.
const STAGING_DIR: &str = "staging";

/// Body store that mirrors the directory tree under a base directory.
///
/// ```text
/// {base_path}/
/// ├── tree/                <- /
/// │   ├── docs/            <- /docs/
/// │   │   └── a.txt        <- /docs/a.txt
/// │   └── readme.md        <- /readme.md
/// └── staging/             <- partial writes, never addressable
/// ```
#[derive(Debug, Clone)]
pub struct FsBodyStore {
    base_path: PathBuf,
    /// Directory backing the root folder.
    tree_path: PathBuf,
    staging_path: PathBuf,
}

impl FsBodyStore {
    /// Create a new FsBodyStore with the given base path.
    ///
    /// The base directory will be created if it doesn't exist. Partial
    /// writes left over from an interrupted run are discarded.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        let tree_path = base_path.join(TREE_DIR);
        let staging_path = base_path.join(STAGING_DIR);

        if staging_path.exists() {
            let stale = fs::read_dir(&staging_path)?.count();
            if stale > 0 {
                warn!("Discarding {} partial writes in {:?}", stale, staging_path);
            }
            fs::remove_dir_all(&staging_path)?;
        }
        fs::create_dir_all(&tree_path)?;
        fs::create_dir_all(&staging_path)?;

        Ok(Self {
            base_path,
            tree_path,
            staging_path,
        })
    }

    /// Get the base path of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the filesystem location of a materialized path.
    pub fn resolve(&self, path: &NodePath) -> PathBuf {
        let relative = path.as_str().trim_matches('/');
        if relative.is_empty() {
            self.tree_path.clone()
        } else {
            self.tree_path.join(relative)
        }
    }
}

impl BodyStore for FsBodyStore {
    fn create_directory(&self, path: &NodePath) -> Result<()> {
        path.require_folder()?;
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn create_file(&self, path: &NodePath, content: &[u8]) -> Result<()> {
        if path.is_folder() {
            return Err(ValidationError::PathMalformed(path.to_string()).into());
        }
        let target = self.resolve(path);

        // Staged outside the tree, so a reader never sees a partially
        // written body
        let partial = self.staging_path.join(format!("{}.part", Uuid::new_v4()));
        if let Err(e) = fs::write(&partial, content) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&partial, &target) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        debug!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }

    fn rename(&self, old: &NodePath, new: &NodePath) -> Result<()> {
        let from = self.resolve(old);
        let to = self.resolve(new);

        if fs::symlink_metadata(&to).is_ok() {
            return Err(ArborError::Conflict(format!("content at {new} already exists")));
        }
        match fs::rename(&from, &to) {
            Ok(()) => {
                debug!("Renamed content {} to {}", old, new);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(content_not_found(old)),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, path: &NodePath) -> Result<bool> {
        let target = self.resolve(path);

        let metadata = match fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("No content to remove at {}", path);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&target)?;
        } else {
            fs::remove_file(&target)?;
        }

        debug!("Removed content at {}", path);
        Ok(true)
    }

    fn read_file(&self, path: &NodePath) -> Result<Vec<u8>> {
        if path.is_folder() {
            return Err(ValidationError::PathMalformed(path.to_string()).into());
        }

        match fs::read(self.resolve(path)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(content_not_found(path)),
            Err(e) => Err(e.into()),
        }
    }

    fn list_directory(&self, path: &NodePath) -> Result<Vec<NodePath>> {
        path.require_folder()?;

        let entries = match fs::read_dir(self.resolve(path)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(content_not_found(path)),
            Err(e) => return Err(e.into()),
        };

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                warn!("Skipping non UTF-8 entry {:?} in {}", entry.path(), path);
                continue;
            };
            let name = match Name::new(file_name) {
                Ok(name) => name,
                Err(e) => {
                    warn!("Skipping entry {:?} in {}: {}", file_name, path, e);
                    continue;
                }
            };

            let child = if entry.file_type()?.is_dir() {
                path.child_folder(&name)?
            } else {
                path.child_file(&name)?
            };
            children.push(child);
        }

        children.sort();
        Ok(children)
    }
}
