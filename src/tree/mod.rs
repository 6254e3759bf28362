//! Directory tree model for Arbor.
//!
//! This module provides:
//! - Validated value objects (names, materialized paths, MIME types)
//! - Folder and file entities with their repositories
//! - Path consistency checks (duplicates, descendant rewrites)
//! - Visibility scopes for hidden objects

mod consistency;
mod file;
mod folder;
pub mod mime;
mod value;
mod visibility;

pub use consistency::PathService;
pub use file::{FileNode, FileRepository, NewFile};
pub use folder::{FolderNode, FolderRepository, NewFolder};
pub use value::{
    MimeType, Name, NodePath, ValidationError, FORBIDDEN_NAME_CHARS, MAX_MIME_TYPE_LENGTH,
    MAX_NAME_LENGTH, MAX_PATH_LENGTH, SEPARATOR,
};
pub use visibility::Visibility;
