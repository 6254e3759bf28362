//! Serializable views of tree entities.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tree::{FileNode, FolderNode};

/// A folder with the descendants it was loaded with.
#[derive(Debug, Clone, Serialize)]
pub struct FolderDto {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub path: String,
    pub is_hidden: bool,
    pub folders: Vec<FolderDto>,
    pub files: Vec<FileDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A file's metadata.
#[derive(Debug, Clone, Serialize)]
pub struct FileDto {
    pub id: i64,
    pub folder_id: i64,
    pub name: String,
    pub path: String,
    pub mime_type: String,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&FolderNode> for FolderDto {
    fn from(folder: &FolderNode) -> Self {
        Self {
            id: folder.id(),
            parent_id: folder.parent_id(),
            name: folder.name().to_string(),
            path: folder.path().to_string(),
            is_hidden: folder.is_hidden(),
            folders: folder.folders().iter().map(FolderDto::from).collect(),
            files: folder.files().iter().map(FileDto::from).collect(),
            created_at: folder.created_at(),
            updated_at: folder.updated_at(),
        }
    }
}

impl From<&FileNode> for FileDto {
    fn from(file: &FileNode) -> Self {
        Self {
            id: file.id(),
            folder_id: file.folder_id(),
            name: file.name().to_string(),
            path: file.path().to_string(),
            mime_type: file.mime_type().to_string(),
            is_hidden: file.is_hidden(),
            created_at: file.created_at(),
            updated_at: file.updated_at(),
        }
    }
}
