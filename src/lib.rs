//! Arbor - hierarchical folder/file directory service
//!
//! Folders and files are addressed by materialized paths. Metadata lives in
//! SQLite and file content in a body store, and every usecase keeps the two
//! consistent across create, rename, move, copy and remove.

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;
pub mod storage;
pub mod tree;

pub use config::Config;
pub use db::Database;
pub use error::{ArborError, ErrorKind, Result};
pub use service::{FileContent, FileDto, FileService, FolderDto, FolderService, Upload};
pub use storage::{BodyStore, FsBodyStore};
pub use tree::{FileNode, FolderNode, MimeType, Name, NodePath, ValidationError, Visibility};
