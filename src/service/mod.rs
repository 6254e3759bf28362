//! Directory usecases for Arbor.
//!
//! Each operation runs its metadata reads and writes in one transaction and
//! mirrors the change into the body store at a fixed point in that
//! sequence:
//!
//! | operation     | order                                          |
//! |---------------|------------------------------------------------|
//! | create        | metadata insert, body create, commit           |
//! | rename / move | path rewrite, body rename, metadata save, commit |
//! | copy          | body write, metadata insert, commit            |
//! | remove        | body remove, metadata delete, commit           |
//!
//! The two stores share no transaction. A metadata failure after the body
//! store has been changed is reported as [`ArborError::Diverged`] and is not
//! compensated.

mod dto;
mod file;
mod folder;

pub use dto::{FileDto, FolderDto};
pub use file::{FileContent, FileService, Upload};
pub use folder::FolderService;

use sqlx::{Sqlite, Transaction};
use tracing::error;

use crate::tree::NodePath;
use crate::{ArborError, Result};

/// Finish the metadata side of an operation whose body-store side is
/// already done: commit on success, roll back and report divergence on
/// failure.
async fn settle<T>(
    outcome: Result<T>,
    tx: Transaction<'static, Sqlite>,
    operation: &str,
    path: &NodePath,
) -> Result<T> {
    let committed = match outcome {
        Ok(value) => tx.commit().await.map(|()| value).map_err(ArborError::from),
        Err(e) => Err(e),
    };
    committed.map_err(|e| diverged(e, operation, path))
}

fn diverged(e: ArborError, operation: &str, path: &NodePath) -> ArborError {
    error!(
        "Metadata and body stores diverged after {} at {}: {}",
        operation, path, e
    );
    ArborError::Diverged(format!("{operation} at {path}: {e}"))
}

fn folder_not_found(id: i64) -> ArborError {
    ArborError::NotFound(format!("folder {id}"))
}

fn file_not_found(id: i64) -> ArborError {
    ArborError::NotFound(format!("file {id}"))
}
