//! File entity and repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::folder::FolderNode;
use super::value::{MimeType, Name, NodePath};
use super::visibility::Visibility;
use crate::{ArborError, Result};

const FILE_COLUMNS: &str =
    "id, folder_id, name, path, mime_type, is_hidden, created_at, updated_at";

/// A file in the directory tree.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileNode {
    id: i64,
    folder_id: i64,
    #[sqlx(try_from = "String")]
    name: Name,
    #[sqlx(try_from = "String")]
    path: NodePath,
    #[sqlx(try_from = "String")]
    mime_type: MimeType,
    is_hidden: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FileNode {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// ID of the owning folder.
    pub fn folder_id(&self) -> i64 {
        self.folder_id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn mime_type(&self) -> &MimeType {
        &self.mime_type
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Rename the file in place. The path keeps its parent folder.
    pub fn rename(&mut self, name: Name) -> Result<()> {
        self.path = self.path.with_name(&name)?;
        self.name = name;
        Ok(())
    }

    /// Reparent the file under `parent`.
    pub fn move_to(&mut self, parent: &FolderNode) -> Result<()> {
        self.path = parent.path().child_file(&self.name)?;
        self.folder_id = parent.id();
        Ok(())
    }

    /// Build an unsaved copy of this file placed under `parent`.
    pub fn copy_to(&self, parent: &FolderNode) -> Result<NewFile> {
        Ok(NewFile {
            name: self.name.clone(),
            path: parent.path().child_file(&self.name)?,
            mime_type: self.mime_type.clone(),
            is_hidden: self.is_hidden,
        })
    }

    pub fn set_hidden(&mut self, is_hidden: bool) {
        self.is_hidden = is_hidden;
    }

    /// Move the path from under the `old` folder prefix to under `new`.
    pub(super) fn rebase(&mut self, old: &NodePath, new: &NodePath) -> Result<()> {
        self.path = self.path.rebase(old, new)?;
        Ok(())
    }

    /// Unsaved copy with the path moved from under `old` to under `new`.
    pub(super) fn copy_rebased(&self, old: &NodePath, new: &NodePath) -> Result<NewFile> {
        Ok(NewFile {
            name: self.name.clone(),
            path: self.path.rebase(old, new)?,
            mime_type: self.mime_type.clone(),
            is_hidden: self.is_hidden,
        })
    }
}

/// Data for creating a new file.
///
/// Carries no id: saving it always creates a new row.
#[derive(Debug, Clone)]
pub struct NewFile {
    name: Name,
    path: NodePath,
    mime_type: MimeType,
    is_hidden: bool,
}

impl NewFile {
    /// Describe a new file under `parent`.
    pub fn new(parent: &FolderNode, name: Name, mime_type: MimeType) -> Result<Self> {
        Ok(Self {
            path: parent.path().child_file(&name)?,
            name,
            mime_type,
            is_hidden: false,
        })
    }

    /// Set the hidden flag.
    pub fn with_hidden(mut self, is_hidden: bool) -> Self {
        self.is_hidden = is_hidden;
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn mime_type(&self) -> &MimeType {
        &self.mime_type
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

}

/// Repository for file rows.
///
/// Every operation runs on the caller's connection, usually an open
/// transaction.
pub struct FileRepository;

impl FileRepository {
    /// Insert a new file row and return its ID.
    pub async fn insert(conn: &mut SqliteConnection, folder_id: i64, file: &NewFile) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO files (folder_id, name, path, mime_type, is_hidden, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(folder_id)
        .bind(file.name.as_str())
        .bind(file.path.as_str())
        .bind(file.mime_type.as_str())
        .bind(file.is_hidden)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Create a new file.
    pub async fn create(
        conn: &mut SqliteConnection,
        folder_id: i64,
        file: &NewFile,
    ) -> Result<FileNode> {
        let id = Self::insert(conn, folder_id, file).await?;
        Self::find_by_id(conn, id, Visibility::All)
            .await?
            .ok_or_else(|| ArborError::NotFound(format!("file {id}")))
    }

    /// Save the name, path, owner and hidden flag of a file.
    pub async fn update(conn: &mut SqliteConnection, file: &mut FileNode) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE files SET folder_id = ?, name = ?, path = ?, is_hidden = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(file.folder_id)
        .bind(file.name.as_str())
        .bind(file.path.as_str())
        .bind(file.is_hidden)
        .bind(now)
        .bind(file.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ArborError::NotFound(format!("file {}", file.id)));
        }
        file.updated_at = now;
        Ok(())
    }

    /// Batch-save rewritten paths.
    pub async fn update_paths(
        conn: &mut SqliteConnection,
        paths: &[(i64, NodePath)],
    ) -> Result<()> {
        let now = Utc::now();
        for (id, path) in paths {
            sqlx::query("UPDATE files SET path = ?, updated_at = ? WHERE id = ?")
                .bind(path.as_str())
                .bind(now)
                .bind(*id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Delete a file row.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a file by ID.
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: i64,
        visibility: Visibility,
    ) -> Result<Option<FileNode>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?{}",
            visibility.sql_filter()
        );
        let file = sqlx::query_as::<_, FileNode>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(file)
    }

    /// Get a file by its exact path.
    pub async fn find_by_path(
        conn: &mut SqliteConnection,
        path: &NodePath,
        visibility: Visibility,
    ) -> Result<Option<FileNode>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE path = ?{}",
            visibility.sql_filter()
        );
        let file = sqlx::query_as::<_, FileNode>(&sql)
            .bind(path.as_str())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(file)
    }

    /// List every file anywhere below the folder `prefix`, ordered by path.
    pub async fn find_under(
        conn: &mut SqliteConnection,
        prefix: &NodePath,
        visibility: Visibility,
    ) -> Result<Vec<FileNode>> {
        prefix.require_folder()?;
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE substr(path, 1, length(?)) = ?{}
             ORDER BY path",
            visibility.sql_filter()
        );
        let files = sqlx::query_as::<_, FileNode>(&sql)
            .bind(prefix.as_str())
            .bind(prefix.as_str())
            .fetch_all(&mut *conn)
            .await?;

        Ok(files)
    }
}
