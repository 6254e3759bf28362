//! File usecases.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{diverged, file_not_found, folder_not_found, settle};
use crate::db::Database;
use crate::storage::BodyStore;
use crate::tree::{
    mime, FileNode, FileRepository, FolderNode, FolderRepository, Name, NewFile, NodePath,
    PathService, Visibility,
};
use crate::{ArborError, Result};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    /// File name.
    pub name: String,
    /// File content.
    pub content: Vec<u8>,
}

impl Upload {
    /// Create a new upload.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A file's metadata together with its content.
#[derive(Debug)]
pub struct FileContent {
    pub file: FileNode,
    pub content: Vec<u8>,
}

/// File service coordinating the metadata and body stores.
pub struct FileService<'a> {
    db: &'a Database,
    store: &'a dyn BodyStore,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, store: &'a dyn BodyStore) -> Self {
        Self { db, store }
    }

    /// Get a file by ID.
    pub async fn find_by_id(&self, id: i64, visibility: Visibility) -> Result<FileNode> {
        let mut conn = self.db.pool().acquire().await?;
        Self::load(&mut conn, id, visibility).await
    }

    /// Get a file by path.
    pub async fn find_by_path(&self, path: &str, visibility: Visibility) -> Result<FileNode> {
        let path = NodePath::file(path)?;
        let mut conn = self.db.pool().acquire().await?;
        FileRepository::find_by_path(&mut conn, &path, visibility)
            .await?
            .ok_or_else(|| ArborError::NotFound(format!("file {path}")))
    }

    /// Read a file's metadata and content.
    pub async fn read(&self, id: i64, visibility: Visibility) -> Result<FileContent> {
        let file = self.find_by_id(id, visibility).await?;
        let content = self.store.read_file(file.path())?;
        debug!("Read {} bytes from {}", content.len(), file.path());
        Ok(FileContent { file, content })
    }

    /// Create one file per upload inside the folder `folder_id`.
    ///
    /// MIME types are detected from the content. Either every upload is
    /// recorded or none is.
    pub async fn create(
        &self,
        folder_id: i64,
        is_hidden: bool,
        uploads: &[Upload],
        visibility: Visibility,
    ) -> Result<Vec<FileNode>> {
        let mut tx = self.db.begin().await?;

        let folder = FolderRepository::find_by_id(&mut tx, folder_id, visibility)
            .await?
            .ok_or_else(|| folder_not_found(folder_id))?;

        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = Name::new(upload.name.as_str())?;
            let mime_type = mime::detect(&name, &upload.content);
            let new_file = NewFile::new(&folder, name, mime_type)?.with_hidden(is_hidden);
            PathService::ensure_vacant(&mut tx, new_file.path()).await?;
            files.push(FileRepository::create(&mut tx, folder.id(), &new_file).await?);
        }

        for (written, (file, upload)) in files.iter().zip(uploads).enumerate() {
            if let Err(e) = self.store.create_file(file.path(), &upload.content) {
                // Bodies written before this one are now orphaned
                return Err(if written == 0 {
                    e
                } else {
                    diverged(e, "create", file.path())
                });
            }
        }

        let files = settle(Ok(files), tx, "create", folder.path()).await?;
        for file in &files {
            info!(
                "Created file {} (id {}, {})",
                file.path(),
                file.id(),
                file.mime_type()
            );
        }
        Ok(files)
    }

    /// Rename a file and/or change its hidden flag.
    pub async fn update(
        &self,
        id: i64,
        name: &str,
        is_hidden: bool,
        visibility: Visibility,
    ) -> Result<FileNode> {
        let mut tx = self.db.begin().await?;

        let mut file = Self::load(&mut tx, id, visibility).await?;
        file.set_hidden(is_hidden);
        let name = Name::new(name)?;

        if &name == file.name() {
            FileRepository::update(&mut tx, &mut file).await?;
            tx.commit().await?;
            info!("Updated file {} (hidden: {})", file.path(), is_hidden);
            return Ok(file);
        }

        let old_path = file.path().clone();
        file.rename(name)?;
        self.relocate(tx, file, old_path, "rename").await
    }

    /// Move a file into the folder `folder_id`.
    ///
    /// Moving a file into the folder it already lives in changes nothing.
    pub async fn move_to(&self, id: i64, folder_id: i64, visibility: Visibility) -> Result<FileNode> {
        let mut tx = self.db.begin().await?;

        let mut file = Self::load(&mut tx, id, visibility).await?;
        let folder = Self::load_folder(&mut tx, folder_id, visibility).await?;

        if file.folder_id() == folder.id() {
            debug!("File {} is already in {}", file.path(), folder.path());
            return Ok(file);
        }

        let old_path = file.path().clone();
        file.move_to(&folder)?;
        self.relocate(tx, file, old_path, "move").await
    }

    /// Copy a file into the folder `folder_id`.
    pub async fn copy(&self, id: i64, folder_id: i64, visibility: Visibility) -> Result<FileNode> {
        let mut tx = self.db.begin().await?;

        let source = Self::load(&mut tx, id, visibility).await?;
        let folder = Self::load_folder(&mut tx, folder_id, visibility).await?;
        let copy = source.copy_to(&folder)?;
        PathService::ensure_vacant(&mut tx, copy.path()).await?;

        self.store.copy_tree(source.path(), copy.path())?;

        let outcome = FileRepository::create(&mut tx, folder.id(), &copy).await;
        let copied = settle(outcome, tx, "copy", copy.path()).await?;

        info!("Copied file {} to {}", source.path(), copied.path());
        Ok(copied)
    }

    /// Remove a file.
    pub async fn remove(&self, id: i64, visibility: Visibility) -> Result<FileNode> {
        let mut tx = self.db.begin().await?;

        let file = Self::load(&mut tx, id, visibility).await?;

        self.store.remove(file.path())?;

        let outcome = FileRepository::delete(&mut tx, file.id()).await;
        settle(outcome, tx, "remove", file.path()).await?;

        info!("Removed file {} (id {})", file.path(), file.id());
        Ok(file)
    }

    async fn relocate(
        &self,
        mut tx: sqlx::Transaction<'static, sqlx::Sqlite>,
        mut file: FileNode,
        old_path: NodePath,
        operation: &str,
    ) -> Result<FileNode> {
        PathService::ensure_vacant(&mut tx, file.path()).await?;

        self.store.rename(&old_path, file.path())?;

        let outcome = FileRepository::update(&mut tx, &mut file).await;
        settle(outcome, tx, operation, &old_path).await?;

        info!("File {} moved to {} ({})", old_path, file.path(), operation);
        Ok(file)
    }

    async fn load(conn: &mut SqliteConnection, id: i64, visibility: Visibility) -> Result<FileNode> {
        FileRepository::find_by_id(conn, id, visibility)
            .await?
            .ok_or_else(|| file_not_found(id))
    }

    async fn load_folder(
        conn: &mut SqliteConnection,
        id: i64,
        visibility: Visibility,
    ) -> Result<FolderNode> {
        FolderRepository::find_by_id(conn, id, visibility)
            .await?
            .ok_or_else(|| folder_not_found(id))
    }
}
