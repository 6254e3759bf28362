//! Folder usecases.

use std::collections::HashSet;
use std::io::{Seek, Write};

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::{debug, info};

use super::{folder_not_found, settle};
use crate::archive;
use crate::db::Database;
use crate::storage::BodyStore;
use crate::tree::{FolderNode, FolderRepository, Name, NewFolder, NodePath, PathService, Visibility};
use crate::{ArborError, Result};

/// Folder service coordinating the metadata and body stores.
pub struct FolderService<'a> {
    db: &'a Database,
    store: &'a dyn BodyStore,
}

impl<'a> FolderService<'a> {
    /// Create a new FolderService.
    pub fn new(db: &'a Database, store: &'a dyn BodyStore) -> Self {
        Self { db, store }
    }

    /// Get the root folder with its descendants.
    pub async fn root(&self, visibility: Visibility) -> Result<FolderNode> {
        let mut conn = self.db.pool().acquire().await?;
        FolderRepository::find_by_path_with_descendants(&mut conn, &NodePath::root(), visibility)
            .await?
            .ok_or_else(|| ArborError::NotFound("root folder".to_string()))
    }

    /// Get a folder by ID with its descendants.
    pub async fn find_by_id(&self, id: i64, visibility: Visibility) -> Result<FolderNode> {
        let mut conn = self.db.pool().acquire().await?;
        Self::load(&mut conn, id, visibility).await
    }

    /// Get a folder by path with its descendants.
    pub async fn find_by_path(&self, path: &str, visibility: Visibility) -> Result<FolderNode> {
        let path = NodePath::folder(path)?;
        let mut conn = self.db.pool().acquire().await?;
        FolderRepository::find_by_path_with_descendants(&mut conn, &path, visibility)
            .await?
            .ok_or_else(|| ArborError::NotFound(format!("folder {path}")))
    }

    /// Create a folder named `name` inside the folder `parent_id`.
    pub async fn create(
        &self,
        parent_id: i64,
        name: &str,
        is_hidden: bool,
        visibility: Visibility,
    ) -> Result<FolderNode> {
        let mut tx = self.db.begin().await?;

        let parent = FolderRepository::find_by_id(&mut tx, parent_id, visibility)
            .await?
            .ok_or_else(|| folder_not_found(parent_id))?;
        let new_folder = NewFolder::new(&parent, Name::new(name)?)?.with_hidden(is_hidden);
        PathService::ensure_vacant(&mut tx, new_folder.path()).await?;

        let folder = FolderRepository::create(&mut tx, parent.id(), &new_folder).await?;
        self.store.create_directory(folder.path())?;

        let folder = settle(Ok(folder), tx, "create", new_folder.path()).await?;
        info!("Created folder {} (id {})", folder.path(), folder.id());
        Ok(folder)
    }

    /// Rename a folder and/or change its hidden flag.
    ///
    /// A rename cascades to the path of every descendant.
    pub async fn update(
        &self,
        id: i64,
        name: &str,
        is_hidden: bool,
        visibility: Visibility,
    ) -> Result<FolderNode> {
        let mut tx = self.db.begin().await?;

        let mut folder = Self::load(&mut tx, id, visibility).await?;
        folder.set_hidden(is_hidden)?;
        let name = Name::new(name)?;

        if &name == folder.name() {
            FolderRepository::update(&mut tx, &mut folder).await?;
            tx.commit().await?;
            info!("Updated folder {} (hidden: {})", folder.path(), is_hidden);
            return Ok(folder);
        }

        let old_path = folder.path().clone();
        folder.rename(name)?;
        self.relocate(tx, folder, old_path, "rename").await
    }

    /// Move a folder into the folder `parent_id`.
    ///
    /// Moving a folder into the folder it already lives in changes nothing.
    pub async fn move_to(
        &self,
        id: i64,
        parent_id: i64,
        visibility: Visibility,
    ) -> Result<FolderNode> {
        let mut tx = self.db.begin().await?;

        let mut folder = Self::load(&mut tx, id, visibility).await?;
        ensure_not_root(&folder)?;
        let parent = FolderRepository::find_by_id(&mut tx, parent_id, visibility)
            .await?
            .ok_or_else(|| folder_not_found(parent_id))?;

        if folder.parent_id() == Some(parent.id()) {
            debug!("Folder {} is already in {}", folder.path(), parent.path());
            return Ok(folder);
        }

        let old_path = folder.path().clone();
        folder.move_to(&parent)?;
        self.relocate(tx, folder, old_path, "move").await
    }

    /// Copy a folder and its whole subtree into the folder `parent_id`.
    ///
    /// Nodes outside `visibility` are not copied.
    pub async fn copy(&self, id: i64, parent_id: i64, visibility: Visibility) -> Result<FolderNode> {
        let mut tx = self.db.begin().await?;

        let source = Self::load(&mut tx, id, visibility).await?;
        let visible: HashSet<NodePath> = source.paths().into_iter().collect();
        let mut body = self.store.read_directory_tree(source.path())?;
        body.retain(&|path: &NodePath| visible.contains(path));

        let parent = FolderRepository::find_by_id(&mut tx, parent_id, visibility)
            .await?
            .ok_or_else(|| folder_not_found(parent_id))?;
        let copy = source.copy_to(&parent)?;
        PathService::ensure_vacant(&mut tx, copy.path()).await?;

        self.store.write_tree(&body.rebase(source.path(), copy.path())?)?;

        let outcome = async {
            let copy_id = FolderRepository::insert_tree(&mut tx, parent.id(), &copy).await?;
            Self::load(&mut tx, copy_id, visibility).await
        }
        .await;
        let copied = settle(outcome, tx, "copy", copy.path()).await?;

        info!("Copied folder {} to {}", source.path(), copied.path());
        Ok(copied)
    }

    /// Remove a folder with everything below it, hidden descendants
    /// included.
    pub async fn remove(&self, id: i64, visibility: Visibility) -> Result<FolderNode> {
        let mut tx = self.db.begin().await?;

        let folder = Self::load(&mut tx, id, visibility).await?;
        ensure_not_root(&folder)?;

        self.store.remove(folder.path())?;

        let outcome = FolderRepository::delete_subtree(&mut tx, folder.path()).await;
        settle(outcome, tx, "remove", folder.path()).await?;

        info!("Removed folder {} (id {})", folder.path(), folder.id());
        Ok(folder)
    }

    /// Export a folder as a ZIP archive.
    pub async fn archive(&self, id: i64, visibility: Visibility) -> Result<Vec<u8>> {
        let folder = self.find_by_id(id, visibility).await?;
        let visible: HashSet<NodePath> = folder.paths().into_iter().collect();
        archive::compress(self.store, folder.path(), |path| visible.contains(path))
    }

    /// Export a folder as a ZIP archive into `writer`.
    pub async fn archive_to<W: Write + Seek>(
        &self,
        id: i64,
        visibility: Visibility,
        writer: W,
    ) -> Result<W> {
        let folder = self.find_by_id(id, visibility).await?;
        let visible: HashSet<NodePath> = folder.paths().into_iter().collect();
        archive::write_zip(self.store, folder.path(), writer, |path| {
            visible.contains(path)
        })
    }

    /// Persist a folder whose path changed from `old_path`, rewriting every
    /// descendant and mirroring the change into the body store.
    async fn relocate(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        mut folder: FolderNode,
        old_path: NodePath,
        operation: &str,
    ) -> Result<FolderNode> {
        PathService::ensure_vacant(&mut tx, folder.path()).await?;
        PathService::rewrite_descendants(&mut tx, folder.id(), &old_path, folder.path()).await?;

        self.store.rename(&old_path, folder.path())?;

        let outcome = FolderRepository::update(&mut tx, &mut folder).await;
        settle(outcome, tx, operation, &old_path).await?;

        info!("Folder {} moved to {} ({})", old_path, folder.path(), operation);
        Ok(folder)
    }

    async fn load(
        conn: &mut SqliteConnection,
        id: i64,
        visibility: Visibility,
    ) -> Result<FolderNode> {
        FolderRepository::find_by_id_with_descendants(conn, id, visibility)
            .await?
            .ok_or_else(|| folder_not_found(id))
    }
}

fn ensure_not_root(folder: &FolderNode) -> Result<()> {
    if folder.is_root() {
        return Err(ArborError::Forbidden("root is not mutable".to_string()));
    }
    Ok(())
}
