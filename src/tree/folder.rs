//! Folder entity and repository.
//!
//! A folder owns the children it was loaded with. Nothing points back up
//! the tree; operations that need an ancestor receive it as a parameter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::file::{FileNode, FileRepository, NewFile};
use super::value::{Name, NodePath};
use super::visibility::Visibility;
use crate::{ArborError, Result};

const FOLDER_COLUMNS: &str = "id, parent_id, name, path, is_hidden, created_at, updated_at";

/// A folder in the directory tree.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FolderNode {
    id: i64,
    /// None only for the root.
    parent_id: Option<i64>,
    #[sqlx(try_from = "String")]
    name: Name,
    #[sqlx(try_from = "String")]
    path: NodePath,
    is_hidden: bool,
    /// Child folders, present only when loaded with descendants.
    #[sqlx(skip)]
    folders: Vec<FolderNode>,
    /// Child files, present only when loaded with descendants.
    #[sqlx(skip)]
    files: Vec<FileNode>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FolderNode {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn folders(&self) -> &[FolderNode] {
        &self.folders
    }

    pub fn files(&self) -> &[FileNode] {
        &self.files
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Check if this is the root folder.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Rename the folder, rewriting the paths of all loaded descendants.
    pub fn rename(&mut self, name: Name) -> Result<()> {
        self.ensure_mutable()?;
        let new_path = self.path.with_name(&name)?;
        self.relocate(new_path)?;
        self.name = name;
        Ok(())
    }

    /// Reparent the folder under `parent`, rewriting the paths of all loaded
    /// descendants.
    pub fn move_to(&mut self, parent: &FolderNode) -> Result<()> {
        self.ensure_mutable()?;
        if self.path.contains(&parent.path) {
            return Err(ArborError::Cyclic(format!(
                "{} cannot be moved into {}",
                self.path, parent.path
            )));
        }
        let new_path = parent.path.child_folder(&self.name)?;
        self.relocate(new_path)?;
        self.parent_id = Some(parent.id);
        Ok(())
    }

    /// Build an unsaved clone of this subtree placed under `parent`.
    ///
    /// Every path of the clone is recomputed relative to its new root.
    pub fn copy_to(&self, parent: &FolderNode) -> Result<NewFolder> {
        let new_root = parent.path.child_folder(&self.name)?;
        self.clone_rebased(&self.path, &new_root)
    }

    pub fn set_hidden(&mut self, is_hidden: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.is_hidden = is_hidden;
        Ok(())
    }

    /// Paths of this folder and every loaded descendant.
    pub fn paths(&self) -> Vec<NodePath> {
        let mut paths = vec![self.path.clone()];
        for folder in &self.folders {
            paths.extend(folder.paths());
        }
        paths.extend(self.files.iter().map(|file| file.path().clone()));
        paths
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.is_root() {
            return Err(ArborError::Forbidden("root is not mutable".to_string()));
        }
        Ok(())
    }

    fn relocate(&mut self, new_path: NodePath) -> Result<()> {
        let old_path = std::mem::replace(&mut self.path, new_path);
        for folder in &mut self.folders {
            let child_path = folder.path.rebase(&old_path, &self.path)?;
            folder.relocate(child_path)?;
        }
        for file in &mut self.files {
            file.rebase(&old_path, &self.path)?;
        }
        Ok(())
    }

    fn clone_rebased(&self, old: &NodePath, new: &NodePath) -> Result<NewFolder> {
        Ok(NewFolder {
            name: self.name.clone(),
            path: self.path.rebase(old, new)?,
            is_hidden: self.is_hidden,
            folders: self
                .folders
                .iter()
                .map(|folder| folder.clone_rebased(old, new))
                .collect::<Result<_>>()?,
            files: self
                .files
                .iter()
                .map(|file| file.copy_rebased(old, new))
                .collect::<Result<_>>()?,
        })
    }
}

/// Data for creating a new folder, optionally with a whole subtree.
///
/// Carries no ids: saving it always creates new rows.
#[derive(Debug, Clone)]
pub struct NewFolder {
    name: Name,
    path: NodePath,
    is_hidden: bool,
    folders: Vec<NewFolder>,
    files: Vec<NewFile>,
}

impl NewFolder {
    /// Describe a new, empty folder under `parent`.
    pub fn new(parent: &FolderNode, name: Name) -> Result<Self> {
        Ok(Self {
            path: parent.path.child_folder(&name)?,
            name,
            is_hidden: false,
            folders: Vec::new(),
            files: Vec::new(),
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

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn folders(&self) -> &[NewFolder] {
        &self.folders
    }

    pub fn files(&self) -> &[NewFile] {
        &self.files
    }
}

/// Repository for folder rows.
///
/// Every operation runs on the caller's connection, usually an open
/// transaction.
pub struct FolderRepository;

impl FolderRepository {
    async fn insert(conn: &mut SqliteConnection, parent_id: i64, folder: &NewFolder) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO folders (parent_id, name, path, is_hidden, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(parent_id)
        .bind(folder.name.as_str())
        .bind(folder.path.as_str())
        .bind(folder.is_hidden)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Create a new folder (without any children it may describe).
    pub async fn create(
        conn: &mut SqliteConnection,
        parent_id: i64,
        folder: &NewFolder,
    ) -> Result<FolderNode> {
        let id = Self::insert(conn, parent_id, folder).await?;
        Self::find_by_id(conn, id, Visibility::All)
            .await?
            .ok_or_else(|| ArborError::NotFound(format!("folder {id}")))
    }

    /// Insert a folder together with its whole described subtree, and
    /// return the new top folder's ID.
    pub async fn insert_tree(
        conn: &mut SqliteConnection,
        parent_id: i64,
        folder: &NewFolder,
    ) -> Result<i64> {
        let top_id = Self::insert(conn, parent_id, folder).await?;
        let mut pending = vec![(top_id, folder)];

        while let Some((id, folder)) = pending.pop() {
            for file in &folder.files {
                FileRepository::insert(conn, id, file).await?;
            }
            for child in &folder.folders {
                let child_id = Self::insert(conn, id, child).await?;
                pending.push((child_id, child));
            }
        }

        debug!("Inserted folder tree at {}", folder.path);
        Ok(top_id)
    }

    /// Save the name, path, parent and hidden flag of a folder.
    ///
    /// Descendant rows are not touched.
    pub async fn update(conn: &mut SqliteConnection, folder: &mut FolderNode) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE folders SET parent_id = ?, name = ?, path = ?, is_hidden = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(folder.parent_id)
        .bind(folder.name.as_str())
        .bind(folder.path.as_str())
        .bind(folder.is_hidden)
        .bind(now)
        .bind(folder.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ArborError::NotFound(format!("folder {}", folder.id)));
        }
        folder.updated_at = now;
        Ok(())
    }

    /// Batch-save rewritten paths.
    pub async fn update_paths(
        conn: &mut SqliteConnection,
        paths: &[(i64, NodePath)],
    ) -> Result<()> {
        let now = Utc::now();
        for (id, path) in paths {
            sqlx::query("UPDATE folders SET path = ?, updated_at = ? WHERE id = ?")
                .bind(path.as_str())
                .bind(now)
                .bind(*id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Delete the folder at `prefix` and every folder and file below it,
    /// hidden or not.
    pub async fn delete_subtree(conn: &mut SqliteConnection, prefix: &NodePath) -> Result<()> {
        prefix.require_folder()?;
        if prefix.is_root() {
            return Err(ArborError::Forbidden("root is not mutable".to_string()));
        }

        sqlx::query("DELETE FROM files WHERE substr(path, 1, length(?)) = ?")
            .bind(prefix.as_str())
            .bind(prefix.as_str())
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM folders WHERE substr(path, 1, length(?)) = ?")
            .bind(prefix.as_str())
            .bind(prefix.as_str())
            .execute(&mut *conn)
            .await?;

        debug!("Deleted folder subtree at {}", prefix);
        Ok(())
    }

    /// Get the root folder.
    pub async fn find_root(conn: &mut SqliteConnection) -> Result<FolderNode> {
        Self::find_by_path(conn, &NodePath::root(), Visibility::All)
            .await?
            .ok_or_else(|| ArborError::NotFound("root folder".to_string()))
    }

    /// Get a folder by ID, without children.
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: i64,
        visibility: Visibility,
    ) -> Result<Option<FolderNode>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?{}",
            visibility.sql_filter()
        );
        let folder = sqlx::query_as::<_, FolderNode>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(folder)
    }

    /// Get a folder by its exact path, without children.
    pub async fn find_by_path(
        conn: &mut SqliteConnection,
        path: &NodePath,
        visibility: Visibility,
    ) -> Result<Option<FolderNode>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE path = ?{}",
            visibility.sql_filter()
        );
        let folder = sqlx::query_as::<_, FolderNode>(&sql)
            .bind(path.as_str())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(folder)
    }

    /// Get a folder by ID with its whole descendant tree.
    pub async fn find_by_id_with_descendants(
        conn: &mut SqliteConnection,
        id: i64,
        visibility: Visibility,
    ) -> Result<Option<FolderNode>> {
        match Self::find_by_id(conn, id, visibility).await? {
            Some(folder) => Ok(Some(Self::load_descendants(conn, folder, visibility).await?)),
            None => Ok(None),
        }
    }

    /// Get a folder by path with its whole descendant tree.
    pub async fn find_by_path_with_descendants(
        conn: &mut SqliteConnection,
        path: &NodePath,
        visibility: Visibility,
    ) -> Result<Option<FolderNode>> {
        match Self::find_by_path(conn, path, visibility).await? {
            Some(folder) => Ok(Some(Self::load_descendants(conn, folder, visibility).await?)),
            None => Ok(None),
        }
    }

    /// Every folder below `prefix` except the folder `id` itself, regardless
    /// of visibility.
    pub async fn find_descendants_excluding(
        conn: &mut SqliteConnection,
        id: i64,
        prefix: &NodePath,
    ) -> Result<Vec<FolderNode>> {
        Self::find_under(conn, id, prefix, Visibility::All).await
    }

    async fn find_under(
        conn: &mut SqliteConnection,
        id: i64,
        prefix: &NodePath,
        visibility: Visibility,
    ) -> Result<Vec<FolderNode>> {
        prefix.require_folder()?;
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE substr(path, 1, length(?)) = ? AND id != ?{}
             ORDER BY path",
            visibility.sql_filter()
        );
        let folders = sqlx::query_as::<_, FolderNode>(&sql)
            .bind(prefix.as_str())
            .bind(prefix.as_str())
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(folders)
    }

    /// Attach every descendant admitted by `visibility`.
    ///
    /// Nodes are linked through their parent IDs, so anything below a
    /// filtered-out folder is left out as well.
    async fn load_descendants(
        conn: &mut SqliteConnection,
        folder: FolderNode,
        visibility: Visibility,
    ) -> Result<FolderNode> {
        let mut folders: HashMap<i64, Vec<FolderNode>> = HashMap::new();
        for child in Self::find_under(conn, folder.id, &folder.path, visibility).await? {
            if let Some(parent_id) = child.parent_id {
                folders.entry(parent_id).or_default().push(child);
            }
        }

        let mut files: HashMap<i64, Vec<FileNode>> = HashMap::new();
        for file in FileRepository::find_under(conn, &folder.path, visibility).await? {
            files.entry(file.folder_id()).or_default().push(file);
        }

        Ok(assemble(folder, &mut folders, &mut files))
    }
}

fn assemble(
    mut folder: FolderNode,
    folders: &mut HashMap<i64, Vec<FolderNode>>,
    files: &mut HashMap<i64, Vec<FileNode>>,
) -> FolderNode {
    folder.files = files.remove(&folder.id).unwrap_or_default();
    folder.folders = folders
        .remove(&folder.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| assemble(child, folders, files))
        .collect();
    folder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MimeType;
    use crate::Database;

    fn name(value: &str) -> Name {
        Name::new(value).unwrap()
    }

    async fn create_folder(
        conn: &mut SqliteConnection,
        parent: &FolderNode,
        value: &str,
        is_hidden: bool,
    ) -> FolderNode {
        let folder = NewFolder::new(parent, name(value)).unwrap().with_hidden(is_hidden);
        FolderRepository::create(conn, parent.id(), &folder).await.unwrap()
    }

    async fn create_file(
        conn: &mut SqliteConnection,
        parent: &FolderNode,
        value: &str,
        is_hidden: bool,
    ) -> FileNode {
        let mime = MimeType::new("text/plain; charset=utf-8").unwrap();
        let file = NewFile::new(parent, name(value), mime).unwrap().with_hidden(is_hidden);
        FileRepository::create(conn, parent.id(), &file).await.unwrap()
    }

    #[tokio::test]
    async fn test_find_root() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let root = FolderRepository::find_root(&mut conn).await.unwrap();
        assert!(root.is_root());
        assert_eq!(root.name().as_str(), "root");
        assert_eq!(root.path().as_str(), "/");
    }

    #[tokio::test]
    async fn test_create_child_folder() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let docs = create_folder(&mut conn, &root, "docs", false).await;
        assert_eq!(docs.path().as_str(), "/docs/");
        assert_eq!(docs.parent_id(), Some(root.id()));
        assert!(!docs.is_root());

        let nested = create_folder(&mut conn, &docs, "2024", false).await;
        assert_eq!(nested.path().as_str(), "/docs/2024/");
    }

    #[tokio::test]
    async fn test_descendants_are_assembled() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let docs = create_folder(&mut conn, &root, "docs", false).await;
        let sub = create_folder(&mut conn, &docs, "sub", false).await;
        create_file(&mut conn, &docs, "a.txt", false).await;
        create_file(&mut conn, &sub, "b.txt", false).await;

        let tree = FolderRepository::find_by_id_with_descendants(&mut conn, docs.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tree.folders().len(), 1);
        assert_eq!(tree.files().len(), 1);
        assert_eq!(tree.files()[0].path().as_str(), "/docs/a.txt");
        assert_eq!(tree.folders()[0].files()[0].path().as_str(), "/docs/sub/b.txt");

        let by_path =
            FolderRepository::find_by_path_with_descendants(&mut conn, docs.path(), Visibility::All)
                .await
                .unwrap()
                .unwrap();
        assert_eq!(by_path.paths().len(), 4);
    }

    #[tokio::test]
    async fn test_hidden_subtree_is_pruned() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let secret = create_folder(&mut conn, &root, "secret", true).await;
        // Visible itself, but below a hidden folder
        let inner = create_folder(&mut conn, &secret, "inner", false).await;
        create_file(&mut conn, &inner, "a.txt", false).await;
        create_file(&mut conn, &root, "hidden.txt", true).await;
        create_file(&mut conn, &root, "public.txt", false).await;

        let visible =
            FolderRepository::find_by_id_with_descendants(&mut conn, root.id(), Visibility::VisibleOnly)
                .await
                .unwrap()
                .unwrap();
        assert!(visible.folders().is_empty());
        assert_eq!(visible.files().len(), 1);
        assert_eq!(visible.files()[0].name().as_str(), "public.txt");

        let all = FolderRepository::find_by_id_with_descendants(&mut conn, root.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(all.paths().len(), 6);

        assert!(FolderRepository::find_by_id(&mut conn, secret.id(), Visibility::VisibleOnly)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_tree() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let docs = create_folder(&mut conn, &root, "docs", false).await;
        let sub = create_folder(&mut conn, &docs, "sub", true).await;
        create_file(&mut conn, &sub, "b.txt", false).await;
        let target = create_folder(&mut conn, &root, "target", false).await;

        let source = FolderRepository::find_by_id_with_descendants(&mut conn, docs.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();
        let copy = source.copy_to(&target).unwrap();
        assert_eq!(copy.path().as_str(), "/target/docs/");
        assert_eq!(copy.folders()[0].path().as_str(), "/target/docs/sub/");
        assert!(copy.folders()[0].is_hidden());

        let id = FolderRepository::insert_tree(&mut conn, target.id(), &copy).await.unwrap();
        assert_ne!(id, docs.id());

        let copied = FolderRepository::find_by_id_with_descendants(&mut conn, id, Visibility::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(copied.parent_id(), Some(target.id()));
        assert_eq!(copied.folders()[0].files()[0].path().as_str(), "/target/docs/sub/b.txt");
        assert_ne!(copied.folders()[0].id(), sub.id());
    }

    #[tokio::test]
    async fn test_delete_subtree() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let foo = create_folder(&mut conn, &root, "foo", false).await;
        let sub = create_folder(&mut conn, &foo, "sub", true).await;
        create_file(&mut conn, &sub, "a.txt", false).await;
        let foobar = create_folder(&mut conn, &root, "foobar", false).await;

        FolderRepository::delete_subtree(&mut conn, foo.path()).await.unwrap();

        assert!(FolderRepository::find_by_id(&mut conn, sub.id(), Visibility::All)
            .await
            .unwrap()
            .is_none());
        assert!(FolderRepository::find_by_id(&mut conn, foobar.id(), Visibility::All)
            .await
            .unwrap()
            .is_some());
        assert!(matches!(
            FolderRepository::delete_subtree(&mut conn, root.path()).await,
            Err(ArborError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_find_descendants_excluding() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let foo = create_folder(&mut conn, &root, "foo", false).await;
        create_folder(&mut conn, &foo, "a", true).await;
        create_folder(&mut conn, &root, "foobar", false).await;

        let found = FolderRepository::find_descendants_excluding(&mut conn, foo.id(), foo.path())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path().as_str(), "/foo/a/");
    }

    #[tokio::test]
    async fn test_root_is_immutable() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let mut root = FolderRepository::find_root(&mut conn).await.unwrap();
        let docs = create_folder(&mut conn, &root, "docs", false).await;

        assert!(matches!(root.rename(name("x")), Err(ArborError::Forbidden(_))));
        assert!(matches!(root.set_hidden(true), Err(ArborError::Forbidden(_))));
        assert!(matches!(root.move_to(&docs), Err(ArborError::Forbidden(_))));
        assert_eq!(root.path().as_str(), "/");
        assert!(!root.is_hidden());
    }

    #[tokio::test]
    async fn test_rename_and_move_cascade_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let docs = create_folder(&mut conn, &root, "docs", false).await;
        let sub = create_folder(&mut conn, &docs, "sub", false).await;
        create_file(&mut conn, &sub, "a.txt", false).await;
        let other = create_folder(&mut conn, &root, "other", false).await;

        let mut tree = FolderRepository::find_by_id_with_descendants(&mut conn, docs.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();

        tree.rename(name("papers")).unwrap();
        assert_eq!(tree.path().as_str(), "/papers/");
        assert_eq!(tree.folders()[0].path().as_str(), "/papers/sub/");
        assert_eq!(tree.folders()[0].files()[0].path().as_str(), "/papers/sub/a.txt");

        tree.move_to(&other).unwrap();
        assert_eq!(tree.path().as_str(), "/other/papers/");
        assert_eq!(tree.parent_id(), Some(other.id()));
        assert_eq!(tree.folders()[0].files()[0].path().as_str(), "/other/papers/sub/a.txt");
    }

    #[tokio::test]
    async fn test_move_into_own_subtree_is_cyclic() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let mut docs = create_folder(&mut conn, &root, "docs", false).await;
        let sub = create_folder(&mut conn, &docs, "sub", false).await;

        assert!(matches!(docs.move_to(&sub), Err(ArborError::Cyclic(_))));
        let same = docs.clone();
        assert!(matches!(docs.move_to(&same), Err(ArborError::Cyclic(_))));
        assert_eq!(docs.path().as_str(), "/docs/");
    }
}
