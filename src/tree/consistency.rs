//! Path consistency checks against the metadata store.
//!
//! Subtree membership is decided by plain string prefix on folder paths.
//! That is only sound because folder paths end with `/`, so every prefix
//! key handled here must be a folder path.

use sqlx::SqliteConnection;
use tracing::debug;

use super::file::FileRepository;
use super::folder::FolderRepository;
use super::value::NodePath;
use super::visibility::Visibility;
use crate::{ArborError, Result};

/// Duplicate detection and descendant path rewriting.
pub struct PathService;

impl PathService {
    /// Whether any node, hidden or not, occupies `path`.
    ///
    /// A folder `/a/` and a file `/a` share one body-store entry, so each
    /// blocks the other.
    pub async fn exists(conn: &mut SqliteConnection, path: &NodePath) -> Result<bool> {
        let (folder_path, file_path) = if path.is_folder() {
            let file = path.as_str().trim_end_matches('/');
            (Some(path.clone()), NodePath::file(file).ok())
        } else {
            (NodePath::folder(format!("{path}/")).ok(), Some(path.clone()))
        };

        if let Some(folder_path) = folder_path {
            if FolderRepository::find_by_path(conn, &folder_path, Visibility::All)
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }
        if let Some(file_path) = file_path {
            if FileRepository::find_by_path(conn, &file_path, Visibility::All)
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fail with [`ArborError::Conflict`] if `path` is occupied.
    pub async fn ensure_vacant(conn: &mut SqliteConnection, path: &NodePath) -> Result<()> {
        if Self::exists(conn, path).await? {
            return Err(ArborError::Conflict(format!("{path} already exists")));
        }
        Ok(())
    }

    /// Rewrite the path of every node below `old` except the folder `id`
    /// itself, replacing the `old` prefix with `new`. Hidden nodes are
    /// rewritten too.
    ///
    /// Returns the number of rewritten rows.
    pub async fn rewrite_descendants(
        conn: &mut SqliteConnection,
        id: i64,
        old: &NodePath,
        new: &NodePath,
    ) -> Result<usize> {
        old.require_folder()?;
        new.require_folder()?;
        if old == new {
            return Ok(0);
        }

        // Compute every new path before writing any of them
        let folders = FolderRepository::find_descendants_excluding(conn, id, old)
            .await?
            .iter()
            .map(|folder| -> Result<(i64, NodePath)> {
                Ok((folder.id(), folder.path().rebase(old, new)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let files = FileRepository::find_under(conn, old, Visibility::All)
            .await?
            .iter()
            .map(|file| -> Result<(i64, NodePath)> {
                Ok((file.id(), file.path().rebase(old, new)?))
            })
            .collect::<Result<Vec<_>>>()?;

        FolderRepository::update_paths(conn, &folders).await?;
        FileRepository::update_paths(conn, &files).await?;

        debug!(
            "Rewrote {} folder and {} file paths from {} to {}",
            folders.len(),
            files.len(),
            old,
            new
        );
        Ok(folders.len() + files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FolderNode, MimeType, Name, NewFile, NewFolder};
    use crate::Database;

    async fn folder(conn: &mut SqliteConnection, parent: &FolderNode, name: &str) -> FolderNode {
        let new = NewFolder::new(parent, Name::new(name).unwrap()).unwrap();
        FolderRepository::create(conn, parent.id(), &new).await.unwrap()
    }

    async fn file(conn: &mut SqliteConnection, parent: &FolderNode, name: &str, is_hidden: bool) {
        let mime = MimeType::new("text/plain").unwrap();
        let new = NewFile::new(parent, Name::new(name).unwrap(), mime)
            .unwrap()
            .with_hidden(is_hidden);
        FileRepository::create(conn, parent.id(), &new).await.unwrap();
    }

    #[tokio::test]
    async fn test_exists_by_exact_path() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();
        let docs = folder(&mut conn, &root, "docs").await;
        file(&mut conn, &docs, "a.txt", true).await;

        let path = |value: &str| NodePath::parse(value).unwrap();
        assert!(PathService::exists(&mut conn, &path("/docs/")).await.unwrap());
        assert!(PathService::exists(&mut conn, &path("/docs/a.txt")).await.unwrap());
        assert!(!PathService::exists(&mut conn, &path("/do/")).await.unwrap());
        assert!(!PathService::exists(&mut conn, &path("/docs/a.tx")).await.unwrap());
    }

    #[tokio::test]
    async fn test_folder_and_file_forms_collide() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();
        folder(&mut conn, &root, "a").await;
        file(&mut conn, &root, "b", false).await;

        let a_file = NodePath::file("/a").unwrap();
        let b_folder = NodePath::folder("/b/").unwrap();
        assert!(matches!(
            PathService::ensure_vacant(&mut conn, &a_file).await,
            Err(ArborError::Conflict(_))
        ));
        assert!(matches!(
            PathService::ensure_vacant(&mut conn, &b_folder).await,
            Err(ArborError::Conflict(_))
        ));
        assert!(PathService::ensure_vacant(&mut conn, &NodePath::folder("/c/").unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rewrite_descendants() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let root = FolderRepository::find_root(&mut conn).await.unwrap();

        let foo = folder(&mut conn, &root, "foo").await;
        let sub = folder(&mut conn, &foo, "sub").await;
        file(&mut conn, &sub, "a.txt", true).await;
        let foobar = folder(&mut conn, &root, "foobar").await;
        file(&mut conn, &foobar, "b.txt", false).await;

        let new = NodePath::folder("/bar/").unwrap();
        let rewritten = PathService::rewrite_descendants(&mut conn, foo.id(), foo.path(), &new)
            .await
            .unwrap();
        assert_eq!(rewritten, 2);

        let sub = FolderRepository::find_by_id(&mut conn, sub.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.path().as_str(), "/bar/sub/");
        assert!(FileRepository::find_by_path(
            &mut conn,
            &NodePath::file("/bar/sub/a.txt").unwrap(),
            Visibility::All
        )
        .await
        .unwrap()
        .is_some());

        // The node itself and lookalike siblings are untouched
        let foo = FolderRepository::find_by_id(&mut conn, foo.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(foo.path().as_str(), "/foo/");
        let foobar = FolderRepository::find_by_id_with_descendants(&mut conn, foobar.id(), Visibility::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(foobar.path().as_str(), "/foobar/");
        assert_eq!(foobar.files()[0].path().as_str(), "/foobar/b.txt");
    }

    #[tokio::test]
    async fn test_rewrite_requires_folder_prefixes() {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let old = NodePath::file("/foo").unwrap();
        let new = NodePath::folder("/bar/").unwrap();
        assert!(matches!(
            PathService::rewrite_descendants(&mut conn, 1, &old, &new).await,
            Err(ArborError::Validation(_))
        ));
    }
}
