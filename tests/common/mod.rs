//! Test helpers for integration tests.
//!
//! Provides a fixture bundling an in-memory database with a temporary body
//! store, a body store double that fails selected operations, and a way to
//! make selected metadata writes fail.

#![allow(dead_code)]

use std::sync::Mutex;

use tempfile::TempDir;

use arbor::{
    ArborError, BodyStore, Database, FileService, FolderService, FsBodyStore, NodePath, Result,
};

/// In-memory database plus a body store rooted in a temporary directory.
pub struct Fixture<S: BodyStore = FsBodyStore> {
    pub db: Database,
    pub store: S,
    _temp_dir: TempDir,
}

impl Fixture {
    /// Create a fixture backed by a plain filesystem store.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBodyStore::new(temp_dir.path()).unwrap();
        Self::with_store(temp_dir, store).await
    }
}

impl Fixture<FlakyStore> {
    /// Create a fixture whose body store can be told to fail.
    pub async fn flaky() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = FlakyStore::new(FsBodyStore::new(temp_dir.path()).unwrap());
        Self::with_store(temp_dir, store).await
    }
}

impl<S: BodyStore> Fixture<S> {
    async fn with_store(temp_dir: TempDir, store: S) -> Self {
        let db = Database::open_in_memory().await.unwrap();
        Self {
            db,
            store,
            _temp_dir: temp_dir,
        }
    }

    pub fn folders(&self) -> FolderService<'_> {
        FolderService::new(&self.db, &self.store)
    }

    pub fn files(&self) -> FileService<'_> {
        FileService::new(&self.db, &self.store)
    }

    /// Abort every `event` (`INSERT`, `UPDATE` or `DELETE`) on `table` whose
    /// row matches `condition`, written in terms of `NEW` or `OLD`.
    pub async fn fail_metadata(&self, table: &str, event: &str, condition: &str) {
        let sql = format!(
            "CREATE TRIGGER fail_{table}_{event} BEFORE {event} ON {table}
             WHEN {condition}
             BEGIN SELECT RAISE(ABORT, 'injected metadata failure'); END"
        );
        sqlx::query(&sql).execute(self.db.pool()).await.unwrap();
    }
}

/// Body store operations that [`FlakyStore`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateDirectory,
    CreateFile,
    Rename,
    Remove,
}

/// Filesystem store that fails an operation on a chosen path.
pub struct FlakyStore {
    inner: FsBodyStore,
    failure: Mutex<Option<(Op, String)>>,
}

impl FlakyStore {
    pub fn new(inner: FsBodyStore) -> Self {
        Self {
            inner,
            failure: Mutex::new(None),
        }
    }

    /// Fail `op` whenever it targets `path`.
    pub fn fail(&self, op: Op, path: &str) {
        *self.failure.lock().unwrap() = Some((op, path.to_string()));
    }

    pub fn inner(&self) -> &FsBodyStore {
        &self.inner
    }

    fn check(&self, op: Op, path: &NodePath) -> Result<()> {
        match &*self.failure.lock().unwrap() {
            Some((failing, target)) if *failing == op && target == path.as_str() => Err(
                ArborError::Io(std::io::Error::other(format!("injected {op:?} failure"))),
            ),
            _ => Ok(()),
        }
    }
}

impl BodyStore for FlakyStore {
    fn create_directory(&self, path: &NodePath) -> Result<()> {
        self.check(Op::CreateDirectory, path)?;
        self.inner.create_directory(path)
    }

    fn create_file(&self, path: &NodePath, content: &[u8]) -> Result<()> {
        self.check(Op::CreateFile, path)?;
        self.inner.create_file(path, content)
    }

    fn rename(&self, old: &NodePath, new: &NodePath) -> Result<()> {
        self.check(Op::Rename, old)?;
        self.inner.rename(old, new)
    }

    fn remove(&self, path: &NodePath) -> Result<bool> {
        self.check(Op::Remove, path)?;
        self.inner.remove(path)
    }

    fn read_file(&self, path: &NodePath) -> Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn list_directory(&self, path: &NodePath) -> Result<Vec<NodePath>> {
        self.inner.list_directory(path)
    }
}
