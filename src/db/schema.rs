//! Database schema and migrations for Arbor.
//!
//! Migrations are applied in order when the database is first opened or
//! upgraded. The schema_version table tracks which ones have been applied.

/// Database migrations.
///
/// Timestamps are stored as RFC 3339 text in UTC.
pub const MIGRATIONS: &[&str] = &[
    // v1: Folders table, seeded with the root folder
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,  -- NULL only for the root
    name        TEXT NOT NULL,
    path        TEXT NOT NULL UNIQUE,    -- materialized path, always ends with '/'
    is_hidden   BOOLEAN NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX idx_folders_parent_id ON folders(parent_id);

INSERT INTO folders (parent_id, name, path) VALUES (NULL, 'root', '/');
"#,
    // v2: Files table
    r#"
CREATE TABLE files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id   INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL UNIQUE,    -- parent folder path + name
    mime_type   TEXT NOT NULL,
    is_hidden   BOOLEAN NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX idx_files_folder_id ON files(folder_id);
"#,
];
