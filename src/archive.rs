//! ZIP export of body-store subtrees.
//!
//! Entries are written depth-first while the tree is walked, so only one
//! file body is held in memory at a time.

use std::io::{Cursor, Seek, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::storage::BodyStore;
use crate::tree::NodePath;
use crate::Result;

/// Archive segment used for the root folder, whose own name is empty.
pub const ROOT_SEGMENT: &str = "root";

/// Write the directory at `root` and everything below it as a ZIP archive.
///
/// Entry names are relative to the parent of `root`, so the root's own
/// segment is the top-level entry. Paths rejected by `include` are skipped
/// along with everything below them.
pub fn write_zip<W, F>(store: &dyn BodyStore, root: &NodePath, writer: W, include: F) -> Result<W>
where
    W: Write + Seek,
    F: Fn(&NodePath) -> bool,
{
    root.require_folder()?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut entries = 0usize;

    let mut pending = vec![root.clone()];
    while let Some(folder) = pending.pop() {
        zip.add_directory(entry_name(root, &folder), options)?;
        entries += 1;

        let children = store.list_directory(&folder)?;
        // Reversed so that popping visits children in name order
        for child in children.into_iter().rev() {
            if !include(&child) {
                continue;
            }
            if child.is_folder() {
                pending.push(child);
            } else {
                let content = store.read_file(&child)?;
                zip.start_file(entry_name(root, &child), options)?;
                zip.write_all(&content)?;
                entries += 1;
            }
        }
    }

    let writer = zip.finish()?;
    debug!("Archived {} entries from {}", entries, root);
    Ok(writer)
}

/// Compress the directory at `root` into an in-memory ZIP archive.
pub fn compress<F>(store: &dyn BodyStore, root: &NodePath, include: F) -> Result<Vec<u8>>
where
    F: Fn(&NodePath) -> bool,
{
    let cursor = write_zip(store, root, Cursor::new(Vec::new()), include)?;
    Ok(cursor.into_inner())
}

/// Name of the archive entry for `path`, which lies at or below `root`.
fn entry_name(root: &NodePath, path: &NodePath) -> String {
    let segment = if root.is_root() {
        ROOT_SEGMENT
    } else {
        root.last_segment()
    };
    let relative = path.as_str().strip_prefix(root.as_str()).unwrap_or_default();
    format!("{segment}/{relative}")
}
