//! Crash-safe replacement of the target file.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tempfile::TempDir;

/// A private scratch directory next to `target`, so the final rename stays
/// on one volume. Removed on drop.
pub(crate) fn workspace(target: &Path) -> io::Result<TempDir> {
    let parent = parent_dir(target);
    tempfile::Builder::new().prefix(".pog-").tempdir_in(parent)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Moves `staged` over `target`: the file is flushed, renamed, and the
/// directory entry flushed.
pub(crate) fn commit(staged: &Path, target: &Path) -> io::Result<()> {
    File::open(staged)?.sync_all()?;
    fs::rename(staged, target)?;
    sync_dir(parent_dir(target))?;
    tracing::info!(target = %target.display(), "committed");
    Ok(())
}

/// Copies `source` to `target` through a staged file in `workspace`.
pub(crate) fn copy_into_place(source: &Path, target: &Path) -> io::Result<()> {
    let scratch = workspace(target)?;
    let staged = scratch.path().join("copy");
    fs::copy(source, &staged)?;
    commit(&staged, target)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
