//! Forced recursive removal of sandbox trees.

use std::io;
use std::path::Path;

/// Recursively removes `path`.
///
/// A path that does not exist counts as removed.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
