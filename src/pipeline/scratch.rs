//! Per-archive scratch directory.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::extract::ExtractError;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Directory an archive is unpacked into while its descriptor is built.
///
/// # RAII Cleanup
///
/// `ScratchDir` implements [`Drop`] so the directory is removed on every exit
/// path of the pipeline, including errors and stage timeouts. Removal is best
/// effort: a failure is logged as a warning and never propagated. For the
/// same reason it does **not** implement `Clone`.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,

    /// Whether to delete the directory on drop (mirrors pipeline `auto_cleanup`).
    cleanup_on_drop: bool,
}

impl ScratchDir {
    /// Creates a fresh, uniquely named directory under `parent`.
    ///
    /// `label` (usually the archive file name) prefixes the directory name so
    /// leftovers are easy to attribute.
    pub fn create(parent: &Path, label: &str, cleanup_on_drop: bool) -> std::io::Result<Self> {
        loop {
            let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
            let path = parent.join(format!("{label}-{}-{seq}.scratch", std::process::id()));
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Scratch directory created");
                    return Ok(Self {
                        path,
                        cleanup_on_drop,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `relative` against the scratch root, rejecting any path that
    /// would escape it (absolute paths, `..`, drive prefixes).
    pub fn safe_child(&self, relative: &Path) -> Result<PathBuf, ExtractError> {
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(ExtractError::PathTraversal {
                entry: relative.display().to_string(),
            });
        }
        Ok(self.path.join(relative))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.cleanup_on_drop || !self.path.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Scratch directory removed"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove scratch directory"
            ),
        }
    }
}
