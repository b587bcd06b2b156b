//! Exclusively-owned scratch directory for one release run.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directory prefix for work areas.
const WORK_AREA_PREFIX: &str = "release";

/// A uniquely-named local directory owned by a single release run.
///
/// The name embeds a fresh random id, so concurrent runs never share one.
/// The directory is removed by [`WorkArea::cleanup`] or, failing that, on drop.
#[derive(Debug)]
pub struct WorkArea {
    /// Root of the work area.
    path: PathBuf,
    /// Run identifier embedded in the directory name.
    run_id: String,
    /// Whether the directory has been removed.
    cleaned_up: bool,
}

impl WorkArea {
    /// Creates a new work area under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            Error::WorkAreaCreation(format!("cannot create {}: {}", root.display(), e))
        })?;

        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let path = root.join(format!("{}-{}", WORK_AREA_PREFIX, run_id));

        // create_dir (not create_dir_all) so an existing directory is an error.
        std::fs::create_dir(&path).map_err(|e| {
            Error::WorkAreaCreation(format!("cannot create {}: {}", path.display(), e))
        })?;

        tracing::info!(path = ?path, "created work area");

        Ok(Self {
            path,
            run_id,
            cleaned_up: false,
        })
    }

    /// Root directory of the work area.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the repository is checked out into.
    pub fn checkout_dir(&self) -> PathBuf {
        self.path.join("repo")
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Removes the work area. Calling this more than once is a no-op.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::WorkAreaCleanup {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        }

        tracing::info!(path = ?self.path, "removed work area");
        self.cleaned_up = true;
        Ok(())
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.cleanup() {
                tracing::error!(error = %e, path = ?self.path, "failed to clean up work area on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn work_areas_are_unique() {
        let root = TempDir::new().unwrap();
        let a = WorkArea::create(root.path()).unwrap();
        let b = WorkArea::create(root.path()).unwrap();

        assert_ne!(a.path(), b.path());
        assert_ne!(a.run_id(), b.run_id());
        assert!(a.path().is_dir());
        assert!(a.checkout_dir().starts_with(a.path()));
    }

    #[test]
    fn work_area_creates_missing_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        let area = WorkArea::create(&nested).unwrap();
        assert!(area.path().starts_with(&nested));
    }

    #[test]
    fn work_area_cleans_up() {
        let root = TempDir::new().unwrap();
        let mut area = WorkArea::create(root.path()).unwrap();
        std::fs::create_dir_all(area.checkout_dir()).unwrap();
        std::fs::write(area.checkout_dir().join("file.txt"), "x").unwrap();

        let path = area.path().to_path_buf();
        area.cleanup().expect("cleanup failed");
        assert!(!path.exists());
    }

    #[test]
    fn work_area_cleanup_is_idempotent() {
        let root = TempDir::new().unwrap();
        let mut area = WorkArea::create(root.path()).unwrap();

        area.cleanup().expect("first cleanup failed");
        area.cleanup().expect("second cleanup should be idempotent");
    }

    #[test]
    fn work_area_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let path = {
            let area = WorkArea::create(root.path()).unwrap();
            area.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn already_removed_directory_is_not_an_error() {
        let root = TempDir::new().unwrap();
        let mut area = WorkArea::create(root.path()).unwrap();
        std::fs::remove_dir_all(area.path()).unwrap();
        assert!(area.cleanup().is_ok());
    }
}
