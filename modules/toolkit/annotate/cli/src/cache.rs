use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

/// Directory of intermediate files keyed by file name.
///
/// Entries appear atomically: they are built under a staging name and renamed once complete.
/// The directory is removed when the cache is dropped unless it is kept.
#[derive(Debug)]
pub struct Cache {
    root: PathBuf,
    keep: bool,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>, keep: bool) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            tracing::info!("Creating cache directory {}", root.display());
        }
        fs::create_dir_all(&root)
            .wrap_err_with(|| format!("Failed to create cache directory {}", root.display()))?;
        Ok(Self { root, keep })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of the cached `name`. If it is missing, `build` is called with a staging path to
    /// write it to.
    pub fn fetch_or_build(
        &self,
        name: &str,
        build: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<PathBuf> {
        let target = self.path(name);
        if target.is_file() {
            tracing::info!("Using cached {name}");
            return Ok(target);
        }

        let staging = self.path(&format!("{name}.partial"));
        if let Err(err) = build(&staging) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
        fs::rename(&staging, &target)
            .wrap_err_with(|| format!("Failed to move {} into the cache", staging.display()))?;
        Ok(target)
    }

    pub fn teardown(&mut self) -> Result<()> {
        if self.keep || !self.root.exists() {
            return Ok(());
        }
        tracing::info!("Clearing cache {}", self.root.display());
        fs::remove_dir_all(&self.root)
            .wrap_err_with(|| format!("Failed to remove cache {}", self.root.display()))
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            tracing::warn!("{err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fetch_or_build() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = Cache::new(dir.path().join("cache"), false)?;

        let builds = Cell::new(0);
        let build = |path: &Path| -> Result<()> {
            builds.set(builds.get() + 1);
            fs::write(path, "content")?;
            Ok(())
        };

        let first = cache.fetch_or_build("entry.txt", build)?;
        let second = cache.fetch_or_build("entry.txt", build)?;
        assert_eq!(first, second);
        assert_eq!(builds.get(), 1);
        assert_eq!(fs::read_to_string(first)?, "content");
        Ok(())
    }

    #[test]
    fn test_failed_build_leaves_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = Cache::new(dir.path().join("cache"), true)?;

        let result = cache.fetch_or_build("entry.txt", |path| {
            fs::write(path, "half")?;
            eyre::bail!("tool crashed")
        });
        assert!(result.is_err());
        assert!(!cache.path("entry.txt").exists());
        assert!(!cache.path("entry.txt.partial").exists());
        Ok(())
    }

    #[test]
    fn test_teardown() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let removed = dir.path().join("removed");
        let kept = dir.path().join("kept");

        for (path, keep) in [(&removed, false), (&kept, true)] {
            let cache = Cache::new(path.clone(), keep)?;
            fs::write(cache.path("x"), "x")?;
        }
        assert!(!removed.exists());
        assert!(kept.join("x").is_file());
        Ok(())
    }
}
