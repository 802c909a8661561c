// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::types::Timestamp;

pub mod mock;

/// Abstract filesystem interface used for modification-time queries.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Last modification time of a file or directory entry.
    fn modified(&self, path: &Path) -> Result<Timestamp>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Newest modification time of anything at or below `path`.
///
/// Returns `None` if `path` does not exist.
pub fn newest_mtime(fs: &dyn FileSystem, path: &Path) -> Result<Option<Timestamp>> {
    if !fs.exists(path) {
        return Ok(None);
    }

    let mut newest = fs.modified(path)?;
    if fs.is_dir(path) {
        for entry in fs.read_dir(path)? {
            if let Some(t) = newest_mtime(fs, &entry)? {
                newest = newest.max(t);
            }
        }
    }
    Ok(Some(newest))
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn modified(&self, path: &Path) -> Result<Timestamp> {
        let meta = fs::symlink_metadata(path).with_context(|| format!("reading metadata of {:?}", path))?;
        let mtime = meta
            .modified()
            .with_context(|| format!("reading modification time of {:?}", path))?;
        Ok(DateTime::<Utc>::from(mtime))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}
