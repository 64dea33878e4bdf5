// src/trash.rs

//! Trash entries for rollback of destructive directory steps
//!
//! A directory is staged by renaming it to a sibling with a reserved
//! suffix. The entry is later either restored (undo) or discarded
//! (commit). Only one in-flight operation per directory is assumed, so a
//! stale entry left by an earlier crash is overwritten on stage.

use crate::error::{Error, Result};
use crate::fsops::DataFs;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix appended to a directory name to form its trash location
pub const TRASH_SUFFIX: &str = ".old";

/// Trash location for `path`, alongside it
pub fn trash_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TRASH_SUFFIX);
    PathBuf::from(name)
}

/// Trash entries sitting directly inside `dir`, sorted by location
///
/// A missing `dir` has no entries. Other listing errors are logged.
pub fn trash_entries(dir: &Path) -> Vec<TrashEntry> {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut entries: Vec<TrashEntry> = listing
        .filter_map(|item| item.ok())
        .filter_map(|item| {
            let name = item.file_name();
            let stem = name.to_str()?.strip_suffix(TRASH_SUFFIX)?;
            if stem.is_empty() {
                return None;
            }
            Some(TrashEntry {
                original: dir.join(stem),
                location: item.path(),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.location.cmp(&b.location));
    entries
}

/// A directory tree moved aside by `Trash::stage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashEntry {
    original: PathBuf,
    location: PathBuf,
}

impl TrashEntry {
    /// Entry for a directory that may have been staged earlier
    pub fn for_path(original: impl Into<PathBuf>) -> Self {
        let original = original.into();
        let location = trash_path(&original);
        Self { original, location }
    }

    /// Where the data lived before it was staged
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Where the staged data lives now
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn exists(&self) -> bool {
        self.location.exists()
    }
}

/// Stages, restores and discards trash entries through a `DataFs`
pub struct Trash<'a> {
    fs: &'a dyn DataFs,
}

impl<'a> Trash<'a> {
    pub fn new(fs: &'a dyn DataFs) -> Self {
        Self { fs }
    }

    /// Move `path` aside, replacing any stale entry
    pub fn stage(&self, path: &Path) -> Result<TrashEntry> {
        if !path.exists() {
            return Err(Error::fs(
                "stage",
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such directory"),
            ));
        }

        let entry = TrashEntry::for_path(path);
        if entry.exists() {
            warn!("Replacing stale trash at {}", entry.location.display());
            self.fs.remove_all(&entry.location)?;
        }

        self.fs.rename(&entry.original, &entry.location)?;
        debug!("Staged {} to trash", path.display());
        Ok(entry)
    }

    /// Move the staged tree back, replacing whatever is at the original path
    pub fn restore(&self, entry: &TrashEntry) -> Result<()> {
        if !entry.exists() {
            return Err(Error::fs(
                "restore",
                &entry.location,
                io::Error::new(io::ErrorKind::NotFound, "trash entry does not exist"),
            ));
        }

        self.fs.remove_all(&entry.original)?;
        self.fs.rename(&entry.location, &entry.original)?;
        debug!("Restored {} from trash", entry.original.display());
        Ok(())
    }

    /// Delete the staged tree. Failures are logged, never returned.
    pub fn discard(&self, entry: &TrashEntry) {
        match self.fs.remove_all(&entry.location) {
            Ok(()) => debug!("Discarded trash {}", entry.location.display()),
            Err(e) => warn!("Cannot remove {}: {}", entry.location.display(), e),
        }
    }
}
