// src/fsops.rs

//! Filesystem primitives used by the migrators
//!
//! Every mutating step goes through `DataFs` so tests can inject failures
//! for chosen paths while the rest runs against a real directory tree.

use crate::error::{Error, Result};
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt, lchown, symlink};
use std::path::Path;
use tracing::debug;

/// Filesystem operations sequenced by the migrators
pub trait DataFs {
    /// Atomically move `from` to `to`
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create `path` and any missing parents with `mode`, owned by uid/gid.
    /// Existing directories are left untouched.
    fn mkdir_all_chown(&self, path: &Path, mode: u32, uid: u32, gid: u32) -> Result<()>;

    /// Create `path` and any missing parents; existing is not an error
    fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// Recursively copy `src` into `dst`, keeping mode, ownership and symlinks
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Recursively remove `path`; a missing path is success
    fn remove_all(&self, path: &Path) -> Result<()>;

    /// Remove `dir` only when it has no entries
    fn remove_if_empty(&self, dir: &Path) -> Result<()>;
}

/// `DataFs` backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl DataFs for RealFs {
    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| Error::rename(from, to, e))
    }

    fn mkdir_all_chown(&self, path: &Path, mode: u32, uid: u32, gid: u32) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }

        // Create outermost missing component first so each gets chowned
        let missing: Vec<_> = path
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .collect();

        for dir in missing.into_iter().rev() {
            match DirBuilder::new().mode(mode).create(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => continue,
                Err(e) => return Err(Error::fs("create", dir, e)),
            }
            lchown(dir, Some(uid), Some(gid)).map_err(|e| Error::fs("chown", dir, e))?;
        }
        Ok(())
    }

    fn mkdir_all(&self, path: &Path) -> Result<()> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(path)
            .map_err(|e| Error::fs("create", path, e))
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("Copying {} to {}", src.display(), dst.display());
        copy_entry(src, dst)
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::fs("stat", path, e)),
        };

        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::fs("remove", path, e)),
        }
    }

    fn remove_if_empty(&self, dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(dir).map_err(|e| Error::fs("read", dir, e))?;
        if entries.next().is_some() {
            return Ok(());
        }
        fs::remove_dir(dir).map_err(|e| Error::fs("remove", dir, e))
    }
}

fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| Error::fs("stat", src, e))?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(src).map_err(|e| Error::fs("read link", src, e))?;
        match fs::symlink_metadata(dst) {
            Ok(_) => fs::remove_file(dst).map_err(|e| Error::fs("remove", dst, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::fs("stat", dst, e)),
        }
        symlink(&target, dst).map_err(|e| Error::fs("symlink", dst, e))?;
    } else if file_type.is_dir() {
        match fs::create_dir(dst) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dst.is_dir() => {}
            Err(e) => return Err(Error::fs("create", dst, e)),
        }
        let entries = fs::read_dir(src).map_err(|e| Error::fs("read", src, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::fs("read", src, e))?;
            copy_entry(&entry.path(), &dst.join(entry.file_name()))?;
        }
        // Mode last so read-only directories can still be populated
        fs::set_permissions(dst, fs::Permissions::from_mode(meta.mode() & 0o7777))
            .map_err(|e| Error::fs("chmod", dst, e))?;
    } else {
        fs::copy(src, dst).map_err(|e| Error::fs("copy", src, e))?;
    }

    lchown(dst, Some(meta.uid()), Some(meta.gid())).map_err(|e| Error::fs("chown", dst, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree_preserves_contents_and_modes() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("config"), b"key=value").unwrap();
        fs::write(src.join("nested/script"), b"#!/bin/sh\n").unwrap();
        fs::set_permissions(src.join("nested/script"), fs::Permissions::from_mode(0o750)).unwrap();
        symlink("config", src.join("link")).unwrap();

        let dst = temp.path().join("dst");
        RealFs.copy_tree(&src, &dst).unwrap();

        assert_eq!(fs::read(dst.join("config")).unwrap(), b"key=value");
        let mode = fs::metadata(dst.join("nested/script")).unwrap().mode();
        assert_eq!(mode & 0o777, 0o750);
        assert_eq!(fs::read_link(dst.join("link")).unwrap(), Path::new("config"));
    }

    #[test]
    fn test_copy_tree_missing_source() {
        let temp = tempfile::tempdir().unwrap();
        let err = RealFs
            .copy_tree(&temp.path().join("missing"), &temp.path().join("dst"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mkdir_all_chown_creates_parents() {
        let temp = tempfile::tempdir().unwrap();
        let meta = fs::metadata(temp.path()).unwrap();
        let target = temp.path().join(".snap/data");

        RealFs
            .mkdir_all_chown(&target, 0o700, meta.uid(), meta.gid())
            .unwrap();
        assert!(target.is_dir());
        let mode = fs::metadata(&target).unwrap().mode();
        assert_eq!(mode & 0o777, 0o700);

        // Second call is a no-op
        RealFs
            .mkdir_all_chown(&target, 0o700, meta.uid(), meta.gid())
            .unwrap();
    }

    #[test]
    fn test_remove_all_tolerates_missing() {
        let temp = tempfile::tempdir().unwrap();
        RealFs.remove_all(&temp.path().join("missing")).unwrap();

        let dir = temp.path().join("dir");
        fs::create_dir_all(dir.join("a/b")).unwrap();
        RealFs.remove_all(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_remove_if_empty() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("snap");
        fs::create_dir_all(dir.join("hello")).unwrap();

        RealFs.remove_if_empty(&dir).unwrap();
        assert!(dir.exists(), "non-empty dir must stay");

        fs::remove_dir(dir.join("hello")).unwrap();
        RealFs.remove_if_empty(&dir).unwrap();
        assert!(!dir.exists());

        assert!(RealFs.remove_if_empty(&dir).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_reports_both_paths() {
        let temp = tempfile::tempdir().unwrap();
        let err = RealFs
            .rename(&temp.path().join("a"), &temp.path().join("b"))
            .unwrap_err();
        assert!(matches!(err, Error::Rename { .. }));
    }
}
