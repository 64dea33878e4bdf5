// src/migrate.rs

//! Revision data migration
//!
//! When a package moves from one revision to another, its versioned data
//! is carried forward:
//! - data already present for the new revision is staged to trash
//! - the prior revision's directories are staged to trash
//! - their contents are copied into the new revision's directories
//! - undo removes what was created and restores the trash
//! - once the transition is committed, the trash is cleared
//!
//! The system directory is handled first, then each user's per-user
//! directory in enumeration order.

use crate::error::Result;
use crate::failure::FailureAggregator;
use crate::fsops::DataFs;
use crate::layout::{DataDirKind, DataLayout, LayoutMode};
use crate::revision::{PackageRevision, Revision};
use crate::trash::{Trash, TrashEntry, trash_entries};
use crate::users::{UserAccount, UserDirectory};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Carries versioned data across revisions of a package
pub struct DataMigrator<'a> {
    layout: &'a DataLayout,
    users: &'a dyn UserDirectory,
    fs: &'a dyn DataFs,
    mode: LayoutMode,
}

impl<'a> DataMigrator<'a> {
    pub fn new(layout: &'a DataLayout, users: &'a dyn UserDirectory, fs: &'a dyn DataFs) -> Self {
        Self {
            layout,
            users,
            fs,
            mode: LayoutMode::Exposed,
        }
    }

    /// Select which per-user layout the package's data currently uses
    pub fn with_mode(mut self, mode: LayoutMode) -> Self {
        self.mode = mode;
        self
    }

    fn versioned_dirs(&self, pkg: &PackageRevision, users: &[UserAccount]) -> Vec<PathBuf> {
        self.layout
            .data_dirs(pkg, DataDirKind::Versioned, users, self.mode)
    }

    /// Copy the prior revision's data forward for `new`
    ///
    /// Fails fast. Existing data of the new revision is staged to trash
    /// before the old revision's, and a failed copy leaves both entries in
    /// place so `undo_copy_forward` can recover them.
    pub fn copy_forward(&self, new: &PackageRevision, old: Option<&PackageRevision>) -> Result<()> {
        if new.instance_key.is_some() {
            self.fs.mkdir_all(&self.layout.package_base_dir(&new.name))?;
        }
        // Common data survives every revision, so it is ensured even on refresh
        self.fs.mkdir_all(&self.layout.common_dir(new))?;

        let Some(old) = old else {
            self.fs.mkdir_all(&self.layout.versioned_dir(new))?;
            info!("Created data directories for {}", new);
            return Ok(());
        };

        if old.same_revision(new) {
            debug!("{} is already at revision {}, nothing to copy", new.instance_name(), old.revision);
            return Ok(());
        }

        let users = self.users.users(self.mode)?;
        let trash = Trash::new(self.fs);
        let old_dirs = self.versioned_dirs(old, &users);
        let new_dirs = self.versioned_dirs(new, &users);

        for (idx, (old_dir, new_dir)) in old_dirs.iter().zip(&new_dirs).enumerate() {
            let entry = if old_dir.exists() {
                if new_dir.exists() {
                    trash.stage(new_dir)?;
                }
                trash.stage(old_dir)?
            } else {
                // An interrupted earlier attempt may have staged it already
                let entry = TrashEntry::for_path(old_dir);
                if !entry.exists() {
                    if idx == 0 {
                        self.fs.mkdir_all(new_dir)?;
                    }
                    debug!("No prior data at {}, skipping", old_dir.display());
                    continue;
                }
                // new_dir was staged before old_dir, so anything here is a partial copy
                debug!("Resuming copy from {}", entry.location().display());
                self.fs.remove_all(new_dir)?;
                entry
            };

            self.fs.copy_tree(entry.location(), new_dir)?;
        }

        info!("Copied data of {} to revision {}", old, new.revision);
        Ok(())
    }

    /// Undo `copy_forward`
    ///
    /// Every step is attempted even if an earlier one failed; the first
    /// error is returned and the rest are logged.
    pub fn undo_copy_forward(&self, new: &PackageRevision, old: Option<&PackageRevision>) -> Result<()> {
        if old.is_some_and(|old| old.same_revision(new)) {
            return Ok(());
        }

        let mut agg = FailureAggregator::best_effort();
        let users = agg.check(self.users.users(self.mode))?.unwrap_or_default();

        self.remove_data_with(new, &users, &mut agg)?;

        match old {
            None => self.remove_common_with(new, &users, &mut agg)?,
            Some(old) => {
                let trash = Trash::new(self.fs);
                let staged = self
                    .versioned_dirs(new, &users)
                    .into_iter()
                    .chain(self.versioned_dirs(old, &users));
                for dir in staged {
                    let entry = TrashEntry::for_path(dir);
                    if !entry.exists() {
                        debug!("Nothing to restore at {}", entry.location().display());
                        continue;
                    }
                    if let Err(e) = trash.restore(&entry) {
                        agg.handle(e)?;
                    }
                }
            }
        }

        if agg.failures() > 0 {
            warn!("Undo of data copy for {} finished with {} error(s)", new, agg.failures());
        } else {
            info!("Undid data copy for {}", new);
        }
        agg.finish()
    }

    /// Remove every versioned directory of `pkg`; missing is fine
    pub fn remove_data(&self, pkg: &PackageRevision) -> Result<()> {
        let mut agg = FailureAggregator::best_effort();
        let users = agg.check(self.users.users(self.mode))?.unwrap_or_default();
        self.remove_data_with(pkg, &users, &mut agg)?;
        agg.finish()
    }

    /// Remove the system and per-user common directories of `pkg`
    pub fn remove_common_data(&self, pkg: &PackageRevision) -> Result<()> {
        let mut agg = FailureAggregator::best_effort();
        let users = agg.check(self.users.users(self.mode))?.unwrap_or_default();
        self.remove_common_with(pkg, &users, &mut agg)?;
        agg.finish()
    }

    fn remove_data_with(
        &self,
        pkg: &PackageRevision,
        users: &[UserAccount],
        agg: &mut FailureAggregator,
    ) -> Result<()> {
        self.remove_dirs(self.versioned_dirs(pkg, users), agg)
    }

    fn remove_common_with(
        &self,
        pkg: &PackageRevision,
        users: &[UserAccount],
        agg: &mut FailureAggregator,
    ) -> Result<()> {
        let dirs = self
            .layout
            .data_dirs(pkg, DataDirKind::Common, users, self.mode);
        self.remove_dirs(dirs, agg)
    }

    fn remove_dirs(&self, dirs: Vec<PathBuf>, agg: &mut FailureAggregator) -> Result<()> {
        for dir in dirs {
            if let Err(e) = self.fs.remove_all(&dir) {
                agg.handle(e)?;
            }
        }
        Ok(())
    }

    /// Discard the revision trash of `pkg`'s instance once a transition
    /// is committed
    ///
    /// Covers the staged data of both revisions involved, in the system
    /// directory and in each user's exposed and hidden layouts. Never
    /// fails; problems are logged.
    pub fn clear_trash(&self, pkg: &PackageRevision) {
        let instance = pkg.instance_name();
        let mut dirs = vec![self.layout.instance_dir(pkg)];
        for mode in [LayoutMode::Exposed, LayoutMode::PostMigrationHidden] {
            let users = match self.users.users(mode) {
                Ok(users) => users,
                Err(e) => {
                    warn!("Cannot list users to clear trash of {}: {}", pkg, e);
                    Vec::new()
                }
            };
            dirs.extend(
                users
                    .iter()
                    .map(|user| self.layout.user_package_dir(&user.home, &instance, mode)),
            );
        }
        dirs.sort();
        dirs.dedup();

        let trash = Trash::new(self.fs);
        for dir in dirs {
            for entry in trash_entries(&dir) {
                if is_revision_dir(entry.original()) {
                    trash.discard(&entry);
                }
            }
        }
        debug!("Cleared trash of {}", pkg);
    }
}

fn is_revision_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.parse::<Revision>().is_ok())
}
