// src/hidden.rs

//! Moving per-user package data between `~/snap` and `~/.snap/data`
//!
//! Each user is migrated with a single atomic rename of the package
//! directory. `hide` stops at the first failing user; `unhide` is used for
//! recovery and keeps going so as many users as possible end up back in
//! the exposed layout.

use crate::error::{Error, Result};
use crate::failure::FailureAggregator;
use crate::fsops::DataFs;
use crate::layout::{DataLayout, LayoutMode};
use crate::users::{UserAccount, UserDirectory};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Mode for newly created per-user container directories
const USER_DIR_MODE: u32 = 0o700;

/// Migrates users' package directories between layouts
pub struct HiddenLayoutMigrator<'a> {
    layout: &'a DataLayout,
    users: &'a dyn UserDirectory,
    fs: &'a dyn DataFs,
}

/// Whether `path` exists; only "not found" counts as absent
fn probe(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::fs("stat", path, e)),
    }
}

impl<'a> HiddenLayoutMigrator<'a> {
    pub fn new(layout: &'a DataLayout, users: &'a dyn UserDirectory, fs: &'a dyn DataFs) -> Self {
        Self { layout, users, fs }
    }

    /// Move every user's `~/snap/<package>` to `~/.snap/data/<package>`
    ///
    /// Users without exposed data are skipped, so calling this twice is
    /// harmless. The first failure aborts: users already handled stay
    /// migrated, later users are left untouched.
    pub fn hide(&self, package: &str) -> Result<()> {
        let users = self.users.users(LayoutMode::PreMigrationHidden)?;
        let mut agg = FailureAggregator::fail_fast();
        let mut migrated = 0;

        for user in &users {
            match self.hide_user(user, package) {
                Ok(true) => migrated += 1,
                Ok(false) => {}
                Err(e) => agg.handle(e)?,
            }
        }

        info!("Moved {} data to the hidden layout for {} user(s)", package, migrated);
        agg.finish()
    }

    fn hide_user(&self, user: &UserAccount, package: &str) -> Result<bool> {
        let exposed = self
            .layout
            .user_package_dir(&user.home, package, LayoutMode::PreMigrationHidden);
        if !probe(&exposed)? {
            debug!("No {} data for user {}, skipping", package, user.name);
            return Ok(false);
        }

        let (uid, gid) = self.users.ownership(user)?;
        let hidden_container = self
            .layout
            .user_container_dir(&user.home, LayoutMode::PostMigrationHidden);
        self.fs
            .mkdir_all_chown(&hidden_container, USER_DIR_MODE, uid, gid)?;

        let hidden = self
            .layout
            .user_package_dir(&user.home, package, LayoutMode::PostMigrationHidden);
        self.fs.rename(&exposed, &hidden)?;

        let exposed_container = self
            .layout
            .user_container_dir(&user.home, LayoutMode::PreMigrationHidden);
        self.fs.remove_if_empty(&exposed_container)?;

        debug!("Moved {} to {}", exposed.display(), hidden.display());
        Ok(true)
    }

    /// Move every user's hidden package directory back to `~/snap`
    ///
    /// All users are attempted. The first failure is returned once every
    /// user has been processed; later ones are only logged.
    ///
    /// An emptied `~/.snap/data` is removed, and so is `~/.snap` when
    /// nothing else is left in it, even if it existed before `hide`.
    pub fn unhide(&self, package: &str) -> Result<()> {
        let users = self.users.users(LayoutMode::PostMigrationHidden)?;
        let mut agg = FailureAggregator::best_effort();
        let mut restored = 0;

        for user in &users {
            let hidden = self
                .layout
                .user_package_dir(&user.home, package, LayoutMode::PostMigrationHidden);
            match probe(&hidden) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("User {} has no hidden {} data, skipping", user.name, package);
                    continue;
                }
                Err(e) => {
                    agg.handle(e)?;
                    continue;
                }
            }

            let Some((uid, gid)) = agg.check(self.users.ownership(user))? else {
                continue;
            };

            let exposed_container = self
                .layout
                .user_container_dir(&user.home, LayoutMode::PreMigrationHidden);
            if let Err(e) = self
                .fs
                .mkdir_all_chown(&exposed_container, USER_DIR_MODE, uid, gid)
            {
                agg.handle(e)?;
                continue;
            }

            let exposed = self
                .layout
                .user_package_dir(&user.home, package, LayoutMode::PreMigrationHidden);
            match self.fs.rename(&hidden, &exposed) {
                Ok(()) => restored += 1,
                Err(e) => agg.handle(e)?,
            }

            // Drop ~/.snap/data, then ~/.snap, once nothing is left in them
            let hidden_container = self
                .layout
                .user_container_dir(&user.home, LayoutMode::PostMigrationHidden);
            if let Err(e) = self.fs.remove_if_empty(&hidden_container) {
                agg.handle(e)?;
                continue;
            }
            if !hidden_container.exists()
                && let Some(parent) = hidden_container.parent()
                && parent != user.home
                && let Err(e) = self.fs.remove_if_empty(parent)
            {
                agg.handle(e)?;
            }
        }

        info!("Moved {} data back to the exposed layout for {} user(s)", package, restored);
        agg.finish()
    }

    /// Each user's current layout for `package`, `None` if they have no data
    pub fn layout_modes(&self, package: &str) -> Result<Vec<(UserAccount, Option<LayoutMode>)>> {
        let mut users = self.users.users(LayoutMode::Exposed)?;
        for user in self.users.users(LayoutMode::PostMigrationHidden)? {
            if !users.contains(&user) {
                users.push(user);
            }
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let mode = LayoutMode::probe(&user.home, package);
                (user, mode)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsops::RealFs;
    use crate::users::StaticUsers;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct Fixture {
        _temp: tempfile::TempDir,
        layout: DataLayout,
        homes: Vec<PathBuf>,
    }

    fn fixture(names: &[&str]) -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let homes: Vec<_> = names
            .iter()
            .map(|n| {
                let home = temp.path().join("home").join(n);
                fs::create_dir_all(&home).unwrap();
                home
            })
            .collect();
        let layout = DataLayout::new(
            temp.path().join("var/snap"),
            temp.path().join("home"),
            temp.path().join("root"),
        );
        Fixture {
            _temp: temp,
            layout,
            homes,
        }
    }

    fn seed_exposed(home: &Path, package: &str) {
        let dir = home.join("snap").join(package).join("1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("settings"), home.display().to_string()).unwrap();
    }

    /// Records every rename and fails those whose source is listed
    #[derive(Default)]
    struct RecordingFs {
        fail_rename: Vec<PathBuf>,
        fail_remove_if_empty: bool,
        renamed: RefCell<Vec<PathBuf>>,
    }

    impl DataFs for RecordingFs {
        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            self.renamed.borrow_mut().push(from.to_path_buf());
            if self.fail_rename.iter().any(|p| p == from) {
                return Err(Error::rename(from, to, io::Error::other("injected")));
            }
            RealFs.rename(from, to)
        }
        fn mkdir_all_chown(&self, path: &Path, mode: u32, uid: u32, gid: u32) -> Result<()> {
            RealFs.mkdir_all_chown(path, mode, uid, gid)
        }
        fn mkdir_all(&self, path: &Path) -> Result<()> {
            RealFs.mkdir_all(path)
        }
        fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
            RealFs.copy_tree(src, dst)
        }
        fn remove_all(&self, path: &Path) -> Result<()> {
            RealFs.remove_all(path)
        }
        fn remove_if_empty(&self, dir: &Path) -> Result<()> {
            if self.fail_remove_if_empty {
                return Err(Error::fs("remove", dir, io::Error::other("injected")));
            }
            RealFs.remove_if_empty(dir)
        }
    }

    #[test]
    fn test_hide_moves_data_and_drops_empty_container() {
        let f = fixture(&["alice"]);
        seed_exposed(&f.homes[0], "hello");
        let users = StaticUsers::from_homes(&f.homes);

        HiddenLayoutMigrator::new(&f.layout, &users, &RealFs)
            .hide("hello")
            .unwrap();

        let home = &f.homes[0];
        assert!(home.join(".snap/data/hello/1/settings").exists());
        assert!(!home.join("snap").exists());
    }

    #[test]
    fn test_hide_keeps_container_with_other_packages() {
        let f = fixture(&["alice"]);
        seed_exposed(&f.homes[0], "hello");
        seed_exposed(&f.homes[0], "other");
        let users = StaticUsers::from_homes(&f.homes);

        HiddenLayoutMigrator::new(&f.layout, &users, &RealFs)
            .hide("hello")
            .unwrap();
        assert!(f.homes[0].join("snap/other").exists());
        assert!(!f.homes[0].join("snap/hello").exists());
    }

    #[test]
    fn test_hide_skips_users_without_data() {
        let f = fixture(&["alice", "bob"]);
        seed_exposed(&f.homes[1], "hello");
        let users = StaticUsers::from_homes(&f.homes);

        HiddenLayoutMigrator::new(&f.layout, &users, &RealFs)
            .hide("hello")
            .unwrap();
        assert!(!f.homes[0].join(".snap").exists());
        assert!(f.homes[1].join(".snap/data/hello").exists());
    }

    #[test]
    fn test_hide_twice_is_noop() {
        let f = fixture(&["alice"]);
        seed_exposed(&f.homes[0], "hello");
        let users = StaticUsers::from_homes(&f.homes);
        let migrator = HiddenLayoutMigrator::new(&f.layout, &users, &RealFs);

        migrator.hide("hello").unwrap();
        migrator.hide("hello").unwrap();
        assert!(f.homes[0].join(".snap/data/hello/1").exists());
    }

    #[test]
    fn test_hide_fails_fast() {
        let f = fixture(&["alice", "bob", "carol"]);
        for home in &f.homes {
            seed_exposed(home, "hello");
        }
        let users = StaticUsers::from_homes(&f.homes);
        let bob_exposed = f.homes[1].join("snap/hello");
        let fs_ops = RecordingFs {
            fail_rename: vec![bob_exposed.clone()],
            ..Default::default()
        };

        let err = HiddenLayoutMigrator::new(&f.layout, &users, &fs_ops)
            .hide("hello")
            .unwrap_err();
        assert!(matches!(err, Error::Rename { ref from, .. } if *from == bob_exposed));

        assert!(f.homes[0].join(".snap/data/hello").exists());
        assert!(f.homes[1].join("snap/hello").exists());
        assert!(f.homes[2].join("snap/hello").exists());
        assert!(!f.homes[2].join(".snap").exists());
        assert_eq!(fs_ops.renamed.borrow().len(), 2);
    }

    #[test]
    fn test_hide_reports_cleanup_failure() {
        let f = fixture(&["alice"]);
        seed_exposed(&f.homes[0], "hello");
        let users = StaticUsers::from_homes(&f.homes);
        let fs_ops = RecordingFs {
            fail_remove_if_empty: true,
            ..Default::default()
        };

        let err = HiddenLayoutMigrator::new(&f.layout, &users, &fs_ops)
            .hide("hello")
            .unwrap_err();
        assert!(matches!(err, Error::Fs { op: "remove", .. }));
        // The rename itself had already happened
        assert!(f.homes[0].join(".snap/data/hello").exists());
    }

    #[test]
    fn test_unhide_round_trip() {
        let f = fixture(&["alice", "bob"]);
        for home in &f.homes {
            seed_exposed(home, "hello");
        }
        let users = StaticUsers::from_homes(&f.homes);
        let migrator = HiddenLayoutMigrator::new(&f.layout, &users, &RealFs);

        migrator.hide("hello").unwrap();
        migrator.unhide("hello").unwrap();

        for home in &f.homes {
            let settings = fs::read_to_string(home.join("snap/hello/1/settings")).unwrap();
            assert_eq!(settings, home.display().to_string());
            assert!(!home.join(".snap").exists());
        }
    }

    #[test]
    fn test_unhide_continues_after_failure() {
        let f = fixture(&["alice", "bob", "carol"]);
        for home in &f.homes {
            seed_exposed(home, "hello");
        }
        let users = StaticUsers::from_homes(&f.homes);
        HiddenLayoutMigrator::new(&f.layout, &users, &RealFs)
            .hide("hello")
            .unwrap();

        let alice_hidden = f.homes[0].join(".snap/data/hello");
        let bob_hidden = f.homes[1].join(".snap/data/hello");
        let fs_ops = RecordingFs {
            fail_rename: vec![alice_hidden.clone(), bob_hidden],
            ..Default::default()
        };
        let err = HiddenLayoutMigrator::new(&f.layout, &users, &fs_ops)
            .unhide("hello")
            .unwrap_err();

        assert!(matches!(err, Error::Rename { ref from, .. } if *from == alice_hidden));
        assert_eq!(fs_ops.renamed.borrow().len(), 3);
        assert!(f.homes[2].join("snap/hello/1/settings").exists());
        assert!(f.homes[0].join(".snap/data/hello").exists());
    }

    #[test]
    fn test_layout_modes() {
        let f = fixture(&["alice", "bob"]);
        seed_exposed(&f.homes[0], "hello");
        seed_exposed(&f.homes[1], "hello");
        let users = StaticUsers::from_homes(&f.homes);
        let migrator = HiddenLayoutMigrator::new(&f.layout, &users, &RealFs);

        let fs_ops = RecordingFs {
            fail_rename: vec![f.homes[1].join("snap/hello")],
            ..Default::default()
        };
        let _ = HiddenLayoutMigrator::new(&f.layout, &users, &fs_ops).hide("hello");

        let modes: Vec<_> = migrator
            .layout_modes("hello")
            .unwrap()
            .into_iter()
            .map(|(_, mode)| mode)
            .collect();
        assert_eq!(
            modes,
            vec![Some(LayoutMode::PostMigrationHidden), Some(LayoutMode::Exposed)]
        );
        assert_eq!(migrator.layout_modes("missing").unwrap()[0].1, None);
    }
}
