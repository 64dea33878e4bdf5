// src/layout.rs

//! Directory layout for package data
//!
//! Paths are built, never stored:
//! - `<base>/<instance>/<revision>` - versioned data
//! - `<base>/<instance>/common` - revision-independent data
//! - `<home>/snap/<instance>` - exposed per-user data
//! - `<home>/.snap/data/<instance>` - hidden per-user data

use crate::revision::PackageRevision;
use crate::users::UserAccount;
use std::path::{Path, PathBuf};

/// Default system data root
pub const DEFAULT_BASE_DIR: &str = "/var/snap";

/// Default parent of regular users' home directories
pub const DEFAULT_HOME_ROOT: &str = "/home";

/// Default home directory of the root user
pub const DEFAULT_ROOT_HOME: &str = "/root";

const EXPOSED_DIR: &str = "snap";
const HIDDEN_DIR: &str = ".snap/data";
const COMMON_DIR: &str = "common";

/// Where a user's per-package directories live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Classic `~/snap` layout, hidden layout not enabled
    Exposed,
    /// Hidden layout enabled but data not yet moved; still `~/snap`
    PreMigrationHidden,
    /// Data lives under `~/.snap/data`
    PostMigrationHidden,
}

impl LayoutMode {
    pub fn is_hidden(&self) -> bool {
        matches!(self, LayoutMode::PostMigrationHidden)
    }

    /// Container directory for this mode relative to a home directory
    fn container(&self) -> &'static str {
        if self.is_hidden() { HIDDEN_DIR } else { EXPOSED_DIR }
    }

    /// Infer a user's mode for a package from which directory exists
    ///
    /// Returns `None` when neither location holds the package.
    pub fn probe(home: &Path, instance_name: &str) -> Option<Self> {
        if home.join(HIDDEN_DIR).join(instance_name).is_dir() {
            Some(LayoutMode::PostMigrationHidden)
        } else if home.join(EXPOSED_DIR).join(instance_name).is_dir() {
            Some(LayoutMode::Exposed)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Exposed => "exposed",
            LayoutMode::PreMigrationHidden => "pre-migration-hidden",
            LayoutMode::PostMigrationHidden => "hidden",
        }
    }
}

/// Kind of data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirKind {
    Versioned,
    Common,
    Trash,
}

/// Path builder rooted at the system data dir and the home roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    base_dir: PathBuf,
    home_root: PathBuf,
    root_home: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR, DEFAULT_HOME_ROOT, DEFAULT_ROOT_HOME)
    }
}

impl DataLayout {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        home_root: impl Into<PathBuf>,
        root_home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            home_root: home_root.into(),
            root_home: root_home.into(),
        }
    }

    pub fn home_root(&self) -> &Path {
        &self.home_root
    }

    pub fn root_home(&self) -> &Path {
        &self.root_home
    }

    /// `<base>/<name>`, shared by all instances of a package
    pub fn package_base_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// `<base>/<instance>`
    pub fn instance_dir(&self, pkg: &PackageRevision) -> PathBuf {
        self.base_dir.join(pkg.instance_name())
    }

    pub fn versioned_dir(&self, pkg: &PackageRevision) -> PathBuf {
        self.instance_dir(pkg).join(pkg.revision.to_string())
    }

    pub fn common_dir(&self, pkg: &PackageRevision) -> PathBuf {
        self.instance_dir(pkg).join(COMMON_DIR)
    }

    /// `~/snap` or `~/.snap/data`
    pub fn user_container_dir(&self, home: &Path, mode: LayoutMode) -> PathBuf {
        home.join(mode.container())
    }

    pub fn user_package_dir(&self, home: &Path, instance_name: &str, mode: LayoutMode) -> PathBuf {
        self.user_container_dir(home, mode).join(instance_name)
    }

    pub fn user_versioned_dir(&self, home: &Path, pkg: &PackageRevision, mode: LayoutMode) -> PathBuf {
        self.user_package_dir(home, &pkg.instance_name(), mode)
            .join(pkg.revision.to_string())
    }

    pub fn user_common_dir(&self, home: &Path, pkg: &PackageRevision, mode: LayoutMode) -> PathBuf {
        self.user_package_dir(home, &pkg.instance_name(), mode)
            .join(COMMON_DIR)
    }

    /// All directories of one kind for a package: the system one first,
    /// then one per user in the given order
    pub fn data_dirs(
        &self,
        pkg: &PackageRevision,
        kind: DataDirKind,
        users: &[UserAccount],
        mode: LayoutMode,
    ) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(users.len() + 1);
        match kind {
            DataDirKind::Versioned => {
                dirs.push(self.versioned_dir(pkg));
                dirs.extend(users.iter().map(|u| self.user_versioned_dir(&u.home, pkg, mode)));
            }
            DataDirKind::Common => {
                dirs.push(self.common_dir(pkg));
                dirs.extend(users.iter().map(|u| self.user_common_dir(&u.home, pkg, mode)));
            }
            DataDirKind::Trash => {
                dirs = self
                    .data_dirs(pkg, DataDirKind::Versioned, users, mode)
                    .iter()
                    .map(|d| crate::trash::trash_path(d))
                    .collect();
            }
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::Revision;

    fn pkg(rev: i32) -> PackageRevision {
        PackageRevision::new("hello", Revision::new(rev).unwrap())
    }

    #[test]
    fn test_system_paths() {
        let layout = DataLayout::default();
        assert_eq!(layout.versioned_dir(&pkg(3)), PathBuf::from("/var/snap/hello/3"));
        assert_eq!(layout.common_dir(&pkg(3)), PathBuf::from("/var/snap/hello/common"));

        let keyed = pkg(3).with_instance_key("foo");
        assert_eq!(layout.versioned_dir(&keyed), PathBuf::from("/var/snap/hello_foo/3"));
        assert_eq!(layout.package_base_dir("hello"), PathBuf::from("/var/snap/hello"));
    }

    #[test]
    fn test_user_paths_per_mode() {
        let layout = DataLayout::default();
        let home = Path::new("/home/alice");
        assert_eq!(
            layout.user_package_dir(home, "hello", LayoutMode::Exposed),
            PathBuf::from("/home/alice/snap/hello")
        );
        assert_eq!(
            layout.user_package_dir(home, "hello", LayoutMode::PreMigrationHidden),
            PathBuf::from("/home/alice/snap/hello")
        );
        assert_eq!(
            layout.user_versioned_dir(home, &pkg(-2), LayoutMode::PostMigrationHidden),
            PathBuf::from("/home/alice/.snap/data/hello/x2")
        );
    }

    #[test]
    fn test_data_dirs_orders_system_first() {
        let layout = DataLayout::default();
        let users = vec![
            UserAccount::new("alice", "/home/alice"),
            UserAccount::new("bob", "/home/bob"),
        ];
        let dirs = layout.data_dirs(&pkg(1), DataDirKind::Trash, &users, LayoutMode::Exposed);
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/var/snap/hello/1.old"),
                PathBuf::from("/home/alice/snap/hello/1.old"),
                PathBuf::from("/home/bob/snap/hello/1.old"),
            ]
        );
    }

    #[test]
    fn test_probe_mode() {
        let temp = tempfile::tempdir().unwrap();
        let home = temp.path();
        assert_eq!(LayoutMode::probe(home, "hello"), None);

        std::fs::create_dir_all(home.join("snap/hello")).unwrap();
        assert_eq!(LayoutMode::probe(home, "hello"), Some(LayoutMode::Exposed));

        std::fs::create_dir_all(home.join(".snap/data/hello")).unwrap();
        assert_eq!(
            LayoutMode::probe(home, "hello"),
            Some(LayoutMode::PostMigrationHidden)
        );
    }
}
