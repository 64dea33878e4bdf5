// src/users.rs

//! User accounts whose home directories may hold package data
//!
//! Enumeration and uid/gid lookup sit behind the `UserDirectory` trait so
//! migrations can run against a fixed user set in tests.

use crate::error::{Error, Result};
use crate::layout::{DataLayout, LayoutMode};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A system user account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub name: String,
    pub home: PathBuf,
}

impl UserAccount {
    pub fn new(name: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            home: home.into(),
        }
    }
}

/// Source of user accounts and their ownership
pub trait UserDirectory {
    /// Accounts whose package container directory exists for `mode`
    fn users(&self, mode: LayoutMode) -> Result<Vec<UserAccount>>;

    /// Resolve the (uid, gid) pair new directories should be owned by
    fn ownership(&self, user: &UserAccount) -> Result<(u32, u32)>;
}

/// Owner of a home directory, used as the account's uid/gid
pub fn home_ownership(user: &UserAccount) -> Result<(u32, u32)> {
    let meta = fs::metadata(&user.home).map_err(|e| Error::Ownership {
        user: user.name.clone(),
        reason: format!("cannot stat {}: {}", user.home.display(), e),
    })?;
    Ok((meta.uid(), meta.gid()))
}

/// Users discovered by scanning the home directory roots
#[derive(Debug, Clone)]
pub struct SystemUsers {
    layout: DataLayout,
}

impl SystemUsers {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    fn candidates(&self) -> Result<Vec<UserAccount>> {
        let mut accounts = Vec::new();

        match fs::read_dir(self.layout.home_root()) {
            Ok(entries) => {
                let mut homes = entries
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<std::io::Result<Vec<_>>>()
                    .map_err(|e| {
                        Error::UserEnumeration(format!(
                            "cannot list {}: {}",
                            self.layout.home_root().display(),
                            e
                        ))
                    })?;
                homes.sort();
                accounts.extend(homes.into_iter().filter(|p| p.is_dir()).map(account_for));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Home root {} does not exist", self.layout.home_root().display());
            }
            Err(e) => {
                return Err(Error::UserEnumeration(format!(
                    "cannot list {}: {}",
                    self.layout.home_root().display(),
                    e
                )));
            }
        }

        let root_home = self.layout.root_home();
        if root_home.is_dir() {
            accounts.push(UserAccount::new("root", root_home));
        }

        Ok(accounts)
    }
}

fn account_for(home: PathBuf) -> UserAccount {
    let name = home
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    UserAccount::new(name, home)
}

impl UserDirectory for SystemUsers {
    fn users(&self, mode: LayoutMode) -> Result<Vec<UserAccount>> {
        let users: Vec<_> = self
            .candidates()?
            .into_iter()
            .filter(|u| self.layout.user_container_dir(&u.home, mode).is_dir())
            .collect();
        debug!("Found {} user(s) with {} data", users.len(), mode.as_str());
        Ok(users)
    }

    fn ownership(&self, user: &UserAccount) -> Result<(u32, u32)> {
        home_ownership(user)
    }
}

/// A fixed, already-resolved set of users
#[derive(Debug, Clone, Default)]
pub struct StaticUsers {
    users: Vec<UserAccount>,
}

impl StaticUsers {
    pub fn new(users: Vec<UserAccount>) -> Self {
        Self { users }
    }

    pub fn from_homes<I, P>(homes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::new(
            homes
                .into_iter()
                .map(|h| account_for(h.as_ref().to_path_buf()))
                .collect(),
        )
    }
}

impl UserDirectory for StaticUsers {
    fn users(&self, _mode: LayoutMode) -> Result<Vec<UserAccount>> {
        Ok(self.users.clone())
    }

    fn ownership(&self, user: &UserAccount) -> Result<(u32, u32)> {
        home_ownership(user)
    }
}
