// src/revision.rs

//! Package identity: revisions and the (package, revision) pair whose
//! data directories are being migrated.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// An installed revision of a package payload
///
/// Positive values are store revisions. Negative values are local
/// (side-loaded) revisions and render as `x1`, `x2`, ... Zero means unset
/// and never parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(i32);

impl Revision {
    /// Create a revision from its raw value
    pub fn new(n: i32) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidRevision("revision cannot be zero".to_string()));
        }
        Ok(Self(n))
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Side-loaded revisions are not known to the store
    pub fn is_local(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "x{}", -(self.0 as i64))
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (digits, local) = match s.strip_prefix('x') {
            Some(rest) => (rest, true),
            None => (s, false),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidRevision(s.to_string()));
        }

        let n: i32 = digits
            .parse()
            .map_err(|_| Error::InvalidRevision(s.to_string()))?;
        if n == 0 {
            return Err(Error::InvalidRevision(s.to_string()));
        }

        Ok(Self(if local { -n } else { n }))
    }
}

/// A package at a specific revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRevision {
    pub name: String,
    pub instance_key: Option<String>,
    pub revision: Revision,
}

impl PackageRevision {
    pub fn new(name: impl Into<String>, revision: Revision) -> Self {
        Self {
            name: name.into(),
            instance_key: None,
            revision,
        }
    }

    /// Attach a parallel-install instance key
    pub fn with_instance_key(mut self, key: impl Into<String>) -> Self {
        self.instance_key = Some(key.into());
        self
    }

    /// Name used for on-disk directories: `name` or `name_key`
    pub fn instance_name(&self) -> String {
        match &self.instance_key {
            Some(key) => format!("{}_{}", self.name, key),
            None => self.name.clone(),
        }
    }

    /// Whether `other` names the same revision of this package
    pub fn same_revision(&self, other: &PackageRevision) -> bool {
        self.revision == other.revision
    }
}

impl fmt::Display for PackageRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (revision {})", self.instance_name(), self.revision)
    }
}
