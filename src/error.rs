// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Core error types for snapdata
#[derive(Error, Debug)]
pub enum Error {
    /// A filesystem operation failed on a specific path
    #[error("cannot {op} {}: {source}", .path.display())]
    Fs {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An atomic rename between two paths failed
    #[error("cannot move {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The uid/gid of a user account could not be resolved
    #[error("cannot resolve ownership for user {user}: {reason}")]
    Ownership { user: String, reason: String },

    /// The set of user accounts could not be listed
    #[error("cannot enumerate users: {0}")]
    UserEnumeration(String),

    /// A revision string could not be parsed
    #[error("invalid revision: {0}")]
    InvalidRevision(String),
}

impl Error {
    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Fs {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file or directory
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Fs { source, .. } | Error::Rename { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

/// Result type alias using snapdata's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_names_operation_and_path() {
        let err = Error::fs(
            "remove",
            "/var/snap/foo/1",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cannot remove /var/snap/foo/1"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_rename_not_found() {
        let err = Error::rename("/a", "/b", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("cannot move /a to /b"));
    }
}
