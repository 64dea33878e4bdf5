// src/lib.rs

//! Snapdata
//!
//! Lifecycle of a package's persistent data directories across two kinds
//! of transitions, with rollback over plain filesystem primitives.
//!
//! # Architecture
//!
//! - Trash: destructive steps first move data aside, so undo is a rename
//! - Revision migration: copy data forward on upgrade, undo on failure
//! - Hidden layout: move per-user data between `~/snap` and `~/.snap/data`
//! - Failure policy: fail fast on forward steps, best effort on recovery
//!
//! Callers must serialize operations per package; nothing here locks.

pub mod failure;
pub mod fsops;
pub mod hidden;
pub mod layout;
pub mod migrate;
pub mod revision;
pub mod trash;
pub mod users;
mod error;

pub use error::{Error, Result};
pub use failure::{FailureAggregator, FailurePolicy};
pub use fsops::{DataFs, RealFs};
pub use hidden::HiddenLayoutMigrator;
pub use layout::{DataDirKind, DataLayout, LayoutMode};
pub use migrate::DataMigrator;
pub use revision::{PackageRevision, Revision};
pub use trash::{Trash, TrashEntry};
pub use users::{StaticUsers, SystemUsers, UserAccount, UserDirectory};
