//! Identity directory abstraction.
//!
//! The protocol core only needs two questions answered: "do these credentials
//! belong to someone?" and "who is this name?". Backends implement [`Directory`].

pub mod static_file;

pub use static_file::StaticDirectory;

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// A verified end user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Directory login name.
    pub subject: String,
    pub full_name: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid credentials for `{0}`")]
    InvalidCredentials(String),
    #[error("no directory entry for `{0}`")]
    NotFound(String),
    #[error("failed to load directory from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("invalid directory: {0}")]
    Invalid(String),
}

/// Lookup backend for principals.
///
/// Implementations may block (hashing, network); callers on the async runtime are
/// expected to run them on the blocking pool.
pub trait Directory: Send + Sync {
    /// Check a name / password pair. Unknown names and wrong passwords fail the same way.
    fn verify_credentials(&self, name: &str, password: &str) -> Result<Principal, DirectoryError>;

    fn lookup_principal(&self, name: &str) -> Result<Principal, DirectoryError>;
}
