use std::path::PathBuf;

use thiserror::Error;

/// A string that is neither an IP address nor a CIDR network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,

    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("invalid CIDR network: {0}")]
    InvalidNetwork(String),
}

/// Failure to write the last-target file. Reads never surface errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot replace {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
