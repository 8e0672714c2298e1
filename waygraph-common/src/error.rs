//! Error types for the graph storage engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("version mismatch: {0}")]
    VersionMismatch(String),

    #[error("{0} is already initialized")]
    AlreadyInitialized(String),

    #[error("missing sibling file: {0}")]
    MissingSibling(String),

    #[error("corrupted storage: {0}")]
    Corruption(String),
}
