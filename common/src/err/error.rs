use std::io;

/// Crate-wide error type. Mirrors the error boundaries from §7: allocation
/// failure, protocol violation, adapter error, and client I/O error never
/// cross from one subsystem into another's callers.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("arena allocation failed: {0}")]
    Allocation(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("unknown table id {0}")]
    UnknownTable(u8),

    #[error("unknown index id {0} for table {1}")]
    UnknownIndex(u8, String),

    #[error("database adapter error: {0}")]
    Adapter(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
