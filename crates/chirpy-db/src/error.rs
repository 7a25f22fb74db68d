use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing has been written yet, or the requested collection has no records.
    #[error("store is empty")]
    Empty,
    #[error("record not found")]
    NotFound,
    /// The record exists but belongs to someone else.
    #[error("record is owned by another user")]
    NotOwner,
    #[error("record already exists")]
    AlreadyExists,
    #[error("invalid record: {0}")]
    Invalid(&'static str),
    #[error("store path must be a .json file: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}
