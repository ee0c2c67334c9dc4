use crate::model::{BranchId, NoteId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotetarError {
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("Branch not found: {0}")]
    BranchNotFound(BranchId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Api Error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, NotetarError>;
