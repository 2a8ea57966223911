use thiserror::Error;

use crate::chain::ChainError;
use crate::metadata::MetadataError;
use crate::wallet::WalletError;

#[derive(Error, Debug)]
pub enum BlocknotesError {
    #[error("Not in a blocknotes project. Run 'blocknotes init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .blocknotes/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

pub type Result<T> = std::result::Result<T, BlocknotesError>;
