//! Chain-side capabilities: building, submitting and looking up note
//! transactions.

mod blockfrost;
mod submitter;

pub use blockfrost::{status_for_http, BlockfrostClient};
pub use submitter::{ChainSubmitter, SubmitRequest};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::entity::TxStatus;
use crate::wallet::Wallet;

/// Prefix of locally synthesized transaction hashes.
pub const PLACEHOLDER_PREFIX: &str = "demo_";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("No wallet connected")]
    NoWallet,

    #[error("No transaction builder configured")]
    NoBuilder,

    #[error("Invalid receiver address: {0}")]
    InvalidAddress(String),

    #[error("Wallet request failed: {0}")]
    Wallet(String),

    #[error("Transaction build failed: {0}")]
    Build(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Submission rejected: {0}")]
    Submit(String),

    #[error("Network error: {0}")]
    Transport(String),
}

/// Payment of `lovelace` to `receiver` carrying `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub receiver: String,
    pub change_address: String,
    pub lovelace: u64,
    pub metadata_label: u64,
    /// Labelled metadata object as produced by [`crate::metadata::encode`].
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub cbor_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub cbor_hex: String,
}

/// Balances, fees and serializes transactions (coin selection lives here).
#[async_trait]
pub trait TxBuilder: Send + Sync {
    async fn build(&self, request: &PaymentRequest) -> Result<UnsignedTx, ChainError>;
    /// Combine an unsigned transaction with the wallet's witness set.
    fn assemble(&self, tx: &UnsignedTx, witness_set_hex: &str) -> Result<SignedTx, ChainError>;
}

/// Hands signed transactions to the network.
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    async fn submit_tx(&self, tx: &SignedTx) -> Result<String, ChainError>;
}

/// Answers whether a transaction made it on chain.
///
/// Implementations map indexer answers onto [`TxStatus`]: `Pending` means
/// "ask again later". An `Err` is a transport problem and is also retried.
#[async_trait]
pub trait ChainIndexer: Send + Sync {
    async fn tx_status(&self, hash: &str) -> Result<TxStatus, ChainError>;
}

#[async_trait]
impl TxSubmitter for Wallet {
    async fn submit_tx(&self, tx: &SignedTx) -> Result<String, ChainError> {
        self.api()
            .submit_tx(&tx.cbor_hex)
            .await
            .map_err(|e| ChainError::Submit(e.to_string()))
    }
}

/// Synthesize a hash for a submission that never reached the chain.
///
/// Format: `demo_<unix-ms>_<7 random chars>`.
pub fn placeholder_hash(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}_{}", PLACEHOLDER_PREFIX, now.timestamp_millis(), &suffix[..7])
}

pub fn is_placeholder(hash: &str) -> bool {
    hash.starts_with(PLACEHOLDER_PREFIX)
}

/// Submission time embedded in a placeholder hash.
///
/// Older versions wrote `demo_tx_<ms>_...`, so the first numeric segment is
/// used.
pub fn placeholder_timestamp(hash: &str) -> Option<DateTime<Utc>> {
    hash.strip_prefix(PLACEHOLDER_PREFIX)?
        .split('_')
        .find_map(|part| part.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}
