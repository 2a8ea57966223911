// src/entity/note.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Transaction, TxStatus};

/// A note and its on-chain anchoring state.
///
/// Serialized in camelCase so blobs written by earlier versions of the
/// application load unchanged. Fields introduced later (`transactions`,
/// `attachments`, `pendingDelete`) default when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub status: TxStatus,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub pending_delete: bool,
    /// Newest first.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(address: String, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            address,
            tx_hash: None,
            status: TxStatus::Pending,
            title,
            content: String::new(),
            color: String::new(),
            attachments: Vec::new(),
            archived: false,
            trashed: false,
            pending_delete: false,
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Most recent transaction, if any.
    pub fn latest_transaction(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Status of the note as implied by its history.
    ///
    /// Without a current hash the latest content is not anchored yet, so the
    /// note is pending. Records that carry a hash but no matching history
    /// entry keep whatever status was stored with them.
    pub fn derive_status(&self) -> TxStatus {
        match &self.tx_hash {
            None => TxStatus::Pending,
            Some(hash) => self
                .transactions
                .iter()
                .find(|tx| &tx.hash == hash)
                .map(|tx| tx.status)
                .unwrap_or(self.status),
        }
    }

    pub(crate) fn refresh_status(&mut self) {
        self.status = self.derive_status();
    }

    /// Short form of the id for terminal output.
    pub fn short_id(&self) -> &str {
        &self.id[..7.min(self.id.len())]
    }
}
