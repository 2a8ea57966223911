// src/entity/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Confirmed => write!(f, "confirmed"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// Lifecycle event a transaction anchors on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxAction {
    Create,
    Update,
    Delete,
    Restore,
}

impl TxAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxAction::Create => "create",
            TxAction::Update => "update",
            TxAction::Delete => "delete",
            TxAction::Restore => "restore",
        }
    }
}

impl std::fmt::Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TxAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(TxAction::Create),
            "update" => Ok(TxAction::Update),
            "delete" => Ok(TxAction::Delete),
            "restore" => Ok(TxAction::Restore),
            _ => Err(format!("Invalid transaction action: {}", s)),
        }
    }
}

/// One submission event in a note's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub action: TxAction,
    #[serde(default)]
    pub status: TxStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(hash: String, action: TxAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash,
            action,
            status: TxStatus::Pending,
            timestamp,
        }
    }
}
