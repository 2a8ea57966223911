use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{BlocknotesError, Result};

/// Application metadata label used when none is configured.
pub const DEFAULT_METADATA_LABEL: u64 = 42819;

/// Smallest payment attached to a note transaction (1 ADA).
pub const DEFAULT_MIN_PAYMENT: u64 = 1_000_000;

pub const DEFAULT_RECEIVER_ADDRESS: &str = "addr_test1qrazn8m6hg22tj46uxv8428pn08emqsp5x6r4hfrmwwj79dqx72yxnsx5u4a428mqkn54gr0aevsa4dpusslr22vppfqrjp6p4";

/// Value shipped in sample `.env` files; treated the same as an empty id.
pub const PLACEHOLDER_PROJECT_ID: &str = "YOUR_BLOCKFROST_PROJECT_ID_HERE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Preview,
    Preprod,
    Testnet,
}

impl Network {
    /// CIP-30 network id reported by wallets on this network.
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Preview | Network::Preprod | Network::Testnet => 0,
        }
    }

    pub fn default_blockfrost_url(&self) -> String {
        format!("https://cardano-{}.blockfrost.io/api/v0", self)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Preview => write!(f, "preview"),
            Network::Preprod => write!(f, "preprod"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "preview" => Ok(Network::Preview),
            "preprod" => Ok(Network::Preprod),
            "testnet" => Ok(Network::Testnet),
            _ => Err(format!("Invalid network: {}", s)),
        }
    }
}

/// Externally supplied settings for the chain side of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: Network,
    pub blockfrost_url: String,
    pub blockfrost_project_id: String,
    pub receiver_address: String,
    pub metadata_label: u64,
    pub min_payment: u64,
    /// Return submission errors instead of substituting a placeholder hash.
    pub strict_submit: bool,
}

impl Default for Config {
    fn default() -> Self {
        let network = Network::default();
        Self {
            network,
            blockfrost_url: network.default_blockfrost_url(),
            blockfrost_project_id: String::new(),
            receiver_address: DEFAULT_RECEIVER_ADDRESS.to_string(),
            metadata_label: DEFAULT_METADATA_LABEL,
            min_payment: DEFAULT_MIN_PAYMENT,
            strict_submit: false,
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if any).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(network) = get("CARDANO_NETWORK") {
            config.network = network.parse().map_err(BlocknotesError::Config)?;
        }
        config.blockfrost_url = get("BLOCKFROST_API_URL")
            .unwrap_or_else(|| config.network.default_blockfrost_url())
            .trim_end_matches('/')
            .to_string();

        if let Some(project_id) = get("BLOCKFROST_PROJECT_ID") {
            config.blockfrost_project_id = project_id;
        }
        if let Some(receiver) = get("RECEIVER_ADDRESS") {
            config.receiver_address = receiver;
        }
        if let Some(label) = get("METADATA_LABEL") {
            config.metadata_label = label.trim().parse().map_err(|_| {
                BlocknotesError::Config(format!("METADATA_LABEL must be an integer: {}", label))
            })?;
        }
        if let Some(amount) = get("BLOCKNOTES_MIN_PAYMENT") {
            config.min_payment = amount.trim().parse().map_err(|_| {
                BlocknotesError::Config(format!(
                    "BLOCKNOTES_MIN_PAYMENT must be a lovelace amount: {}",
                    amount
                ))
            })?;
        }
        if let Some(strict) = get("BLOCKNOTES_STRICT_SUBMIT") {
            config.strict_submit = parse_bool(&strict).ok_or_else(|| {
                BlocknotesError::Config(format!("BLOCKNOTES_STRICT_SUBMIT must be a boolean: {}", strict))
            })?;
        }

        Ok(config)
    }

    /// Whether a real Blockfrost project id has been supplied.
    pub fn has_indexer_credentials(&self) -> bool {
        let id = self.blockfrost_project_id.trim();
        !id.is_empty() && id != PLACEHOLDER_PROJECT_ID
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
