//! Consumed wallet capability (CIP-30 shaped).
//!
//! The engine never implements a wallet. Hosts provide a [`WalletProvider`]
//! that can enable a named wallet and hand back a [`WalletApi`]; this module
//! turns connection problems into distinguishable [`WalletError`]s and reads
//! the owner's address and balance.

mod codec;

pub use codec::{decode_lovelace, format_ada, hex_to_bech32, network_name, validate_address};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Network;

/// Wallet extensions the application knows how to talk to.
pub const SUPPORTED_WALLETS: &[&str] = &[
    "lace",
    "nami",
    "eternl",
    "flint",
    "yoroi",
    "typhon",
    "gerowallet",
];

/// CIP-30 `APIError` code for a refused request.
const CIP30_REFUSED: i32 = -3;
/// Code some wallets report when the user closes the approval popup.
const POPUP_REJECTED: i32 = -2;

/// Raw error reported by a wallet call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WalletApiError {
    pub code: Option<i32>,
    pub message: String,
}

impl WalletApiError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn is_rejection(&self) -> bool {
        let message = self.message.to_lowercase();
        matches!(self.code, Some(CIP30_REFUSED) | Some(POPUP_REJECTED))
            || message.contains("reject")
            || message.contains("denied")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("{} wallet not found. {}", .wallet.to_uppercase(), install_hint(.available))]
    NotInstalled {
        wallet: String,
        available: Vec<String>,
    },

    #[error("Wallet connection was rejected. Please approve the connection in your wallet.")]
    Rejected,

    #[error(
        "Wrong network! Please switch your wallet to the {} network. Current network ID: {actual}, Expected: {expected_id}",
        .expected.to_string().to_uppercase()
    )]
    WrongNetwork {
        expected: Network,
        expected_id: u8,
        actual: u8,
    },

    #[error("No addresses found in wallet. Please ensure your wallet has been initialized.")]
    NoAddress,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid balance encoding: {0}")]
    InvalidBalance(String),

    #[error("Wallet request failed: {0}")]
    Api(String),
}

fn install_hint(available: &[String]) -> String {
    if available.is_empty() {
        "No Cardano wallets found. Please install the Lace wallet extension from https://www.lace.io/".to_string()
    } else {
        format!("Available wallets: {}.", available.join(", "))
    }
}

impl From<WalletApiError> for WalletError {
    fn from(e: WalletApiError) -> Self {
        if e.is_rejection() {
            WalletError::Rejected
        } else {
            WalletError::Api(e.message)
        }
    }
}

/// An enabled wallet session.
#[async_trait]
pub trait WalletApi: Send + Sync {
    async fn network_id(&self) -> Result<u8, WalletApiError>;
    /// CBOR-encoded `Value`, hex.
    async fn balance(&self) -> Result<String, WalletApiError>;
    /// Raw address bytes, hex.
    async fn used_addresses(&self) -> Result<Vec<String>, WalletApiError>;
    async fn unused_addresses(&self) -> Result<Vec<String>, WalletApiError>;
    async fn change_address(&self) -> Result<String, WalletApiError>;
    /// Sign a CBOR transaction, returning the witness set (hex).
    async fn sign_tx(&self, tx_cbor: &str, partial: bool) -> Result<String, WalletApiError>;
    async fn submit_tx(&self, tx_cbor: &str) -> Result<String, WalletApiError>;
}

/// The host's registry of wallet extensions.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Names of the wallets present in the host.
    fn installed(&self) -> Vec<String>;
    /// Ask the named wallet for access; may prompt the user.
    async fn enable(&self, name: &str) -> Result<Arc<dyn WalletApi>, WalletApiError>;
}

/// A connected wallet verified to be on the expected network.
#[derive(Clone)]
pub struct Wallet {
    name: String,
    api: Arc<dyn WalletApi>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("name", &self.name).finish()
    }
}

/// Supported wallets the provider reports as installed.
pub fn available_wallets(provider: &dyn WalletProvider) -> Vec<String> {
    let installed = provider.installed();
    SUPPORTED_WALLETS
        .iter()
        .filter(|name| installed.iter().any(|i| i == *name))
        .map(|name| name.to_string())
        .collect()
}

/// Enable `name` and check that it is on `network`.
pub async fn connect(
    provider: &dyn WalletProvider,
    name: &str,
    network: Network,
) -> Result<Wallet, WalletError> {
    if !provider.installed().iter().any(|n| n == name) {
        return Err(WalletError::NotInstalled {
            wallet: name.to_string(),
            available: available_wallets(provider),
        });
    }

    info!("Requesting connection to {} wallet", name);
    let api = provider.enable(name).await?;

    let actual = api.network_id().await?;
    let expected_id = network.network_id();
    debug!(
        "Wallet {} on network {} (expected {} for {})",
        name, actual, expected_id, network
    );
    if actual != expected_id {
        warn!("Wallet {} is on the wrong network", name);
        return Err(WalletError::WrongNetwork {
            expected: network,
            expected_id,
            actual,
        });
    }

    Ok(Wallet {
        name: name.to_string(),
        api,
    })
}

impl Wallet {
    pub fn from_api(name: impl Into<String>, api: Arc<dyn WalletApi>) -> Self {
        Self {
            name: name.into(),
            api,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api(&self) -> &Arc<dyn WalletApi> {
        &self.api
    }

    pub async fn network_id(&self) -> Result<u8, WalletError> {
        Ok(self.api.network_id().await?)
    }

    /// Owner address: first used address, else first unused, else change.
    pub async fn address(&self) -> Result<String, WalletError> {
        let used = self.api.used_addresses().await?;
        if let Some(first) = used.first() {
            return hex_to_bech32(first);
        }

        let unused = self.api.unused_addresses().await?;
        if let Some(first) = unused.first() {
            return hex_to_bech32(first);
        }

        let change = self.api.change_address().await?;
        if !change.trim().is_empty() {
            return hex_to_bech32(&change);
        }

        Err(WalletError::NoAddress)
    }

    pub async fn balance_lovelace(&self) -> Result<u64, WalletError> {
        let cbor = self.api.balance().await?;
        decode_lovelace(&cbor)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Scriptable wallet used across the crate's tests.
    pub(crate) struct MockWallet {
        pub network: u8,
        pub used: Vec<String>,
        pub unused: Vec<String>,
        pub change: String,
        pub balance: String,
        pub sign_error: Option<WalletApiError>,
    }

    impl Default for MockWallet {
        fn default() -> Self {
            Self {
                network: 0,
                used: vec![],
                unused: vec![],
                change: String::new(),
                balance: "1a05f5e100".to_string(),
                sign_error: None,
            }
        }
    }

    #[async_trait]
    impl WalletApi for MockWallet {
        async fn network_id(&self) -> Result<u8, WalletApiError> {
            Ok(self.network)
        }
        async fn balance(&self) -> Result<String, WalletApiError> {
            Ok(self.balance.clone())
        }
        async fn used_addresses(&self) -> Result<Vec<String>, WalletApiError> {
            Ok(self.used.clone())
        }
        async fn unused_addresses(&self) -> Result<Vec<String>, WalletApiError> {
            Ok(self.unused.clone())
        }
        async fn change_address(&self) -> Result<String, WalletApiError> {
            Ok(self.change.clone())
        }
        async fn sign_tx(&self, _tx_cbor: &str, _partial: bool) -> Result<String, WalletApiError> {
            match &self.sign_error {
                Some(e) => Err(e.clone()),
                None => Ok("a0".to_string()),
            }
        }
        async fn submit_tx(&self, _tx_cbor: &str) -> Result<String, WalletApiError> {
            Ok("ff".repeat(32))
        }
    }

    pub(crate) struct MockProvider {
        pub installed: Vec<String>,
        pub network: u8,
        pub enable_error: Option<WalletApiError>,
    }

    #[async_trait]
    impl WalletProvider for MockProvider {
        fn installed(&self) -> Vec<String> {
            self.installed.clone()
        }

        async fn enable(&self, _name: &str) -> Result<Arc<dyn WalletApi>, WalletApiError> {
            if let Some(e) = &self.enable_error {
                return Err(e.clone());
            }
            Ok(Arc::new(MockWallet {
                network: self.network,
                ..Default::default()
            }))
        }
    }

    pub(crate) fn provider(installed: &[&str]) -> MockProvider {
        MockProvider {
            installed: installed.iter().map(|s| s.to_string()).collect(),
            network: 0,
            enable_error: None,
        }
    }

    pub(crate) fn testnet_address_hex() -> String {
        let mut bytes = vec![0x00u8];
        bytes.extend(std::iter::repeat(0x11).take(56));
        hex::encode(bytes)
    }

    #[tokio::test]
    async fn test_connect_not_installed_lists_alternatives() {
        let p = provider(&["nami", "somethingelse"]);
        let err = connect(&p, "lace", Network::Preview).await.unwrap_err();
        assert_eq!(
            err,
            WalletError::NotInstalled {
                wallet: "lace".to_string(),
                available: vec!["nami".to_string()],
            }
        );
        assert!(err.to_string().contains("Available wallets: nami"));

        let none = provider(&[]);
        let err = connect(&none, "lace", Network::Preview).await.unwrap_err();
        assert!(err.to_string().contains("No Cardano wallets found"));
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let mut p = provider(&["lace"]);
        p.enable_error = Some(WalletApiError::new(Some(-3), "user declined"));
        assert_eq!(
            connect(&p, "lace", Network::Preview).await.unwrap_err(),
            WalletError::Rejected
        );

        p.enable_error = Some(WalletApiError::new(None, "Request denied by user"));
        assert_eq!(
            connect(&p, "lace", Network::Preview).await.unwrap_err(),
            WalletError::Rejected
        );

        p.enable_error = Some(WalletApiError::new(Some(-1), "internal"));
        assert_eq!(
            connect(&p, "lace", Network::Preview).await.unwrap_err(),
            WalletError::Api("internal".to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_wrong_network() {
        let p = provider(&["lace"]);
        let err = connect(&p, "lace", Network::Mainnet).await.unwrap_err();
        assert_eq!(
            err,
            WalletError::WrongNetwork {
                expected: Network::Mainnet,
                expected_id: 1,
                actual: 0,
            }
        );
        assert!(err.to_string().contains("MAINNET"));
    }

    #[tokio::test]
    async fn test_connect_ok() {
        let p = provider(&["lace"]);
        let wallet = connect(&p, "lace", Network::Preprod).await.unwrap();
        assert_eq!(wallet.name(), "lace");
        assert_eq!(wallet.balance_lovelace().await.unwrap(), 100_000_000);
    }

    #[tokio::test]
    async fn test_address_fallback_order() {
        let addr = testnet_address_hex();

        let used = Wallet::from_api(
            "lace",
            Arc::new(MockWallet {
                used: vec![addr.clone()],
                ..Default::default()
            }),
        );
        assert!(used.address().await.unwrap().starts_with("addr_test1"));

        let change_only = Wallet::from_api(
            "lace",
            Arc::new(MockWallet {
                change: addr.clone(),
                ..Default::default()
            }),
        );
        assert_eq!(
            change_only.address().await.unwrap(),
            used.address().await.unwrap()
        );

        let empty = Wallet::from_api("lace", Arc::new(MockWallet::default()));
        assert_eq!(empty.address().await.unwrap_err(), WalletError::NoAddress);
    }
}
