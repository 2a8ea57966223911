use std::sync::Arc;

use tracing::{info, warn};

use super::{placeholder_hash, ChainError, PaymentRequest, TxBuilder, TxSubmitter};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::entity::TxAction;
use crate::metadata;
use crate::wallet::{validate_address, Wallet};

/// One note event to anchor on chain.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub action: TxAction,
    pub note_id: String,
    pub title: String,
    pub content: String,
    pub receiver: String,
    pub min_payment: u64,
}

/// Builds, signs and submits note transactions.
///
/// Unless `strict` is set, any failure along the way yields a placeholder
/// hash instead of an error so that local status tracking keeps working
/// without a configured chain backend. Nothing is retried here.
pub struct ChainSubmitter {
    builder: Option<Arc<dyn TxBuilder>>,
    wallet: Option<Wallet>,
    network: Option<Arc<dyn TxSubmitter>>,
    metadata_label: u64,
    strict: bool,
    clock: Arc<dyn Clock>,
}

impl ChainSubmitter {
    pub fn new(config: &Config) -> Self {
        Self {
            builder: None,
            wallet: None,
            network: None,
            metadata_label: config.metadata_label,
            strict: config.strict_submit,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_builder(mut self, builder: Arc<dyn TxBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn with_wallet(mut self, wallet: Wallet) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Submit through `network` instead of the wallet's own `submit_tx`.
    pub fn with_network(mut self, network: Arc<dyn TxSubmitter>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_wallet(&mut self, wallet: Option<Wallet>) {
        self.wallet = wallet;
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Anchor `request` on chain and return the transaction hash.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<String, ChainError> {
        match self.try_submit(request).await {
            Ok(hash) => {
                info!(
                    "Submitted {} transaction for note {}: {}",
                    request.action, request.note_id, hash
                );
                Ok(hash)
            }
            Err(e) if self.strict => {
                warn!(
                    "Submitting {} for note {} failed: {}",
                    request.action, request.note_id, e
                );
                Err(e)
            }
            Err(e) => {
                let hash = placeholder_hash(self.clock.now());
                warn!(
                    "Submitting {} for note {} failed ({}), tracking locally as {}",
                    request.action, request.note_id, e, hash
                );
                Ok(hash)
            }
        }
    }

    async fn try_submit(&self, request: &SubmitRequest) -> Result<String, ChainError> {
        let builder = self.builder.as_ref().ok_or(ChainError::NoBuilder)?;
        let wallet = self.wallet.as_ref().ok_or(ChainError::NoWallet)?;
        validate_address(&request.receiver)
            .map_err(|_| ChainError::InvalidAddress(request.receiver.clone()))?;

        let change_address = wallet
            .address()
            .await
            .map_err(|e| ChainError::Wallet(e.to_string()))?;

        let payment = PaymentRequest {
            receiver: request.receiver.clone(),
            change_address,
            lovelace: request.min_payment,
            metadata_label: self.metadata_label,
            metadata: metadata::encode(
                self.metadata_label,
                request.action,
                &request.note_id,
                &request.title,
                &request.content,
                self.clock.now(),
            ),
        };

        let unsigned = builder.build(&payment).await?;
        let witness_set = wallet
            .api()
            .sign_tx(&unsigned.cbor_hex, false)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let signed = builder.assemble(&unsigned, &witness_set)?;

        match &self.network {
            Some(network) => network.submit_tx(&signed).await,
            None => wallet.submit_tx(&signed).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{is_placeholder, SignedTx, UnsignedTx};
    use crate::wallet::tests::MockWallet;
    use crate::wallet::{hex_to_bech32, WalletApiError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBuilder {
        requests: Mutex<Vec<PaymentRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl TxBuilder for RecordingBuilder {
        async fn build(&self, request: &PaymentRequest) -> Result<UnsignedTx, ChainError> {
            if self.fail {
                return Err(ChainError::Build("insufficient funds".to_string()));
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(UnsignedTx {
                cbor_hex: "84a0".to_string(),
            })
        }

        fn assemble(&self, tx: &UnsignedTx, witness_set_hex: &str) -> Result<SignedTx, ChainError> {
            Ok(SignedTx {
                cbor_hex: format!("{}{}", tx.cbor_hex, witness_set_hex),
            })
        }
    }

    struct FixedNetwork(String);

    #[async_trait]
    impl TxSubmitter for FixedNetwork {
        async fn submit_tx(&self, _tx: &SignedTx) -> Result<String, ChainError> {
            Ok(self.0.clone())
        }
    }

    fn address(header: u8) -> String {
        let mut bytes = vec![header];
        bytes.extend(std::iter::repeat(0x5a).take(56));
        hex_to_bech32(&hex::encode(bytes)).unwrap()
    }

    fn wallet() -> Wallet {
        let mut owner = vec![0x00u8];
        owner.extend(std::iter::repeat(0x33).take(56));
        Wallet::from_api(
            "lace",
            Arc::new(MockWallet {
                used: vec![hex::encode(owner)],
                ..Default::default()
            }),
        )
    }

    fn request(content: &str) -> SubmitRequest {
        SubmitRequest {
            action: TxAction::Create,
            note_id: "note-1".to_string(),
            title: "Hi".to_string(),
            content: content.to_string(),
            receiver: address(0x00),
            min_payment: 1_000_000,
        }
    }

    #[tokio::test]
    async fn test_submit_builds_payment_with_metadata() {
        let builder = Arc::new(RecordingBuilder::default());
        let submitter = ChainSubmitter::new(&Config::default())
            .with_builder(builder.clone())
            .with_wallet(wallet())
            .with_network(Arc::new(FixedNetwork("cafe".to_string())));

        let hash = submitter.submit(&request(&"x".repeat(100))).await.unwrap();
        assert_eq!(hash, "cafe");

        let requests = builder.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let payment = &requests[0];
        assert_eq!(payment.lovelace, 1_000_000);
        assert_eq!(payment.metadata_label, 42819);
        assert!(payment.change_address.starts_with("addr_test1"));
        let body = &payment.metadata["42819"];
        assert_eq!(body["action"], "create");
        assert_eq!(body["note_id"], "note-1");
        assert_eq!(body["title"], "Hi");
        assert_eq!(body["note"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_through_wallet_when_no_network() {
        let submitter = ChainSubmitter::new(&Config::default())
            .with_builder(Arc::new(RecordingBuilder::default()))
            .with_wallet(wallet());

        let hash = submitter.submit(&request("c")).await.unwrap();
        assert_eq!(hash, "ff".repeat(32));
    }

    #[tokio::test]
    async fn test_missing_capabilities_fall_back() {
        let submitter = ChainSubmitter::new(&Config::default());
        let hash = submitter.submit(&request("c")).await.unwrap();
        assert!(is_placeholder(&hash));
    }

    #[tokio::test]
    async fn test_malformed_receiver_falls_back() {
        let submitter = ChainSubmitter::new(&Config::default())
            .with_builder(Arc::new(RecordingBuilder::default()))
            .with_wallet(wallet());
        let mut req = request("c");
        req.receiver = "not-an-address".to_string();

        assert!(is_placeholder(&submitter.submit(&req).await.unwrap()));
    }

    #[tokio::test]
    async fn test_strict_mode_surfaces_errors() {
        let config = Config {
            strict_submit: true,
            ..Config::default()
        };

        let submitter = ChainSubmitter::new(&config);
        assert!(submitter.is_strict());
        assert_eq!(
            submitter.submit(&request("c")).await,
            Err(ChainError::NoBuilder)
        );

        let failing = ChainSubmitter::new(&config)
            .with_builder(Arc::new(RecordingBuilder {
                fail: true,
                ..Default::default()
            }))
            .with_wallet(wallet());
        assert!(matches!(
            failing.submit(&request("c")).await,
            Err(ChainError::Build(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_signature_strict() {
        let config = Config {
            strict_submit: true,
            ..Config::default()
        };
        let mut owner = vec![0x00u8];
        owner.extend(std::iter::repeat(0x33).take(56));
        let rejecting = Wallet::from_api(
            "lace",
            Arc::new(MockWallet {
                used: vec![hex::encode(owner)],
                sign_error: Some(WalletApiError::new(Some(2), "user declined to sign")),
                ..Default::default()
            }),
        );

        let submitter = ChainSubmitter::new(&config)
            .with_builder(Arc::new(RecordingBuilder::default()))
            .with_wallet(rejecting);
        assert!(matches!(
            submitter.submit(&request("c")).await,
            Err(ChainError::Signing(_))
        ));
    }
}
