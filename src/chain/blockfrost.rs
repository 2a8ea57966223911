use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use super::{ChainError, ChainIndexer, SignedTx, TxSubmitter};
use crate::config::Config;
use crate::entity::TxStatus;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Map a Blockfrost `GET /txs/{hash}` response code onto a note status.
///
/// 404 means "not indexed yet" and 429 asks to come back later. Every other
/// answer, server errors and a 403 for a bad project id included, fails the
/// transaction.
pub fn status_for_http(code: u16) -> TxStatus {
    match code {
        200..=299 => TxStatus::Confirmed,
        404 | 429 => TxStatus::Pending,
        _ => TxStatus::Failed,
    }
}

/// Blockfrost-style indexer and submission endpoint.
#[derive(Debug, Clone)]
pub struct BlockfrostClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    configured: bool,
}

impl BlockfrostClient {
    pub fn new(config: &Config) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("blocknotes/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.blockfrost_url.trim_end_matches('/').to_string(),
            project_id: config.blockfrost_project_id.clone(),
            configured: config.has_indexer_credentials(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

#[async_trait]
impl ChainIndexer for BlockfrostClient {
    async fn tx_status(&self, hash: &str) -> Result<TxStatus, ChainError> {
        if !self.configured {
            warn!("Blockfrost project id not configured, leaving {} pending", hash);
            return Ok(TxStatus::Pending);
        }

        let response = self
            .client
            .get(format!("{}/txs/{}", self.base_url, hash))
            .header("project_id", &self.project_id)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let code = response.status().as_u16();
        let status = status_for_http(code);
        match code {
            429 => debug!("Blockfrost rate limited lookup of {}", hash),
            403 => warn!("Blockfrost rejected the project id while looking up {}", hash),
            _ if status == TxStatus::Failed => warn!("Blockfrost returned {} for {}", code, hash),
            _ => {}
        }
        Ok(status)
    }
}

#[async_trait]
impl TxSubmitter for BlockfrostClient {
    async fn submit_tx(&self, tx: &SignedTx) -> Result<String, ChainError> {
        let body = hex::decode(&tx.cbor_hex).map_err(|e| ChainError::Build(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/tx/submit", self.base_url))
            .header("project_id", &self.project_id)
            .header(CONTENT_TYPE, "application/cbor")
            .body(body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::Submit(format!("{}: {}", status, text)));
        }

        response
            .json::<String>()
            .await
            .map_err(|e| ChainError::Submit(e.to_string()))
    }
}
