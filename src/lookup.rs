//! Network Lookup Client
//!
//! Queries the remote transaction lookup service for per-network transfer
//! details. One probe asks one network about one hash; "not found" is a normal
//! answer, and a failed probe is recorded as data rather than raised, so a
//! broken network never aborts probes to the others.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::reconciler::hash::TxHash;
use crate::reconciler::types::{Network, NetworkProbeResult};

/// Lookup errors. Internal to the HTTP client; callers of [`NetworkLookup`]
/// only ever see them flattened into a probe result.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup service returned status {0}")]
    Status(u16),

    #[error("malformed lookup response: {0}")]
    Malformed(String),
}

/// Boundary to the remote per-network transaction lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkLookup: Send + Sync {
    /// Look up a transaction on one network.
    ///
    /// Never errors for "not found"; probe failures come back as
    /// `NetworkProbeResult { found: false, error: Some(..) }`.
    async fn probe(&self, network: Network, tx: &TxHash) -> NetworkProbeResult;
}

/// HTTP client for the lookup service
#[derive(Debug, Clone)]
pub struct HttpLookupClient {
    client: Client,
    base_url: String,
}

impl HttpLookupClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, network: Network, tx: &TxHash) -> Result<ScanTxInfo, LookupError> {
        let url = format!("{}/{}/tx/{}", self.base_url, network.slug(), tx);
        let resp = self.client.get(&url).send().await?;

        // The service answers 404 for a hash it has never seen on this chain
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(ScanTxInfo::absent());
        }

        if !resp.status().is_success() {
            return Err(LookupError::Status(resp.status().as_u16()));
        }

        let info: ScanTxInfo = resp.json().await?;
        Ok(info)
    }
}

#[async_trait]
impl NetworkLookup for HttpLookupClient {
    async fn probe(&self, network: Network, tx: &TxHash) -> NetworkProbeResult {
        match self.fetch(network, tx).await {
            Ok(info) => match info.into_probe_result(network) {
                Ok(result) => result,
                Err(e) => NetworkProbeResult::failed(network, e.to_string()),
            },
            Err(e) => NetworkProbeResult::failed(network, e.to_string()),
        }
    }
}

// =============================================================================
// Lookup Service Response Types
// =============================================================================

/// Transfer details as reported by the lookup service
#[derive(Debug, Deserialize)]
pub struct ScanTxInfo {
    pub found: bool,
    pub to: Option<String>,
    pub from: Option<String>,
    /// Amount normalized to the quote unit by the service
    pub amount: Option<Decimal>,
    pub block_height: Option<u64>,
    #[serde(default)]
    pub confirmed: bool,
}

impl ScanTxInfo {
    fn absent() -> Self {
        Self {
            found: false,
            to: None,
            from: None,
            amount: None,
            block_height: None,
            confirmed: false,
        }
    }

    /// Convert into a probe result, rejecting found-but-incomplete payloads.
    fn into_probe_result(self, network: Network) -> Result<NetworkProbeResult, LookupError> {
        if !self.found {
            return Ok(NetworkProbeResult::not_found(network));
        }

        let recipient = self
            .to
            .ok_or_else(|| LookupError::Malformed("found transfer without recipient".into()))?;
        let sender = self
            .from
            .ok_or_else(|| LookupError::Malformed("found transfer without sender".into()))?;
        let amount = self
            .amount
            .ok_or_else(|| LookupError::Malformed("found transfer without amount".into()))?;

        Ok(NetworkProbeResult::found(
            network,
            recipient,
            sender,
            amount,
            self.block_height,
            self.confirmed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_maps_to_not_found() {
        let result = ScanTxInfo::absent()
            .into_probe_result(Network::Bsc)
            .unwrap();
        assert!(!result.found);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_found_requires_complete_payload() {
        let info = ScanTxInfo {
            found: true,
            to: Some("0xabc".to_string()),
            from: None,
            amount: Some(Decimal::from(50)),
            block_height: Some(100),
            confirmed: true,
        };
        assert!(matches!(
            info.into_probe_result(Network::Ethereum),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn test_found_payload_converts() {
        let info = ScanTxInfo {
            found: true,
            to: Some("0xabc".to_string()),
            from: Some("0xdef".to_string()),
            amount: Some(Decimal::from(50)),
            block_height: Some(12_345),
            confirmed: false,
        };
        let result = info.into_probe_result(Network::Polygon).unwrap();
        assert!(result.found);
        assert_eq!(result.amount, Some(Decimal::from(50)));
        assert!(!result.confirmed);
    }
}
