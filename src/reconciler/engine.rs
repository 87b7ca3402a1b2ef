//! Reconciliation Engine
//!
//! Fans one validated transaction hash out to every supported network as
//! independent concurrent probes, joins them, and aggregates a single verdict.
//! Partial failure of one network is data, not control flow: a timed-out or
//! erroring probe becomes a not-found result carrying its reason, and the
//! remaining networks still count.
//!
//! Aggregation is deterministic. When more than one network claims the hash
//! (possible in principle across unrelated chains), confirmed beats pending,
//! and the canonical network order breaks remaining ties.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::lookup::NetworkLookup;

use super::hash::{InvalidTxHash, TxHash};
use super::registry::KnownAddressRegistry;
use super::types::{Network, NetworkProbeResult, ReconciliationVerdict};

/// Engine errors. Only local validation fails; everything downstream of a
/// valid hash resolves to a verdict, never an error.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidTxHash),
}

/// Cross-network reconciliation engine.
///
/// Stateless between calls: reconciling the same hash twice against unchanged
/// chain state yields the same verdict.
pub struct ReconciliationEngine {
    lookup: Arc<dyn NetworkLookup>,
    registry: KnownAddressRegistry,
    probe_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        lookup: Arc<dyn NetworkLookup>,
        registry: KnownAddressRegistry,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            lookup,
            registry,
            probe_timeout,
        }
    }

    /// Validate raw user input, then reconcile.
    ///
    /// Fails fast with `InvalidIdentifier` before any network is queried.
    pub async fn reconcile_input(
        &self,
        raw: &str,
        networks: &[Network],
    ) -> Result<ReconciliationVerdict, ReconcileError> {
        let tx = TxHash::parse(raw)?;
        Ok(self.reconcile(&tx, networks).await)
    }

    /// Probe all supplied networks concurrently and aggregate one verdict.
    pub async fn reconcile(&self, tx: &TxHash, networks: &[Network]) -> ReconciliationVerdict {
        let probes = networks.iter().map(|&network| self.bounded_probe(network, tx));
        let results = join_all(probes).await;

        self.aggregate(tx.clone(), results)
    }

    /// One probe with a bounded wait; a probe that does not resolve in time
    /// is recorded as a timeout failure, never an indefinite hang.
    async fn bounded_probe(&self, network: Network, tx: &TxHash) -> NetworkProbeResult {
        match timeout(self.probe_timeout, self.lookup.probe(network, tx)).await {
            Ok(result) => result,
            Err(_) => NetworkProbeResult::failed(
                network,
                format!("timeout after {}ms", self.probe_timeout.as_millis()),
            ),
        }
    }

    fn aggregate(
        &self,
        tx: TxHash,
        mut results: Vec<NetworkProbeResult>,
    ) -> ReconciliationVerdict {
        let probe_errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.network, e)))
            .collect();

        // Winner selection: confirmed over pending, then canonical order.
        // join_all preserves input order but the sort must not rely on it.
        results.retain(|r| r.found);
        results.sort_by_key(|r| (!r.confirmed, r.network.canonical_index()));

        if results.is_empty() {
            debug!(
                target: "stakevault::reconcile",
                tx = %tx.short(),
                probe_errors = probe_errors.len(),
                "no network found the transaction"
            );
            return ReconciliationVerdict::not_found(tx, probe_errors);
        }

        let ambiguous = results.len() > 1;
        if ambiguous {
            let claimed: Vec<String> = results.iter().map(|r| r.network.to_string()).collect();
            warn!(
                target: "stakevault::reconcile",
                tx = %tx.short(),
                networks = ?claimed,
                "ambiguous match across networks, tie-break engaged"
            );
        }

        let winner = &results[0];
        let recipient = winner.recipient.clone();
        let is_recipient_matching = recipient
            .as_deref()
            .map(|addr| self.registry.matches(winner.network, addr))
            .unwrap_or(false);

        ReconciliationVerdict {
            tx_hash: tx,
            found: true,
            matched_network: Some(winner.network),
            suggested_network: Some(winner.network),
            suggested_amount: winner.amount,
            recipient,
            sender: winner.sender.clone(),
            is_recipient_matching,
            block_height: winner.block_height,
            confirmed: winner.confirmed,
            ambiguous,
            probe_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MockNetworkLookup;
    use rust_decimal::Decimal;

    const PLATFORM_BSC: &str = "0xPlatformBsc";
    const PLATFORM_ETH: &str = "0xPlatformEth";
    const PLATFORM_POLYGON: &str = "0xPlatformPolygon";
    const PLATFORM_TRON: &str = "TPlatformTron";

    fn registry() -> KnownAddressRegistry {
        let mut r = KnownAddressRegistry::new();
        r.set(Network::Bsc, PLATFORM_BSC);
        r.set(Network::Ethereum, PLATFORM_ETH);
        r.set(Network::Polygon, PLATFORM_POLYGON);
        r.set(Network::Tron, PLATFORM_TRON);
        r
    }

    fn engine(lookup: MockNetworkLookup) -> ReconciliationEngine {
        ReconciliationEngine::new(Arc::new(lookup), registry(), Duration::from_millis(200))
    }

    fn tx() -> TxHash {
        TxHash::parse(&"a1b2".repeat(16)).unwrap()
    }

    fn found_on(network: Network, recipient: &str, confirmed: bool) -> NetworkProbeResult {
        NetworkProbeResult::found(
            network,
            recipient.to_string(),
            "0xSender".to_string(),
            Decimal::from(50),
            Some(1_000),
            confirmed,
        )
    }

    /// A lookup whose answers are a pure function of the network
    fn scripted(
        script: impl Fn(Network) -> NetworkProbeResult + Send + Sync + 'static,
    ) -> MockNetworkLookup {
        let mut lookup = MockNetworkLookup::new();
        lookup
            .expect_probe()
            .returning(move |network, _| script(network));
        lookup
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_network() {
        let mut lookup = MockNetworkLookup::new();
        lookup.expect_probe().times(0);

        let engine = engine(lookup);
        let result = engine.reconcile_input("not-a-hash", &Network::ALL).await;
        assert!(matches!(result, Err(ReconcileError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn test_all_not_found_is_a_normal_outcome() {
        let lookup = scripted(NetworkProbeResult::not_found);

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        assert!(!verdict.found);
        assert!(verdict.matched_network.is_none());
        assert!(verdict.probe_errors.is_empty());
    }

    #[tokio::test]
    async fn test_single_match_with_platform_recipient() {
        let lookup = scripted(|network| match network {
            Network::Bsc => found_on(Network::Bsc, PLATFORM_BSC, true),
            n => NetworkProbeResult::not_found(n),
        });

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        assert!(verdict.found);
        assert_eq!(verdict.matched_network, Some(Network::Bsc));
        assert_eq!(verdict.suggested_network, Some(Network::Bsc));
        assert_eq!(verdict.suggested_amount, Some(Decimal::from(50)));
        assert!(verdict.is_recipient_matching);
        assert!(!verdict.ambiguous);
    }

    #[tokio::test]
    async fn test_recipient_match_ignores_case_and_whitespace() {
        let lookup = scripted(|network| match network {
            Network::Bsc => found_on(Network::Bsc, " 0XPLATFORMBSC ", true),
            n => NetworkProbeResult::not_found(n),
        });

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        assert!(verdict.is_recipient_matching);
    }

    #[tokio::test]
    async fn test_found_but_not_ours() {
        let lookup = scripted(|network| match network {
            Network::Ethereum => found_on(Network::Ethereum, "0xSomeoneElse", true),
            n => NetworkProbeResult::not_found(n),
        });

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        // Found and not-ours are distinct facts
        assert!(verdict.found);
        assert!(!verdict.is_recipient_matching);
        assert_eq!(verdict.recipient.as_deref(), Some("0xSomeoneElse"));
    }

    #[tokio::test]
    async fn test_one_failed_probe_does_not_abort_the_rest() {
        let lookup = scripted(|network| match network {
            Network::Bsc => NetworkProbeResult::failed(Network::Bsc, "service error"),
            Network::Polygon => found_on(Network::Polygon, PLATFORM_POLYGON, true),
            n => NetworkProbeResult::not_found(n),
        });

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        assert!(verdict.found);
        assert_eq!(verdict.matched_network, Some(Network::Polygon));
        assert_eq!(verdict.probe_errors.len(), 1);
        assert!(verdict.probe_errors[0].starts_with("bsc:"));
    }

    #[tokio::test]
    async fn test_tie_break_prefers_confirmed() {
        // BSC is earlier in canonical order but only pending
        let lookup = scripted(|network| match network {
            Network::Bsc => found_on(Network::Bsc, PLATFORM_BSC, false),
            Network::Ethereum => found_on(Network::Ethereum, PLATFORM_ETH, true),
            n => NetworkProbeResult::not_found(n),
        });

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        assert_eq!(verdict.matched_network, Some(Network::Ethereum));
        assert!(verdict.confirmed);
    }

    #[tokio::test]
    async fn test_tie_break_falls_back_to_canonical_order() {
        let lookup = scripted(|network| match network {
            Network::Bsc => found_on(Network::Bsc, PLATFORM_BSC, true),
            Network::Ethereum => found_on(Network::Ethereum, PLATFORM_ETH, true),
            n => NetworkProbeResult::not_found(n),
        });

        let verdict = engine(lookup).reconcile(&tx(), &Network::ALL).await;
        assert_eq!(verdict.matched_network, Some(Network::Bsc));
        assert!(verdict.ambiguous);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_against_stable_state() {
        let script = |network| match network {
            Network::Tron => found_on(Network::Tron, PLATFORM_TRON, true),
            n => NetworkProbeResult::not_found(n),
        };

        let engine = engine(scripted(script));
        let first = engine.reconcile(&tx(), &Network::ALL).await;
        let second = engine.reconcile(&tx(), &Network::ALL).await;

        assert_eq!(first.found, second.found);
        assert_eq!(first.matched_network, second.matched_network);
        assert_eq!(first.suggested_amount, second.suggested_amount);
        assert_eq!(first.is_recipient_matching, second.is_recipient_matching);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_without_hanging() {
        struct SlowLookup;

        #[async_trait::async_trait]
        impl NetworkLookup for SlowLookup {
            async fn probe(&self, network: Network, _tx: &TxHash) -> NetworkProbeResult {
                tokio::time::sleep(Duration::from_secs(30)).await;
                NetworkProbeResult::not_found(network)
            }
        }

        let engine = ReconciliationEngine::new(
            Arc::new(SlowLookup),
            registry(),
            Duration::from_millis(20),
        );

        let verdict = engine.reconcile(&tx(), &[Network::Bsc]).await;
        assert!(!verdict.found);
        assert_eq!(verdict.probe_errors.len(), 1);
        assert!(verdict.probe_errors[0].contains("timeout"));
    }
}
