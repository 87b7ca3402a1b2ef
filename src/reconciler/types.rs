//! Reconciler Types
//!
//! Types for cross-chain deposit reconciliation: supported networks, per-network
//! probe results, the aggregated verdict, intent lifecycle states, and API types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::hash::TxHash;

/// Supported blockchain networks.
///
/// Declaration order is the canonical probe and tie-break order. It is fixed
/// and never randomized so reconciliation stays reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Bsc,
    Ethereum,
    Polygon,
    Tron,
}

impl Network {
    /// All supported networks in canonical order
    pub const ALL: [Network; 4] = [
        Network::Bsc,
        Network::Ethereum,
        Network::Polygon,
        Network::Tron,
    ];

    /// Position in the canonical ordering
    pub fn canonical_index(&self) -> usize {
        Self::ALL.iter().position(|n| n == self).unwrap_or(usize::MAX)
    }

    /// Chain slug used in lookup service paths and config keys
    pub fn slug(&self) -> &'static str {
        match self {
            Network::Bsc => "bsc",
            Network::Ethereum => "ethereum",
            Network::Polygon => "polygon",
            Network::Tron => "tron",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bsc" | "bep20" => Ok(Network::Bsc),
            "ethereum" | "eth" | "erc20" => Ok(Network::Ethereum),
            "polygon" | "matic" => Ok(Network::Polygon),
            "tron" | "trc20" => Ok(Network::Tron),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Outcome of one lookup attempt against one network.
///
/// Created per probe, never mutated, discarded after aggregation. A probe
/// failure (timeout, transport error) is recorded here as data, not raised.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkProbeResult {
    pub network: Network,
    pub found: bool,
    /// Recipient address as reported by the chain
    pub recipient: Option<String>,
    /// Sender address as reported by the chain
    pub sender: Option<String>,
    /// Transferred amount normalized to the quote unit
    pub amount: Option<Decimal>,
    pub block_height: Option<u64>,
    pub confirmed: bool,
    /// Present only when found=false because the probe itself failed,
    /// never for a genuine absence
    pub error: Option<String>,
}

impl NetworkProbeResult {
    /// A matching transfer was found on this network
    pub fn found(
        network: Network,
        recipient: String,
        sender: String,
        amount: Decimal,
        block_height: Option<u64>,
        confirmed: bool,
    ) -> Self {
        Self {
            network,
            found: true,
            recipient: Some(recipient),
            sender: Some(sender),
            amount: Some(amount),
            block_height,
            confirmed,
            error: None,
        }
    }

    /// The network answered and the transaction is genuinely absent
    pub fn not_found(network: Network) -> Self {
        Self {
            network,
            found: false,
            recipient: None,
            sender: None,
            amount: None,
            block_height: None,
            confirmed: false,
            error: None,
        }
    }

    /// The probe itself failed (timeout, service error)
    pub fn failed(network: Network, reason: impl Into<String>) -> Self {
        Self {
            network,
            found: false,
            recipient: None,
            sender: None,
            amount: None,
            block_height: None,
            confirmed: false,
            error: Some(reason.into()),
        }
    }
}

/// Aggregated reconciliation outcome across all probed networks.
///
/// Invariant: `matched_network` is Some iff `found` is true. A recipient
/// mismatch does not clear `found` - "found" and "ours" are separate facts.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationVerdict {
    pub tx_hash: TxHash,
    pub found: bool,
    pub matched_network: Option<Network>,
    pub suggested_network: Option<Network>,
    pub suggested_amount: Option<Decimal>,
    pub recipient: Option<String>,
    pub sender: Option<String>,
    pub is_recipient_matching: bool,
    pub block_height: Option<u64>,
    pub confirmed: bool,
    /// True when more than one network claimed this hash and the
    /// deterministic tie-break had to engage
    pub ambiguous: bool,
    /// Per-network probe failures, for operator visibility
    pub probe_errors: Vec<String>,
}

impl ReconciliationVerdict {
    /// Verdict for a hash no network could find
    pub fn not_found(tx_hash: TxHash, probe_errors: Vec<String>) -> Self {
        Self {
            tx_hash,
            found: false,
            matched_network: None,
            suggested_network: None,
            suggested_amount: None,
            recipient: None,
            sender: None,
            is_recipient_matching: false,
            block_height: None,
            confirmed: false,
            ambiguous: false,
            probe_errors,
        }
    }
}

/// Lifecycle state of one reconciliation-to-ledger attempt for one hash.
///
/// `Idle` is implicit for any hash never seen. `LedgerWritten` is terminal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IntentState {
    Idle,
    Searching,
    Verified {
        verdict: ReconciliationVerdict,
    },
    Failed {
        reason: String,
    },
    LedgerWritten {
        deposit_id: String,
    },
}

impl IntentState {
    /// Short label for logging and stats
    pub fn label(&self) -> &'static str {
        match self {
            IntentState::Idle => "idle",
            IntentState::Searching => "searching",
            IntentState::Verified { .. } => "verified",
            IntentState::Failed { .. } => "failed",
            IntentState::LedgerWritten { .. } => "ledger_written",
        }
    }
}

/// Observable search status emitted to the UI layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchStatus {
    Searching,
    Verified { verdict: ReconciliationVerdict },
    NotFound,
    Error { reason: String },
    /// The hash is already credited in the ledger; re-entry is a no-op
    /// success carrying the existing deposit reference
    AlreadyProcessed { deposit_id: String },
}

impl SearchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SearchStatus::Searching => "searching",
            SearchStatus::Verified { .. } => "verified",
            SearchStatus::NotFound => "not_found",
            SearchStatus::Error { .. } => "error",
            SearchStatus::AlreadyProcessed { .. } => "already_processed",
        }
    }
}

/// Status update published to WebSocket subscribers
#[derive(Debug, Clone, Serialize)]
pub struct SearchStatusUpdate {
    pub tx_hash: String,
    #[serde(flatten)]
    pub status: SearchStatus,
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Bounded wait per network probe, in milliseconds
    pub probe_timeout_ms: u64,
    /// Networks to probe, in canonical order
    pub networks: Vec<Network>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 8_000,
            networks: Network::ALL.to_vec(),
        }
    }
}

/// Reconciler statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReconcilerStats {
    pub attempts: u64,
    pub invalid_inputs: u64,
    pub found: u64,
    pub not_found: u64,
    pub probe_errors: u64,
    pub ambiguous_matches: u64,
    pub recipient_mismatches: u64,
    pub deposits_written: u64,
}

impl std::fmt::Display for ReconcilerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reconciliations: {} attempts | {} found | {} not found | {} probe errors | {} deposits written",
            self.attempts, self.found, self.not_found, self.probe_errors, self.deposits_written
        )
    }
}

// =============================================================================
// API Request/Response Types
// =============================================================================

/// POST /api/reconcile - Start reconciliation for a user-entered hash
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// Raw user input; validated and canonicalized server-side
    pub tx_hash: String,
}

/// POST /api/deposits - Confirm a verified deposit into the ledger
#[derive(Debug, Deserialize)]
pub struct ConfirmDepositRequest {
    pub tx_hash: String,
}

/// Response to POST /api/deposits
#[derive(Debug, Serialize)]
pub struct ConfirmDepositResponse {
    pub success: bool,
    pub deposit_id: Option<String>,
    pub message: Option<String>,
}
