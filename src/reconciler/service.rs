//! Deposit Reconciler Service
//!
//! Orchestrates the full input-to-ledger flow:
//!
//! 1. User submits a raw hash; validation is a pure gate before any
//!    asynchronous work is scheduled
//! 2. The intent tracker arbitrates concurrent attempts per hash
//! 3. The engine probes all networks and aggregates a verdict
//! 4. The verdict completes the intent and is emitted as an observable status
//! 5. A verified, recipient-matching verdict may be confirmed into the ledger
//!
//! Each input bumps a display generation; when a reconciliation finishes for
//! a hash the user has since replaced, its intent is still completed (that is
//! per-hash truth) but no status is emitted for it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::lookup::NetworkLookup;
use crate::vip::{compute_upgrade, default_tier_catalog, UpgradePath, VipTier};

use super::engine::ReconciliationEngine;
use super::hash::{InvalidTxHash, TxHash};
use super::intent::{Begin, Completion, DepositIntentTracker, IntentError, IntentOutcome};
use super::ledger::{DepositLedgerWriter, DepositRecord, LedgerError};
use super::registry::KnownAddressRegistry;
use super::types::{
    IntentState, ReconcilerConfig, ReconcilerStats, ReconciliationVerdict, SearchStatus,
};
use super::updates::StatusPublisher;

/// Confirmation errors
#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidTxHash),

    /// No verified verdict to confirm; carries the current state label
    #[error("deposit cannot be confirmed from state {0}")]
    NotVerified(&'static str),

    /// The transaction exists but pays a recipient that is not the platform's
    /// deposit address. A business state requiring operator decision, never a
    /// silent ledger write.
    #[error("recipient does not match the platform deposit address")]
    RecipientMismatch,

    /// Verdict missing network or amount; collaborator contract violation
    #[error("verified verdict is incomplete: {0}")]
    IncompleteVerdict(&'static str),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Outcome of a deposit confirmation
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// A new deposit row was written
    Created(DepositRecord),
    /// The hash was already credited; surfaced as "already processed"
    AlreadyProcessed { deposit_id: String },
}

/// Main reconciler service
pub struct DepositReconcilerService {
    config: ReconcilerConfig,
    engine: ReconciliationEngine,
    tracker: DepositIntentTracker,
    ledger: Arc<dyn DepositLedgerWriter>,
    tiers: Vec<VipTier>,
    publisher: Option<StatusPublisher>,
    stats: RwLock<ReconcilerStats>,
    /// Display generation; bumped on every accepted input
    input_generation: AtomicU64,
}

impl DepositReconcilerService {
    pub fn new(
        config: ReconcilerConfig,
        lookup: Arc<dyn NetworkLookup>,
        registry: KnownAddressRegistry,
        ledger: Arc<dyn DepositLedgerWriter>,
    ) -> Self {
        let engine = ReconciliationEngine::new(
            lookup,
            registry,
            Duration::from_millis(config.probe_timeout_ms),
        );

        Self {
            config,
            engine,
            tracker: DepositIntentTracker::new(),
            ledger,
            tiers: default_tier_catalog(),
            publisher: None,
            stats: RwLock::new(ReconcilerStats::default()),
            input_generation: AtomicU64::new(0),
        }
    }

    /// Set up the status publisher
    pub fn with_publisher(mut self, publisher: StatusPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replace the tier catalog
    pub fn with_tiers(mut self, tiers: Vec<VipTier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Handle a raw user input end to end.
    ///
    /// Returns the resulting status; the same status is published to
    /// subscribers unless the input was superseded while probes were in
    /// flight.
    pub async fn on_input(&self, raw: &str) -> SearchStatus {
        {
            let mut stats = self.stats.write().await;
            stats.attempts += 1;
        }

        // Pure validation gate; invalid input never schedules async work
        let tx = match TxHash::parse(raw) {
            Ok(tx) => tx,
            Err(e) => {
                let mut stats = self.stats.write().await;
                stats.invalid_inputs += 1;
                return SearchStatus::Error {
                    reason: e.to_string(),
                };
            }
        };

        let generation = self.input_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let token = match self.tracker.begin(&tx).await {
            Ok(Begin::Started(token)) => token,
            Ok(Begin::AlreadyWritten { deposit_id }) => {
                info!(
                    target: "stakevault::reconcile",
                    tx = %tx.short(),
                    deposit_id = %deposit_id,
                    "hash already credited, coalescing to existing deposit"
                );
                return SearchStatus::AlreadyProcessed { deposit_id };
            }
            // Concurrency guard: coalesce into the attempt already running
            Err(IntentError::AlreadyInProgress(_)) => return SearchStatus::Searching,
            Err(e) => {
                return SearchStatus::Error {
                    reason: e.to_string(),
                }
            }
        };

        self.emit(&tx, SearchStatus::Searching, generation).await;

        let verdict = self.engine.reconcile(&tx, &self.config.networks).await;
        let status = self.settle(&tx, &token, verdict).await;

        self.emit(&tx, status.clone(), generation).await;
        status
    }

    /// Complete the intent from a verdict and derive the observable status.
    async fn settle(
        &self,
        tx: &TxHash,
        token: &super::intent::IntentToken,
        verdict: ReconciliationVerdict,
    ) -> SearchStatus {
        let probed = self.config.networks.len();

        {
            let mut stats = self.stats.write().await;
            stats.probe_errors += verdict.probe_errors.len() as u64;
            if verdict.ambiguous {
                stats.ambiguous_matches += 1;
            }
        }

        let (outcome, status) = if verdict.found {
            let mut stats = self.stats.write().await;
            stats.found += 1;
            if !verdict.is_recipient_matching {
                stats.recipient_mismatches += 1;
            }
            drop(stats);

            info!(
                target: "stakevault::reconcile",
                tx = %tx.short(),
                network = %verdict.matched_network.map(|n| n.to_string()).unwrap_or_default(),
                recipient_matching = verdict.is_recipient_matching,
                "transaction located"
            );

            let status = SearchStatus::Verified {
                verdict: verdict.clone(),
            };
            (IntentOutcome::Verified(verdict), status)
        } else if !verdict.probe_errors.is_empty() && verdict.probe_errors.len() >= probed {
            // Every probe failed; nothing was actually checked
            let reason = verdict.probe_errors.join("; ");
            warn!(
                target: "stakevault::reconcile",
                tx = %tx.short(),
                "all network probes failed"
            );

            (
                IntentOutcome::Failed(reason.clone()),
                SearchStatus::Error { reason },
            )
        } else {
            let mut stats = self.stats.write().await;
            stats.not_found += 1;
            drop(stats);

            (
                IntentOutcome::Failed("transaction not found on any supported network".into()),
                SearchStatus::NotFound,
            )
        };

        match self.tracker.complete(token, outcome).await {
            Completion::Applied => status,
            Completion::Stale => {
                // Superseded attempt; report searching rather than a result
                // that no longer corresponds to the tracked intent
                SearchStatus::Searching
            }
        }
    }

    /// Publish a status unless the input generation has been superseded.
    async fn emit(&self, tx: &TxHash, status: SearchStatus, generation: u64) {
        if self.input_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(publisher) = &self.publisher {
            publisher.publish(tx.to_string(), status).await;
        }
    }

    /// Confirm a verified deposit into the ledger.
    ///
    /// Caller contract: only a verdict with a matching recipient may be
    /// confirmed; anything else is a typed rejection.
    pub async fn confirm_deposit(&self, raw: &str) -> Result<ConfirmOutcome, ConfirmError> {
        let tx = TxHash::parse(raw)?;

        match self.tracker.current(&tx).await {
            IntentState::LedgerWritten { deposit_id } => {
                Ok(ConfirmOutcome::AlreadyProcessed { deposit_id })
            }
            IntentState::Verified { verdict } => {
                if !verdict.is_recipient_matching {
                    return Err(ConfirmError::RecipientMismatch);
                }

                let network = verdict
                    .matched_network
                    .ok_or(ConfirmError::IncompleteVerdict("matched network"))?;
                let amount = verdict
                    .suggested_amount
                    .ok_or(ConfirmError::IncompleteVerdict("amount"))?;

                let write = self.ledger.create(&tx, network, amount).await?;
                let record = write.record().clone();

                // Advance the intent; idempotent if a concurrent confirm won
                if let Err(e) = self.tracker.mark_written(&tx, record.id.clone()).await {
                    warn!(
                        target: "stakevault::deposit",
                        tx = %tx.short(),
                        error = %e,
                        "ledger written but intent not advanced"
                    );
                }

                if write.is_duplicate() {
                    return Ok(ConfirmOutcome::AlreadyProcessed {
                        deposit_id: record.id,
                    });
                }

                let mut stats = self.stats.write().await;
                stats.deposits_written += 1;
                drop(stats);

                info!(
                    target: "stakevault::deposit",
                    tx = %tx.short(),
                    deposit_id = %record.id,
                    network = %network,
                    amount = %amount,
                    "deposit written to ledger"
                );

                Ok(ConfirmOutcome::Created(record))
            }
            other => Err(ConfirmError::NotVerified(other.label())),
        }
    }

    /// Current intent state for a raw hash
    pub async fn current_intent(&self, raw: &str) -> Result<IntentState, InvalidTxHash> {
        let tx = TxHash::parse(raw)?;
        Ok(self.tracker.current(&tx).await)
    }

    /// VIP upgrade eligibility from cumulative ledger deposits.
    ///
    /// `current_tier_name` selects the held tier from the catalog; unknown
    /// names count as holding no tier.
    pub async fn eligibility(&self, current_tier_name: Option<&str>) -> Option<UpgradePath> {
        let total = self.ledger.total_deposited().await;
        let current = current_tier_name
            .and_then(|name| self.tiers.iter().find(|t| t.name.eq_ignore_ascii_case(name)));
        compute_upgrade(&self.tiers, current, total)
    }

    /// All ledger deposits
    pub async fn deposits(&self) -> Vec<DepositRecord> {
        self.ledger.all().await
    }

    /// Cumulative verified deposits in the quote unit
    pub async fn total_deposited(&self) -> rust_decimal::Decimal {
        self.ledger.total_deposited().await
    }

    /// Tier catalog
    pub fn tiers(&self) -> &[VipTier] {
        &self.tiers
    }

    /// Statistics snapshot
    pub async fn stats(&self) -> ReconcilerStats {
        *self.stats.read().await
    }
}

/// Shared service type for API handlers
pub type SharedReconcilerService = Arc<DepositReconcilerService>;
