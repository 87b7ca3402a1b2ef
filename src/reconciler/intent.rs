//! Deposit Intent Tracker
//!
//! Per-hash state machine guarding against duplicate and overlapping
//! reconciliation attempts:
//!
//! ```text
//! IDLE → SEARCHING → {VERIFIED | FAILED} → [LEDGER_WRITTEN]
//! ```
//!
//! All transitions are check-and-set under a single write lock, so two
//! concurrent `begin` calls for the same hash can never both start. Each
//! attempt carries a generation; a completion arriving for a superseded
//! generation is dropped rather than applied (stale-response suppression).

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::hash::TxHash;
use super::types::{IntentState, ReconciliationVerdict};

/// Intent tracker errors
#[derive(Debug, Error)]
pub enum IntentError {
    /// A reconciliation for this hash is already searching. Callers coalesce
    /// this into the existing attempt; it is not a user-facing failure.
    #[error("reconciliation already in progress for {0}")]
    AlreadyInProgress(TxHash),

    #[error("intent for {0} is not verified")]
    NotVerified(TxHash),
}

/// Handle for one in-flight attempt. Required by [`DepositIntentTracker::complete`],
/// which uses the generation to drop superseded completions.
#[derive(Debug, Clone)]
pub struct IntentToken {
    /// Correlation id for logging
    pub id: Uuid,
    tx_hash: TxHash,
    generation: u64,
}

impl IntentToken {
    pub fn tx_hash(&self) -> &TxHash {
        &self.tx_hash
    }
}

/// Outcome of a `begin` call
#[derive(Debug)]
pub enum Begin {
    /// A fresh attempt was started
    Started(IntentToken),
    /// The hash is already in the ledger; no-op success with the existing
    /// deposit reference (duplicate-submission guard)
    AlreadyWritten { deposit_id: String },
}

/// Terminal outcome of one reconciliation attempt
#[derive(Debug)]
pub enum IntentOutcome {
    Verified(ReconciliationVerdict),
    Failed(String),
}

/// Result of applying a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The token's generation was superseded; the result was dropped
    Stale,
}

struct IntentSlot {
    state: IntentState,
    generation: u64,
}

/// Tracks one intent record per transaction hash.
///
/// The only shared mutable resource in the reconciler; every transition takes
/// the write lock for the full check-and-set.
#[derive(Default)]
pub struct DepositIntentTracker {
    intents: RwLock<HashMap<TxHash, IntentSlot>>,
}

impl DepositIntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an attempt for a hash.
    ///
    /// `Idle` (including never-seen), `Verified`, and `Failed` start a fresh
    /// generation. `Searching` is rejected with `AlreadyInProgress` so rapid
    /// repeated input coalesces instead of re-dispatching. `LedgerWritten`
    /// short-circuits to the existing deposit.
    pub async fn begin(&self, tx: &TxHash) -> Result<Begin, IntentError> {
        let mut intents = self.intents.write().await;
        let slot = intents.entry(tx.clone()).or_insert(IntentSlot {
            state: IntentState::Idle,
            generation: 0,
        });

        match &slot.state {
            IntentState::Searching => Err(IntentError::AlreadyInProgress(tx.clone())),
            IntentState::LedgerWritten { deposit_id } => Ok(Begin::AlreadyWritten {
                deposit_id: deposit_id.clone(),
            }),
            IntentState::Idle | IntentState::Verified { .. } | IntentState::Failed { .. } => {
                slot.generation += 1;
                slot.state = IntentState::Searching;
                Ok(Begin::Started(IntentToken {
                    id: Uuid::new_v4(),
                    tx_hash: tx.clone(),
                    generation: slot.generation,
                }))
            }
        }
    }

    /// Apply an attempt's outcome. The only legal exit from `Searching`.
    ///
    /// Drops the result when the token's generation has been superseded or
    /// the slot is no longer searching.
    pub async fn complete(&self, token: &IntentToken, outcome: IntentOutcome) -> Completion {
        let mut intents = self.intents.write().await;
        let slot = match intents.get_mut(&token.tx_hash) {
            Some(slot) => slot,
            None => return Completion::Stale,
        };

        if slot.generation != token.generation
            || !matches!(slot.state, IntentState::Searching)
        {
            return Completion::Stale;
        }

        slot.state = match outcome {
            IntentOutcome::Verified(verdict) => IntentState::Verified { verdict },
            IntentOutcome::Failed(reason) => IntentState::Failed { reason },
        };
        Completion::Applied
    }

    /// Advance a verified intent to `LedgerWritten`. One-way and irreversible;
    /// calling it again with the same hash is a no-op.
    pub async fn mark_written(
        &self,
        tx: &TxHash,
        deposit_id: String,
    ) -> Result<(), IntentError> {
        let mut intents = self.intents.write().await;
        let slot = intents
            .get_mut(tx)
            .ok_or_else(|| IntentError::NotVerified(tx.clone()))?;

        match &slot.state {
            IntentState::Verified { .. } => {
                slot.state = IntentState::LedgerWritten { deposit_id };
                Ok(())
            }
            IntentState::LedgerWritten { .. } => Ok(()),
            _ => Err(IntentError::NotVerified(tx.clone())),
        }
    }

    /// Current state for a hash; `Idle` for any hash never seen.
    pub async fn current(&self, tx: &TxHash) -> IntentState {
        let intents = self.intents.read().await;
        intents
            .get(tx)
            .map(|slot| slot.state.clone())
            .unwrap_or(IntentState::Idle)
    }

    /// Verdict of a `Verified` intent, if that is the current state.
    pub async fn verified_verdict(&self, tx: &TxHash) -> Option<ReconciliationVerdict> {
        match self.current(tx).await {
            IntentState::Verified { verdict } => Some(verdict),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tx() -> TxHash {
        TxHash::parse(&"c3d4".repeat(16)).unwrap()
    }

    fn verdict() -> ReconciliationVerdict {
        ReconciliationVerdict::not_found(tx(), vec![])
    }

    fn token(begin: Begin) -> IntentToken {
        match begin {
            Begin::Started(token) => token,
            other => panic!("expected started, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unseen_hash_is_idle() {
        let tracker = DepositIntentTracker::new();
        assert!(matches!(tracker.current(&tx()).await, IntentState::Idle));
    }

    #[tokio::test]
    async fn test_second_begin_is_rejected_while_searching() {
        let tracker = DepositIntentTracker::new();

        let first = tracker.begin(&tx()).await;
        assert!(matches!(first, Ok(Begin::Started(_))));

        let second = tracker.begin(&tx()).await;
        assert!(matches!(second, Err(IntentError::AlreadyInProgress(_))));
        assert!(matches!(
            tracker.current(&tx()).await,
            IntentState::Searching
        ));
    }

    #[tokio::test]
    async fn test_concurrent_begins_start_exactly_once() {
        let tracker = Arc::new(DepositIntentTracker::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move { tracker.begin(&tx()).await }));
        }

        let mut started = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Begin::Started(_)) => started += 1,
                Err(IntentError::AlreadyInProgress(_)) => rejected += 1,
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(started, 1);
        assert_eq!(rejected, 7);
    }

    #[tokio::test]
    async fn test_complete_is_the_only_exit_from_searching() {
        let tracker = DepositIntentTracker::new();
        let token = token(tracker.begin(&tx()).await.unwrap());

        let applied = tracker
            .complete(&token, IntentOutcome::Verified(verdict()))
            .await;
        assert_eq!(applied, Completion::Applied);
        assert!(matches!(
            tracker.current(&tx()).await,
            IntentState::Verified { .. }
        ));

        // A second completion with the same token no longer applies
        let again = tracker
            .complete(&token, IntentOutcome::Failed("late".into()))
            .await;
        assert_eq!(again, Completion::Stale);
    }

    #[tokio::test]
    async fn test_failed_attempt_can_be_retried() {
        let tracker = DepositIntentTracker::new();
        let token = token(tracker.begin(&tx()).await.unwrap());
        tracker
            .complete(&token, IntentOutcome::Failed("all probes errored".into()))
            .await;

        assert!(matches!(
            tracker.current(&tx()).await,
            IntentState::Failed { .. }
        ));
        assert!(matches!(tracker.begin(&tx()).await, Ok(Begin::Started(_))));
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let tracker = DepositIntentTracker::new();

        let old_token = token(tracker.begin(&tx()).await.unwrap());
        tracker
            .complete(&old_token, IntentOutcome::Failed("first attempt".into()))
            .await;

        // Second attempt supersedes the first token's generation
        let _new_token = token(tracker.begin(&tx()).await.unwrap());

        let late = tracker
            .complete(&old_token, IntentOutcome::Verified(verdict()))
            .await;
        assert_eq!(late, Completion::Stale);
        assert!(matches!(
            tracker.current(&tx()).await,
            IntentState::Searching
        ));
    }

    #[tokio::test]
    async fn test_ledger_written_short_circuits_begin() {
        let tracker = DepositIntentTracker::new();
        let token = token(tracker.begin(&tx()).await.unwrap());
        tracker
            .complete(&token, IntentOutcome::Verified(verdict()))
            .await;
        tracker
            .mark_written(&tx(), "dep_123".to_string())
            .await
            .unwrap();

        match tracker.begin(&tx()).await.unwrap() {
            Begin::AlreadyWritten { deposit_id } => assert_eq!(deposit_id, "dep_123"),
            other => panic!("expected AlreadyWritten, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mark_written_requires_verified() {
        let tracker = DepositIntentTracker::new();

        // Unseen hash
        assert!(tracker
            .mark_written(&tx(), "dep_1".to_string())
            .await
            .is_err());

        // Searching is not enough
        let _token = token(tracker.begin(&tx()).await.unwrap());
        assert!(tracker
            .mark_written(&tx(), "dep_1".to_string())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_mark_written_is_idempotent() {
        let tracker = DepositIntentTracker::new();
        let token = token(tracker.begin(&tx()).await.unwrap());
        tracker
            .complete(&token, IntentOutcome::Verified(verdict()))
            .await;

        tracker
            .mark_written(&tx(), "dep_1".to_string())
            .await
            .unwrap();
        tracker
            .mark_written(&tx(), "dep_other".to_string())
            .await
            .unwrap();

        match tracker.current(&tx()).await {
            IntentState::LedgerWritten { deposit_id } => assert_eq!(deposit_id, "dep_1"),
            other => panic!("expected LedgerWritten, got {:?}", other),
        }
    }
}
