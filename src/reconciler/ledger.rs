//! Deposit Ledger
//!
//! Writes verified reconciliation results as deposit records. The write is
//! idempotent on the transaction hash: a second create for the same hash
//! returns the existing record instead of a duplicate row, and callers surface
//! that as "already processed".
//!
//! The ledger stores verified deposit amounts only. Earned or bonus funds
//! never enter it, which is what lets its total feed tier-affordability checks
//! directly.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use super::hash::TxHash;
use super::types::Network;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger write failed: {0}")]
    WriteFailed(String),
}

/// A persisted deposit
#[derive(Debug, Clone, Serialize)]
pub struct DepositRecord {
    /// Unique deposit ID
    pub id: String,
    pub tx_hash: TxHash,
    pub network: Network,
    /// Amount in the quote unit
    pub amount: Decimal,
    /// Timestamp when the deposit was written
    pub created_at: u64,
}

impl DepositRecord {
    fn new(tx_hash: TxHash, network: Network, amount: Decimal) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let id = format!("dep_{}_{:08x}", now, rand::random::<u32>());

        Self {
            id,
            tx_hash,
            network,
            amount,
            created_at: now,
        }
    }
}

/// Outcome of a ledger write
#[derive(Debug, Clone, Serialize)]
pub enum LedgerWrite {
    /// A new deposit row was created
    Created(DepositRecord),
    /// The hash was already credited; this is the existing row
    Existing(DepositRecord),
}

impl LedgerWrite {
    pub fn record(&self) -> &DepositRecord {
        match self {
            LedgerWrite::Created(r) | LedgerWrite::Existing(r) => r,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerWrite::Existing(_))
    }
}

/// Boundary to deposit persistence.
#[async_trait]
pub trait DepositLedgerWriter: Send + Sync {
    /// Create a deposit record, idempotent on the transaction hash.
    async fn create(
        &self,
        tx: &TxHash,
        network: Network,
        amount: Decimal,
    ) -> Result<LedgerWrite, LedgerError>;

    /// Cumulative deposited amount across all records
    async fn total_deposited(&self) -> Decimal;

    /// All deposit records
    async fn all(&self) -> Vec<DepositRecord>;
}

/// In-memory ledger store
#[derive(Default)]
pub struct MemoryDepositLedger {
    records: RwLock<HashMap<TxHash, DepositRecord>>,
}

impl MemoryDepositLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepositLedgerWriter for MemoryDepositLedger {
    async fn create(
        &self,
        tx: &TxHash,
        network: Network,
        amount: Decimal,
    ) -> Result<LedgerWrite, LedgerError> {
        // Check-and-set under one write lock so concurrent confirms of the
        // same hash cannot both insert
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(tx) {
            return Ok(LedgerWrite::Existing(existing.clone()));
        }

        let record = DepositRecord::new(tx.clone(), network, amount);
        records.insert(tx.clone(), record.clone());
        Ok(LedgerWrite::Created(record))
    }

    async fn total_deposited(&self) -> Decimal {
        let records = self.records.read().await;
        records.values().map(|r| r.amount).sum()
    }

    async fn all(&self) -> Vec<DepositRecord> {
        let records = self.records.read().await;
        let mut all: Vec<DepositRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(fill: &str) -> TxHash {
        TxHash::parse(&fill.repeat(16)).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_duplicate_returns_same_record() {
        let ledger = MemoryDepositLedger::new();
        let tx = tx("ab12");

        let first = ledger
            .create(&tx, Network::Bsc, Decimal::from(50))
            .await
            .unwrap();
        assert!(!first.is_duplicate());

        let second = ledger
            .create(&tx, Network::Bsc, Decimal::from(50))
            .await
            .unwrap();
        assert!(second.is_duplicate());
        assert_eq!(first.record().id, second.record().id);

        assert_eq!(ledger.all().await.len(), 1);
        assert_eq!(ledger.total_deposited().await, Decimal::from(50));
    }

    #[tokio::test]
    async fn test_total_sums_across_hashes() {
        let ledger = MemoryDepositLedger::new();

        ledger
            .create(&tx("ab12"), Network::Bsc, Decimal::from(50))
            .await
            .unwrap();
        ledger
            .create(&tx("cd34"), Network::Tron, Decimal::from(70))
            .await
            .unwrap();

        assert_eq!(ledger.total_deposited().await, Decimal::from(120));
        assert_eq!(ledger.all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_creates_insert_once() {
        use std::sync::Arc;

        let ledger = Arc::new(MemoryDepositLedger::new());
        let tx = tx("ef56");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                ledger.create(&tx, Network::Ethereum, Decimal::from(5)).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if !handle.await.unwrap().unwrap().is_duplicate() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(ledger.total_deposited().await, Decimal::from(5));
    }
}
