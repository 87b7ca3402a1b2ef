//! StakeVault Backend - Deposit Reconciliation Services
//!
//! Server-side services for cross-chain deposit detection:
//!
//! 1. **Reconciler** - Locates a user-entered transaction hash across all
//!    supported networks and verifies it pays a platform deposit address
//! 2. **Deposit Ledger** - Idempotent record of confirmed deposits
//! 3. **VIP Eligibility** - Tier upgrade math over cumulative deposits
//!
//! The REST/WebSocket API in [`reconciler::api`] exposes all of the above
//! to the frontend.

// Core modules
pub mod common;
pub mod config;
pub mod logging;
pub mod lookup;
pub mod reconciler;
pub mod vip;

// Re-exports: root error type
pub use common::{Result, StakeVaultError};

// Re-exports: configuration
pub use config::{ConfigError, StakeVaultConfig, DEFAULT_LOOKUP_URL};

// Re-exports: logging
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_deposit_event,
    log_reconcile_event, EventCategory, LogEvent, LogLevel, LoggingError,
};

// Re-exports: lookup client
pub use lookup::{HttpLookupClient, LookupError, NetworkLookup};

// Re-exports: reconciler
pub use reconciler::{
    create_reconciler_router, start_reconciler_server, DepositIntentTracker,
    DepositLedgerWriter, DepositRecord, DepositReconcilerService, IntentState,
    KnownAddressRegistry, MemoryDepositLedger, Network, ReconciliationEngine,
    ReconciliationVerdict, SearchStatus, SharedReconcilerService, TxHash,
};

// Re-exports: VIP tiers
pub use vip::{compute_upgrade, default_tier_catalog, UpgradeInfo, UpgradePath, VipTier};
