//! Deposit Reconciliation Module
//!
//! Takes a user-supplied transaction hash through its complete lifecycle:
//!
//! ```text
//! IDLE → SEARCHING → {VERIFIED | FAILED} → [LEDGER_WRITTEN]
//! ```
//!
//! ## Components
//!
//! - **hash**: Pure transaction hash validation and canonicalization
//! - **types**: Networks, probe results, verdicts, intent states, API types
//! - **engine**: Concurrent cross-network probing and verdict aggregation
//! - **intent**: Per-hash state machine guarding duplicate submissions
//! - **registry**: Platform deposit addresses per network
//! - **ledger**: Idempotent deposit record store
//! - **service**: Main service orchestrating all components
//! - **updates**: Real-time status updates via WebSocket
//! - **api**: REST and WebSocket API endpoints
//!
//! ## Flow Overview
//!
//! 1. User enters a transaction hash (POST /api/reconcile)
//! 2. The hash is validated locally; nothing invalid reaches the network
//! 3. The intent tracker admits at most one in-flight attempt per hash
//! 4. All supported networks are probed concurrently and joined
//! 5. The aggregated verdict completes the intent and is pushed to clients
//! 6. A verified, recipient-matching verdict can be confirmed into the
//!    ledger (POST /api/deposits); the write is idempotent on the hash
//! 7. Cumulative ledger deposits feed VIP tier eligibility

pub mod api;
pub mod engine;
pub mod hash;
pub mod intent;
pub mod ledger;
pub mod registry;
pub mod service;
pub mod types;
pub mod updates;

// Re-exports
pub use api::{create_reconciler_router, start_reconciler_server, AppState, SharedAppState};
pub use engine::{ReconcileError, ReconciliationEngine};
pub use hash::{is_valid_tx_hash, InvalidTxHash, TxHash};
pub use intent::{Begin, Completion, DepositIntentTracker, IntentError, IntentOutcome, IntentToken};
pub use ledger::{
    DepositLedgerWriter, DepositRecord, LedgerError, LedgerWrite, MemoryDepositLedger,
};
pub use registry::KnownAddressRegistry;
pub use service::{
    ConfirmError, ConfirmOutcome, DepositReconcilerService, SharedReconcilerService,
};
pub use types::{
    ConfirmDepositRequest, ConfirmDepositResponse, IntentState, Network, NetworkProbeResult,
    ReconcileRequest, ReconcilerConfig, ReconcilerStats, ReconciliationVerdict, SearchStatus,
    SearchStatusUpdate,
};
pub use updates::{
    create_updates_state, ws_all_reconcile_handler, ws_reconcile_handler, SharedUpdatesState,
    StatusPublisher, UpdatesState,
};
