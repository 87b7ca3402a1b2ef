//! Reconciler API Endpoints
//!
//! REST and WebSocket endpoints for deposit reconciliation:
//! - `POST /api/reconcile` - Submit a transaction hash for reconciliation
//! - `GET /api/reconcile/:tx_hash` - Current intent state for a hash
//! - `POST /api/deposits` - Confirm a verified deposit into the ledger
//! - `GET /api/deposits` - List ledger deposits and stats
//! - `GET /api/vip/tiers` - Tier catalog
//! - `GET /api/vip/eligibility` - Upgrade eligibility from ledger totals
//! - `WS /ws/reconcile/:tx_hash` - Subscribe to one hash's status updates
//! - `WS /ws/reconcile` - Subscribe to all status updates

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::logging::{generate_correlation_id, log_deposit_event, log_reconcile_event};

use super::hash::TxHash;
use super::service::{ConfirmError, ConfirmOutcome, DepositReconcilerService};
use super::types::{
    ConfirmDepositRequest, ConfirmDepositResponse, ReconcileRequest, SearchStatusUpdate,
};
use super::updates::{
    create_updates_state, ws_all_reconcile_handler, ws_reconcile_handler, SharedUpdatesState,
    StatusPublisher,
};

/// Combined application state
pub struct AppState {
    pub service: Arc<DepositReconcilerService>,
    pub updates: SharedUpdatesState,
}

/// Shared app state type
pub type SharedAppState = Arc<AppState>;

/// Create the reconciler API router
pub fn create_reconciler_router(service: DepositReconcilerService) -> Router {
    let updates = create_updates_state();
    let service = service.with_publisher(StatusPublisher::new(updates.clone()));

    let state = Arc::new(AppState {
        service: Arc::new(service),
        updates,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Reconciliation endpoints
        .route("/api/reconcile", post(handle_reconcile))
        .route("/api/reconcile/:tx_hash", get(handle_intent_state))
        // Deposit endpoints
        .route("/api/deposits", post(handle_confirm_deposit))
        .route("/api/deposits", get(handle_list_deposits))
        // VIP endpoints
        .route("/api/vip/tiers", get(handle_tiers))
        .route("/api/vip/eligibility", get(handle_eligibility))
        // WebSocket endpoints
        .route("/ws/reconcile/:tx_hash", get(ws_reconcile_wrapper))
        .route("/ws/reconcile", get(ws_all_reconcile_wrapper))
        // Health check and monitoring
        .route("/api/health", get(handle_health))
        .route("/api/stats", get(handle_stats))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// REST Handlers
// =============================================================================

/// POST /api/reconcile
///
/// Validate a user-entered hash and reconcile it across all networks.
async fn handle_reconcile(
    State(state): State<SharedAppState>,
    Json(req): Json<ReconcileRequest>,
) -> impl IntoResponse {
    let correlation_id = generate_correlation_id();
    let status = state.service.on_input(&req.tx_hash).await;

    log_reconcile_event(status.label(), &req.tx_hash, &correlation_id);

    let code = match &status {
        crate::reconciler::types::SearchStatus::Error { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };

    // Echo the canonical hash so clients key updates consistently; invalid
    // input has no canonical form and is echoed trimmed
    let tx_hash = TxHash::parse(&req.tx_hash)
        .map(|tx| tx.to_string())
        .unwrap_or_else(|_| req.tx_hash.trim().to_string());

    let body = SearchStatusUpdate { tx_hash, status };
    (code, Json(body))
}

/// GET /api/reconcile/:tx_hash
///
/// Current intent state for a hash.
async fn handle_intent_state(
    State(state): State<SharedAppState>,
    Path(tx_hash): Path<String>,
) -> impl IntoResponse {
    match state.service.current_intent(&tx_hash).await {
        Ok(intent) => (StatusCode::OK, Json(serde_json::json!(intent))).into_response(),
        Err(e) => {
            let error = serde_json::json!({
                "error": "invalid transaction hash",
                "details": e.to_string()
            });
            (StatusCode::BAD_REQUEST, Json(error)).into_response()
        }
    }
}

/// POST /api/deposits
///
/// Confirm a verified, recipient-matching verdict into the ledger.
async fn handle_confirm_deposit(
    State(state): State<SharedAppState>,
    Json(req): Json<ConfirmDepositRequest>,
) -> impl IntoResponse {
    match state.service.confirm_deposit(&req.tx_hash).await {
        Ok(ConfirmOutcome::Created(record)) => {
            log_deposit_event("deposit_created", &record.id, &req.tx_hash, true, None);
            let response = ConfirmDepositResponse {
                success: true,
                deposit_id: Some(record.id),
                message: Some("Deposit recorded".to_string()),
            };
            (StatusCode::OK, Json(response))
        }
        Ok(ConfirmOutcome::AlreadyProcessed { deposit_id }) => {
            log_deposit_event("deposit_duplicate", &deposit_id, &req.tx_hash, true, None);
            let response = ConfirmDepositResponse {
                success: true,
                deposit_id: Some(deposit_id),
                message: Some("Already processed".to_string()),
            };
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            log_deposit_event("deposit_rejected", "", &req.tx_hash, false, Some(&e.to_string()));
            let code = match &e {
                ConfirmError::RecipientMismatch => StatusCode::CONFLICT,
                ConfirmError::Ledger(_) | ConfirmError::IncompleteVerdict(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            };
            let response = ConfirmDepositResponse {
                success: false,
                deposit_id: None,
                message: Some(e.to_string()),
            };
            (code, Json(response))
        }
    }
}

/// GET /api/deposits
///
/// List ledger deposits (for admin/debugging).
async fn handle_list_deposits(State(state): State<SharedAppState>) -> impl IntoResponse {
    let deposits = state.service.deposits().await;
    let total = state.service.total_deposited().await;

    Json(serde_json::json!({
        "deposits": deposits,
        "total_deposited": total,
    }))
}

/// GET /api/vip/tiers
async fn handle_tiers(State(state): State<SharedAppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "tiers": state.service.tiers() }))
}

#[derive(Debug, Deserialize)]
struct EligibilityQuery {
    /// Name of the currently held tier, if any
    current_tier: Option<String>,
}

/// GET /api/vip/eligibility
///
/// Upgrade eligibility computed from cumulative ledger deposits only.
async fn handle_eligibility(
    State(state): State<SharedAppState>,
    Query(query): Query<EligibilityQuery>,
) -> impl IntoResponse {
    let upgrade = state
        .service
        .eligibility(query.current_tier.as_deref())
        .await;
    let total = state.service.total_deposited().await;

    Json(serde_json::json!({
        "cumulative_deposits": total,
        "current_tier": query.current_tier,
        "upgrade": upgrade,
    }))
}

/// GET /api/health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stakevault-reconciler",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /api/stats
async fn handle_stats(State(state): State<SharedAppState>) -> impl IntoResponse {
    let stats = state.service.stats().await;
    Json(serde_json::json!(stats))
}

// =============================================================================
// WebSocket Wrappers
// =============================================================================

async fn ws_reconcile_wrapper(
    ws: axum::extract::ws::WebSocketUpgrade,
    Path(tx_hash): Path<String>,
    State(state): State<SharedAppState>,
) -> impl IntoResponse {
    ws_reconcile_handler(ws, Path(tx_hash), State(state.updates.clone())).await
}

async fn ws_all_reconcile_wrapper(
    ws: axum::extract::ws::WebSocketUpgrade,
    State(state): State<SharedAppState>,
) -> impl IntoResponse {
    ws_all_reconcile_handler(ws, State(state.updates.clone())).await
}

/// Start the reconciler API server
pub async fn start_reconciler_server(
    service: DepositReconcilerService,
    port: u16,
) -> Result<(), std::io::Error> {
    let router = create_reconciler_router(service);
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!(target: "stakevault::api", %addr, "reconciler API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await
}
