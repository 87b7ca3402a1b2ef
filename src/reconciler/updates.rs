//! Search Status Updates
//!
//! Pub/sub fan-out of reconciliation status changes to connected clients.
//! Uses tokio broadcast channels; WebSocket handlers subscribe and filter.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::hash::{InvalidTxHash, TxHash};
use super::types::{SearchStatus, SearchStatusUpdate};

/// Broadcast state shared across handlers
pub struct UpdatesState {
    sender: broadcast::Sender<SearchStatusUpdate>,
}

impl UpdatesState {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SearchStatusUpdate> {
        self.sender.subscribe()
    }

    /// Publish an update to all subscribers. Send errors (no subscribers)
    /// are ignored.
    pub fn publish(&self, update: SearchStatusUpdate) {
        let _ = self.sender.send(update);
    }
}

impl Default for UpdatesState {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Shared updates state type
pub type SharedUpdatesState = Arc<RwLock<UpdatesState>>;

pub fn create_updates_state() -> SharedUpdatesState {
    Arc::new(RwLock::new(UpdatesState::default()))
}

/// Publisher handed to the reconciler service
#[derive(Clone)]
pub struct StatusPublisher {
    state: SharedUpdatesState,
}

impl StatusPublisher {
    pub fn new(state: SharedUpdatesState) -> Self {
        Self { state }
    }

    pub async fn publish(&self, tx_hash: String, status: SearchStatus) {
        let updates = self.state.read().await;
        updates.publish(SearchStatusUpdate { tx_hash, status });
    }
}

/// Canonical filter key for a subscription. Updates are published under the
/// canonical hash, so the filter must coalesce case and `0x` marker variants
/// the same way or marker-prefixed subscriptions would never match.
fn subscription_filter(raw: &str) -> Result<String, InvalidTxHash> {
    TxHash::parse(raw).map(|tx| tx.to_string())
}

/// WebSocket upgrade handler for one hash's updates
///
/// Route: /ws/reconcile/:tx_hash
pub async fn ws_reconcile_handler(
    ws: WebSocketUpgrade,
    Path(tx_hash): Path<String>,
    State(state): State<SharedUpdatesState>,
) -> Response {
    match subscription_filter(&tx_hash) {
        Ok(filter) => ws.on_upgrade(move |socket| handle_socket(socket, Some(filter), state)),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// WebSocket upgrade handler for all updates (operator dashboards)
///
/// Route: /ws/reconcile
pub async fn ws_all_reconcile_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedUpdatesState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, None, state))
}

async fn handle_socket(socket: WebSocket, filter: Option<String>, state: SharedUpdatesState) {
    let (mut sender, mut receiver) = socket.split();

    let updates = state.read().await;
    let mut rx = updates.subscribe();
    drop(updates);

    let send_task = tokio::spawn(async move {
        while let Ok(update) = rx.recv().await {
            if let Some(wanted) = &filter {
                if &update.tx_hash != wanted {
                    continue;
                }
            }

            let json = match serde_json::to_string(&update) {
                Ok(j) => j,
                Err(_) => continue,
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}
