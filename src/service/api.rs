//! HTTP and WebSocket surface consumed by bidding clients.
//!
//! `GET /bids/:product_type/:product_id` serves the snapshot, `POST
//! /bids/place` submits a bid through the coordinator, and `GET /ws` is the
//! realtime channel: the client sends `{ product_type, product_id }` join
//! messages and receives a push for every bid accepted on a joined key.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{format_err, Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{runtime::Runtime, sync::mpsc, sync::oneshot};
use tracing::{debug, error};

use super::LoopService;
use crate::auction::{Amount, AuctionKey, BidError, ProductId, ProductType, UserId, MAX_AMOUNT};
use crate::catalog::{display_name_or_fallback, SharedUserDirectory};
use crate::coordinator::Coordinator;
use crate::fanout::{BidEvent, Broadcaster};
use crate::ledger::SharedLedger;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub ledger: SharedLedger,
    pub users: SharedUserDirectory,
    pub broadcaster: Arc<Broadcaster>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub product_type: String,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Debug, Serialize)]
pub struct PlaceBidResponse {
    pub message: String,
    pub bid: BidEvent,
}

fn message_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bid_error_response(err: BidError) -> Response {
    match err {
        BidError::UnknownProduct(key) => {
            message_response(StatusCode::NOT_FOUND, format!("Product {key} not found."))
        }
        BidError::TooLow {
            min_next,
            current_highest,
        } => message_response(
            StatusCode::BAD_REQUEST,
            format!("Bid must be at least {min_next}. Current highest is {current_highest}."),
        ),
        BidError::Timeout => message_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Auction is busy. Please try again.".to_owned(),
        ),
        BidError::Storage(err) => {
            error!(%err, "storage failure");
            message_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.".to_owned(),
            )
        }
    }
}

fn parse_key(product_type: &str, product_id: ProductId) -> Result<AuctionKey, Response> {
    let product_type: ProductType = product_type
        .parse()
        .map_err(|err: crate::auction::UnknownProductType| {
            message_response(StatusCode::BAD_REQUEST, err.to_string())
        })?;
    Ok(AuctionKey::new(product_type, product_id))
}

pub(crate) async fn list_bids(
    State(state): State<AppState>,
    Path((product_type, product_id)): Path<(String, ProductId)>,
) -> Response {
    let key = match parse_key(&product_type, product_id) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let result = tokio::task::spawn_blocking(move || -> Result<Vec<BidEvent>, BidError> {
        let bids = state.ledger.list_by_key(&key)?;
        Ok(bids
            .iter()
            .map(|bid| {
                BidEvent::from_bid(bid, display_name_or_fallback(&*state.users, bid.user_id))
            })
            .collect())
    })
    .await;

    match result {
        Ok(Ok(bids)) => (StatusCode::OK, Json(bids)).into_response(),
        Ok(Err(err)) => bid_error_response(err),
        Err(err) => {
            error!(%err, "bid listing task failed");
            message_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.".to_owned(),
            )
        }
    }
}

pub(crate) async fn place_bid(
    State(state): State<AppState>,
    Json(req): Json<PlaceBidRequest>,
) -> Response {
    let key = match parse_key(&req.product_type, req.product_id) {
        Ok(key) => key,
        Err(response) => return response,
    };
    if req.amount == 0 || req.amount > MAX_AMOUNT {
        return message_response(
            StatusCode::BAD_REQUEST,
            format!("Amount must be a positive integer no greater than {MAX_AMOUNT}."),
        );
    }

    // The coordinator may block on the per-key lock; keep it off the
    // async workers.
    let result = tokio::task::spawn_blocking(move || {
        state
            .coordinator
            .submit_bid(key, req.user_id, req.amount)
            .map(|bid| {
                BidEvent::from_bid(&bid, display_name_or_fallback(&*state.users, bid.user_id))
            })
    })
    .await;

    match result {
        Ok(Ok(bid)) => (
            StatusCode::CREATED,
            Json(PlaceBidResponse {
                message: "Bid placed successfully.".to_owned(),
                bid,
            }),
        )
            .into_response(),
        Ok(Err(err)) => bid_error_response(err),
        Err(err) => {
            error!(%err, "bid submission task failed");
            message_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.".to_owned(),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct JoinMessage {
    product_type: String,
    product_id: ProductId,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut events) = mpsc::unbounded_channel();
    let connection = state.broadcaster.connect(sender);
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => error!(%err, "failed to serialize bid event"),
                },
                None => break,
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<JoinMessage>(&text)
                        .map_err(|e| e.to_string())
                        .and_then(|join| {
                            parse_key(&join.product_type, join.product_id)
                                .map_err(|_| format!("unrecognized product type: {}", join.product_type))
                        }) {
                        Ok(key) => {
                            debug!(%key, connection, "client joined auction room");
                            state.broadcaster.subscribe(key, connection);
                        }
                        Err(message) => {
                            let reply = json!({ "message": message }).to_string();
                            if ws_tx.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%err, connection, "websocket receive error");
                    break;
                }
            },
        }
    }

    state.broadcaster.disconnect(connection);
    debug!(connection, "client disconnected");
}

async fn run_http_server(bind: SocketAddr, state: AppState) -> Result<()> {
    let app = Router::new()
        .route("/bids/:product_type/:product_id", get(list_bids))
        .route("/bids/place", post(place_bid))
        .route("/ws", get(ws_handler))
        .with_state(state);

    axum::Server::try_bind(&bind)?
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

pub struct Api {
    // cancels all tasks on drop
    _runtime: Runtime,
    server_rx: oneshot::Receiver<Result<()>>,
}

impl Api {
    pub fn new(bind: SocketAddr, state: AppState) -> Result<Self> {
        let runtime = Runtime::new()?;

        let (tx, rx) = oneshot::channel();

        runtime.spawn(async move {
            tx.send(
                run_http_server(bind, state)
                    .await
                    .with_context(|| format!("Failed to run http server on {bind}")),
            )
            .expect("send to work");
        });

        Ok(Self {
            _runtime: runtime,
            server_rx: rx,
        })
    }
}

impl LoopService for Api {
    fn run_iteration(&mut self) -> Result<()> {
        // don't hog the cpu
        std::thread::sleep(std::time::Duration::from_millis(100));

        match self.server_rx.try_recv() {
            Ok(res) => res,
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(format_err!("api server died without leaving a response?!"))
            }
        }
    }
}
