//! Thin HTTP mapping over the engine: handlers assign ids, build commands,
//! and shape responses — all matching decisions stay in [`MatchingEngine`].

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::{
    engine::Mode,
    events::{Command, DomainEvent, Order, Side},
    projections::TapeEntry,
    state::AppState,
};

const MAX_TRADES_LIMIT: usize = 1000;
const DEFAULT_TRADES_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct NewOrderRequest {
    pub side: Side,
    pub price: u64,
    pub qty: u64,
    pub symbol: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub trades: Vec<DomainEvent>,
}

#[derive(Serialize, Deserialize)]
pub struct BookSnapshot {
    pub bids: Vec<(u64, u64)>,
    pub asks: Vec<(u64, u64)>,
}

#[derive(Serialize, Deserialize)]
pub struct Stats {
    pub log_records: usize,
    pub channel_backlog: usize,
    pub resting_orders: usize,
}

#[debug_handler]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<NewOrderRequest>,
) -> Result<Json<OrderAck>, StatusCode> {
    if payload.price == 0 || payload.qty == 0 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let order = Order {
        id: Uuid::new_v4().to_string(),
        side: payload.side,
        price: payload.price,
        qty: payload.qty,
        // Arrival sequence is assigned by the engine at acceptance.
        ts: 0,
        symbol: payload.symbol,
    };
    let order_id = order.id.clone();

    let mut engine = state.engine.lock().unwrap();
    let trades = engine
        .process(Command::NewOrder(order), Mode::Live)
        .map_err(|e| {
            error!(%order_id, "order rejected, durability failure: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(OrderAck { order_id, trades }))
}

#[debug_handler]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut engine = state.engine.lock().unwrap();
    // Cancels are idempotent: unknown ids still return 200.
    engine
        .process(Command::CancelOrder { order_id }, Mode::Live)
        .map_err(|e| {
            error!("cancel rejected, durability failure: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::OK)
}

#[debug_handler]
pub async fn get_book(State(state): State<AppState>) -> Json<BookSnapshot> {
    let projections = state.projections.lock().unwrap();
    Json(BookSnapshot {
        bids: projections.depth.bids(),
        asks: projections.depth.asks(),
    })
}

#[derive(Deserialize)]
pub struct TradesQuery {
    pub limit: Option<usize>,
}

#[debug_handler]
pub async fn get_trades(
    State(state): State<AppState>,
    Query(q): Query<TradesQuery>,
) -> impl IntoResponse {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_TRADES_LIMIT)
        .clamp(1, MAX_TRADES_LIMIT);
    let trades: Vec<TapeEntry> = state.projections.lock().unwrap().tape.recent(limit);
    ([("x-effective-limit", limit.to_string())], Json(trades))
}

#[debug_handler]
pub async fn get_stats(State(state): State<AppState>) -> Json<Stats> {
    let engine = state.engine.lock().unwrap();
    Json(Stats {
        log_records: engine.wal().len(),
        channel_backlog: state.channel.len(),
        resting_orders: engine.book().len(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", delete(cancel_order))
        .route("/book", get(get_book))
        .route("/trades", get(get_trades))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
