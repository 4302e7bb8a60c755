// HTTP request handlers for the PointPool API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::SharedState;
use crate::audit::AuditAction;
use crate::auth::require_admin;
use crate::engine::{place_stake, resolve_market, ResolveError, StakeError};
use crate::models::*;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

// ===== USER ENDPOINTS =====

/// POST /users — login-by-name; creates the user on first sight.
pub async fn login_user(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<User>, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Username required"));
    }
    Ok(Json(state.store.login_or_create(username)))
}

/// GET /users/:username — profile: balance plus order history joined with
/// each order's market.
pub async fn get_user_profile(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .store
        .get_user_by_username(&username)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    let orders: Vec<Value> = state
        .store
        .orders_for_user(user.id)
        .into_iter()
        .map(|order| {
            let market = state.store.get_market(order.market_id);
            json!({
                "id": order.id,
                "market_id": order.market_id,
                "outcome": order.outcome,
                "amount": order.amount,
                "payout": order.payout,
                "timestamp": order.timestamp,
                "market": market,
            })
        })
        .collect();

    Ok(Json(json!({ "user": user, "orders": orders })))
}

/// GET /leaderboard — top non-admin users by points.
pub async fn get_leaderboard(State(state): State<SharedState>) -> Json<Value> {
    Json(json!(state.store.leaderboard(10)))
}

// ===== ADMIN ENDPOINTS =====

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<usize>,
}

/// GET /admin/check — admin flag probe, never an error.
pub async fn check_admin(
    State(state): State<SharedState>,
    Query(query): Query<AdminQuery>,
) -> Json<Value> {
    let is_admin = query
        .user_id
        .and_then(|id| state.store.get_user(id))
        .map(|u| u.is_admin)
        .unwrap_or(false);
    Json(json!({ "is_admin": is_admin }))
}

/// GET /admin/logs — recent audit entries, newest first. Protected.
pub async fn get_audit_logs(
    State(state): State<SharedState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state.store, query.user_id)?;
    let limit = query.limit.unwrap_or(50);
    Ok(Json(json!(state.audit.recent(limit))))
}

/// POST /admin/grant — flag a user administrative. Protected.
pub async fn grant_admin(
    State(state): State<SharedState>,
    Json(payload): Json<AdminTargetRequest>,
) -> Result<Json<Value>, ApiError> {
    let admin = require_admin(&state.store, Some(payload.user_id))?;
    let target = state
        .store
        .set_admin(&payload.target_username, true)
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    state.audit.record(
        admin.id,
        &admin.username,
        target.id,
        AuditAction::GrantAdmin {
            username: target.username.clone(),
        },
    );
    Ok(Json(json!({ "message": "Admin granted", "user": target })))
}

/// POST /admin/revoke — remove a user's administrative flag. Protected.
pub async fn revoke_admin(
    State(state): State<SharedState>,
    Json(payload): Json<AdminTargetRequest>,
) -> Result<Json<Value>, ApiError> {
    let admin = require_admin(&state.store, Some(payload.user_id))?;
    let target = state
        .store
        .set_admin(&payload.target_username, false)
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "User not found"))?;

    state.audit.record(
        admin.id,
        &admin.username,
        target.id,
        AuditAction::RevokeAdmin {
            username: target.username.clone(),
        },
    );
    Ok(Json(json!({ "message": "Admin revoked", "user": target })))
}

// ===== MARKET ENDPOINTS =====

#[derive(Debug, Deserialize)]
pub struct MarketListQuery {
    pub category: Option<String>,
}

/// GET /markets — list markets, optionally filtered by category.
pub async fn list_markets(
    State(state): State<SharedState>,
    Query(query): Query<MarketListQuery>,
) -> Json<Value> {
    Json(json!(state.store.list_markets(query.category.as_deref())))
}

/// GET /markets/:id
pub async fn get_market(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Market>, ApiError> {
    state
        .store
        .get_market(id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Market not found"))
}

/// POST /markets — create a market with zero-seeded pools. Protected.
pub async fn create_market(
    State(state): State<SharedState>,
    Json(payload): Json<CreateMarketRequest>,
) -> Result<Json<Market>, ApiError> {
    let admin = require_admin(&state.store, Some(payload.user_id))?;

    if payload.closes_at <= chrono::Utc::now() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Closing date must be in the future",
        ));
    }
    if payload.outcomes.len() < 2 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Market must have at least 2 outcomes",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    if !payload.outcomes.iter().all(|o| seen.insert(o)) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Outcomes must be distinct",
        ));
    }

    let category = payload.category.unwrap_or_else(|| "All".to_string());
    let market = state.store.insert_market(Market::new(
        payload.question.clone(),
        payload.description,
        category.clone(),
        payload.outcomes,
        payload.closes_at,
    ));

    state.audit.record(
        admin.id,
        &admin.username,
        market.id,
        AuditAction::CreateMarket {
            question: payload.question,
            category,
        },
    );
    Ok(Json(market))
}

/// DELETE /markets/:id — refused once the market has orders. Protected.
pub async fn delete_market(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<Value>, ApiError> {
    let admin = require_admin(&state.store, query.user_id)?;

    let market = state.store.delete_market(id).map_err(|e| match e {
        crate::store::StoreError::MarketNotFound => {
            api_error(StatusCode::NOT_FOUND, "Market not found")
        }
        _ => api_error(
            StatusCode::CONFLICT,
            "Market has orders and cannot be deleted",
        ),
    })?;

    state.audit.record(
        admin.id,
        &admin.username,
        market.id,
        AuditAction::DeleteMarket {
            question: market.question.clone(),
        },
    );
    Ok(Json(
        json!({ "message": "Market deleted", "market_id": id }),
    ))
}

// ===== ORDER / PREDICT =====

/// POST /orders — the stake engine entry point. Validation errors and
/// availability conflicts map to 400, missing entities to 404, the admin
/// conflict-of-interest bar to 403.
pub async fn place_order(
    State(state): State<SharedState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    let receipt = place_stake(
        &state.store,
        payload.user_id,
        payload.market_id,
        &payload.outcome,
        payload.amount,
    )
    .map_err(|e| {
        let status = match e {
            StakeError::UserNotFound | StakeError::MarketNotFound => StatusCode::NOT_FOUND,
            StakeError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        api_error(status, e.to_string())
    })?;

    Ok(Json(json!({
        "message": "Prediction placed",
        "user": receipt.user,
        "market": receipt.market,
        "order": receipt.order,
    })))
}

// ===== RESOLVE =====

/// POST /markets/:id/resolve — the settlement engine entry point. Protected.
pub async fn resolve_market_handler(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveMarketRequest>,
) -> Result<Json<Value>, ApiError> {
    let admin = require_admin(&state.store, Some(payload.user_id))?;

    let report = resolve_market(&state.store, id, &payload.outcome).map_err(|e| {
        let status = match e {
            ResolveError::MarketNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        api_error(status, e.to_string())
    })?;

    state.audit.record(
        admin.id,
        &admin.username,
        report.market.id,
        AuditAction::ResolveMarket {
            outcome: payload.outcome,
            total_pool: report.total_pool,
            winning_pool: report.winning_pool,
            distributed: report.distributed,
            retained: report.retained,
            winning_orders: report.payouts.len() as u64,
        },
    );

    Ok(Json(json!({
        "message": "Market resolved",
        "market": report.market,
        "distributed": report.distributed,
        "retained": report.retained,
        "pending_payouts": report.failed_orders,
    })))
}

// ===== HEALTH =====

pub async fn health_check() -> &'static str {
    "PointPool Prediction Market API is running"
}
