// PointPool Prediction Market - Main Entry Point

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use pointpool::app_state::{AppState, SharedState};
use pointpool::handlers::*;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let state: SharedState = Arc::new(AppState::from_env());

    // Clone state for shutdown handler before moving into the router
    let shutdown_state = state.clone();

    let app = Router::new()
        // ===== USERS =====
        .route("/users", post(login_user))
        .route("/users/:username", get(get_user_profile))
        .route("/leaderboard", get(get_leaderboard))
        // ===== ADMIN =====
        .route("/admin/check", get(check_admin))
        .route("/admin/logs", get(get_audit_logs))
        .route("/admin/grant", post(grant_admin))
        .route("/admin/revoke", post(revoke_admin))
        // ===== MARKETS =====
        .route("/markets", get(list_markets))
        .route("/markets", post(create_market))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id", delete(delete_market))
        .route("/markets/:id/resolve", post(resolve_market_handler))
        // ===== ORDERS =====
        .route("/orders", post(place_order))
        // ===== HEALTH =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("PointPool Prediction Market API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    // Persist the ledger snapshot on shutdown
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");

        info!("shutdown signal received, saving state");
        if let Err(e) = shutdown_state.save_to_disk() {
            error!("failed to save state: {}", e);
        }
        std::process::exit(0);
    });

    axum::serve(listener, app).await.unwrap();
}
