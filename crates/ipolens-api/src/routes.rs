use crate::{auth_handlers, handlers, log_handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health))
        // Accounts
        .route("/api/auth/register", post(auth_handlers::register))
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/me", get(auth_handlers::me))
        .route("/api/auth/upgrade", post(auth_handlers::upgrade))
        // Research
        .route("/api/ipo/analyze", post(handlers::analyze))
        .route("/api/ipo/history", get(handlers::history))
        .route("/api/ipo/assistant", post(handlers::assistant))
        // Audit log
        .route(
            "/api/logs",
            get(log_handlers::list_logs)
                .post(log_handlers::append_log)
                .delete(log_handlers::clear_logs),
        )
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}
