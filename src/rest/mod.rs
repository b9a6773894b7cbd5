// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local only by default.
//
// Endpoints (all under /api/v1):
//   GET    /health
//   POST   /auth/register                      (open)
//   POST   /auth/login                         (open)
//   GET    /users/{id}
//   DELETE /users/{id}
//   GET    /users/{id}/stats
//   POST   /users/{id}/badges/recompute        (admin)
//   GET    /users/{id}/goals
//   POST   /users/{id}/goals
//   PATCH  /users/{id}/goals/{goal_id}
//   DELETE /users/{id}/goals/{goal_id}
//   GET    /scenarios
//   POST   /scenarios                          (admin)
//   GET    /scenarios/{id}
//   POST   /scenarios/{id}/complete
//   GET    /scenarios/{id}/feedback
//   POST   /scenarios/{id}/feedback
//   GET    /assessments
//   POST   /assessments

pub mod auth;
pub mod routes;

use anyhow::Result;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::storage::UserRow;
use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let protected = Router::new()
        // Users
        .route(
            "/api/v1/users/{id}",
            get(routes::users::get_user).delete(routes::users::delete_user),
        )
        // Gamification
        .route("/api/v1/users/{id}/stats", get(routes::stats::get_stats))
        .route(
            "/api/v1/users/{id}/badges/recompute",
            post(routes::stats::recompute_badges),
        )
        // Goals
        .route(
            "/api/v1/users/{id}/goals",
            get(routes::goals::list_goals).post(routes::goals::create_goal),
        )
        .route(
            "/api/v1/users/{id}/goals/{goal_id}",
            patch(routes::goals::update_progress).delete(routes::goals::delete_goal),
        )
        // Scenario catalog
        .route(
            "/api/v1/scenarios",
            get(routes::scenarios::list_scenarios).post(routes::scenarios::create_scenario),
        )
        .route("/api/v1/scenarios/{id}", get(routes::scenarios::get_scenario))
        .route(
            "/api/v1/scenarios/{id}/complete",
            post(routes::scenarios::complete_scenario),
        )
        .route(
            "/api/v1/scenarios/{id}/feedback",
            get(routes::feedback::list_feedback).post(routes::feedback::create_feedback),
        )
        // Self-assessments
        .route(
            "/api/v1/assessments",
            get(routes::assessments::list_assessments).post(routes::assessments::submit_assessment),
        )
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::require_auth,
        ));

    Router::new()
        // Health and auth (no token)
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/auth/register", post(routes::auth::register))
        .route("/api/v1/auth/login", post(routes::auth::login))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Admin gate for catalog management and badge recompute.
pub(crate) fn require_admin(user: &UserRow) -> Result<(), Response> {
    if user.role == "admin" {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin access required" })),
        )
            .into_response())
    }
}

/// A caller may act on a user record when it is their own or they are admin.
/// Everyone else gets the same 404 a nonexistent user would — resource
/// existence is not leaked across accounts.
pub(crate) fn require_owner(user: &UserRow, path_user_id: &str) -> Result<(), crate::error::Error> {
    if user.id == path_user_id || user.role == "admin" {
        Ok(())
    } else {
        Err(crate::error::Error::NotFound("user"))
    }
}
