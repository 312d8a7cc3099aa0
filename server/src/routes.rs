use crate::{
    auth::{bearer_token, AdminContext},
    error::AppError,
    state::AppState,
    ws::ws_handler,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    gate::GrantRequest,
    protocol::{GrantOutcome, LoginRequest, LoginResponse, Standings},
};
use std::path::Path;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/grants", post(grant))
        .route("/ws", get(ws_handler));

    let app = match static_dir {
        // Built web client with SPA fallback, e.g. `web/dist` from Trunk
        Some(dir) => api.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => api,
    };

    app.layer(CorsLayer::permissive()).with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Standings>, AppError> {
    let standings = state.service.standings(params.search.as_deref()).await?;
    Ok(Json(standings))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let ctx = state
        .credentials
        .verify(&body.username, &body.password)
        .ok_or(AppError::Unauthorized)?;
    let admin = ctx.admin.clone();
    let token = state.sessions.issue(ctx);
    Ok(Json(LoginResponse { token, admin }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        if state.sessions.revoke(token) {
            info!("Session revoked");
        }
    }
    StatusCode::NO_CONTENT
}

async fn grant(
    State(state): State<AppState>,
    ctx: AdminContext,
    Json(request): Json<GrantRequest>,
) -> Result<Json<GrantOutcome>, AppError> {
    let now = chrono::Local::now().naive_local();
    let outcome = state.service.grant(&ctx, &request, now).await?;
    if matches!(outcome, GrantOutcome::Applied { .. }) {
        state.publish_standings().await;
    }
    Ok(Json(outcome))
}
