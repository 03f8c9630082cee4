// HTTP API routes (catalog, meta, players, deck building)

pub mod pages;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::Error;
use crate::metrics;
use crate::service::DeckService;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreatePlayerRequest {
    pub player_id: String,
}

#[derive(Deserialize)]
pub struct ImportTagRequest {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Deserialize)]
pub struct AddCardRequest {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub name: String,
    pub level: Option<u32>,
    #[serde(default)]
    pub evolution: bool,
}

#[derive(Deserialize)]
pub struct BuildDecksRequest {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub prompt: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DeckService>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "ok": false, "error": msg })))
}

/// HTTP status reported for each error kind.
pub fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::RecordNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) | Error::MissingData(_) => StatusCode::BAD_REQUEST,
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: Error) -> Response {
    let status = error_status(&e);
    if status.is_server_error() {
        tracing::error!("Request failed: {e}");
    }
    json_error(status, &e.to_string()).into_response()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(service: Arc<DeckService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        // Catalog and meta
        .route("/update_cards", post(update_cards))
        .route("/update_meta", post(update_meta))
        // Players
        .route("/players", get(list_players).post(create_player))
        .route("/players/import_tag", post(import_tag))
        .route("/players/add_card", post(add_card))
        .route("/players/{id}", get(get_player).delete(delete_player))
        // Decks
        .route("/build_decks", post(build_decks))
        .route("/debug/files", get(debug_files))
        .merge(pages::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "deck-builder" }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Catalog and meta handlers ─────────────────────────────────────────

async fn update_cards(State(state): State<AppState>) -> Response {
    match state.service.refresh_catalog().await {
        Ok(total) => (StatusCode::OK, Json(json!({ "updated": total }))).into_response(),
        Err(e) => error_response(e),
    }
}

// Raw body: malformed meta JSON is a 400 in the `{ok: false}` envelope.
async fn update_meta(State(state): State<AppState>, body: String) -> Response {
    match state.service.update_meta_text(&body).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Player handlers ───────────────────────────────────────────────────

async fn list_players(State(state): State<AppState>) -> Response {
    match state.service.list_players().await {
        Ok(players) => (StatusCode::OK, Json(json!({ "players": players }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_player(
    State(state): State<AppState>,
    Json(req): Json<CreatePlayerRequest>,
) -> Response {
    match state.service.create_player(&req.player_id).await {
        Ok(player) => (
            StatusCode::CREATED,
            Json(json!({ "ok": true, "player_id": player.player_id })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_player(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.get_player(&id).await {
        Ok(player) => (StatusCode::OK, Json(json!(player))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_player(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.delete_player(&id).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Ok(false) => error_response(Error::RecordNotFound(id.trim().to_lowercase())),
        Err(e) => error_response(e),
    }
}

async fn import_tag(State(state): State<AppState>, Json(req): Json<ImportTagRequest>) -> Response {
    if req.player_id.trim().is_empty() || req.tag.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "player_id and tag are required")
            .into_response();
    }
    match state.service.import_player(&req.player_id, &req.tag).await {
        Ok(cards) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "player_id": req.player_id.trim().to_lowercase(),
                "cards": cards,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Import of '{}' failed: {e}", req.tag.trim());
            error_response(e)
        }
    }
}

async fn add_card(State(state): State<AppState>, Json(req): Json<AddCardRequest>) -> Response {
    match state
        .service
        .add_card(&req.player_id, &req.name, req.level, req.evolution)
        .await
    {
        Ok(_) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Deck handlers ─────────────────────────────────────────────────────

async fn build_decks(
    State(state): State<AppState>,
    Json(req): Json<BuildDecksRequest>,
) -> Response {
    match state.service.build_decks(&req.player_id, &req.prompt).await {
        Ok(resp) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "decks": resp.decks })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Deck build for '{}' failed: {e}", req.player_id.trim());
            error_response(e)
        }
    }
}

async fn debug_files(State(state): State<AppState>) -> Response {
    match state.service.store_status().await {
        Ok(status) => (StatusCode::OK, Json(json!(status))).into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&Error::RecordNotFound("ana".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&Error::missing_data("no meta")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&Error::invalid_input("bad id")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&Error::ConfigurationMissing("API_KEY")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&Error::ModelUnavailable("empty".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_status(&Error::VendorRequestFailed {
                status: 403,
                body: "accessDenied".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }
}
