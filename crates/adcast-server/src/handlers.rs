use adcast_core::ClickEvent;
use adcast_hub::catalog::random_tail;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::server::AppState;

const INVALID_REQUEST: &str = "Invalid request format";
const SAVE_FAILED: &str = "Failed to save click data";
const SAVED: &str = "Click data saved successfully";

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// `POST /ads/click`: validate and persist one click.
pub async fn record_click(
    State(state): State<AppState>,
    payload: Result<Json<ClickEvent>, JsonRejection>,
) -> Response {
    let Json(click) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::debug!(%rejection, "malformed click payload");
            return error(StatusCode::BAD_REQUEST, INVALID_REQUEST);
        }
    };
    if let Err(e) = click.validate() {
        tracing::debug!(ad_id = click.ad_id, error = %e, "invalid click payload");
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }

    let repo = state.clicks.clone();
    let ad_id = click.ad_id;
    match tokio::task::spawn_blocking(move || repo.insert(&click)).await {
        Ok(Ok(row_id)) => {
            tracing::info!(ad_id, row_id, "click recorded");
            (StatusCode::OK, Json(json!({ "message": SAVED }))).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(ad_id, error = %e, "failed to save click");
            error(StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED)
        }
        Err(e) => {
            tracing::error!(ad_id, error = %e, "click insert task failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED)
        }
    }
}

/// `GET /ads`: the catalog from a random index to its end.
pub async fn list_ads(State(state): State<AppState>) -> Response {
    let ads = random_tail(state.catalog.as_slice(), &mut rand::thread_rng());
    Json(ads).into_response()
}

/// `GET /health`: hub counters, or 503 once the hub has stopped.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "sessions": stats.sessions,
                "adsSubmitted": stats.ads_submitted,
                "deliveries": stats.deliveries,
                "drops": stats.drops,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        )
            .into_response(),
    }
}
