//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/metrics` : persisted store rendered in exposition format

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use promfile_core::{text, Storage};

use crate::app_state::AppState;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let store = state.store();

    // file I/O stays off the async workers
    let rendered = tokio::task::spawn_blocking(move || {
        store
            .collect()
            .map(|snap| text::render(snap.families(), store.config().help))
    })
    .await;

    match rendered {
        Ok(Ok(body)) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, code = e.code().as_str(), "collect failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.code().as_str()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "collect task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL").into_response()
        }
    }
}
