//! HTTP routes

use crate::render;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use ota_core::{OtaCore, STATUS_TAIL};
use ota_types::FetchRequest;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

type SharedState = Arc<OtaCore>;

/// Build the router over a shared core
pub fn router(core: OtaCore) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/fetch-status", get(handle_fetch_status))
        .route("/fetch", post(handle_fetch))
        .route("/*filename", get(handle_download))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(core))
}

/// Form posted by the fetch button
#[derive(Debug, Deserialize)]
pub struct FetchForm {
    #[serde(default)]
    pub keyword: Option<String>,
}

/// GET / - archive links and the fetch form
async fn handle_index(State(core): State<SharedState>) -> Response {
    match core.artifacts().await {
        Ok(artifacts) => Html(render::index_page(&artifacts)).into_response(),
        Err(e) => {
            warn!("Failed to list storage directory: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list firmware").into_response()
        }
    }
}

/// GET /fetch-status - tail of the latest fetch log
async fn handle_fetch_status(State(core): State<SharedState>) -> Html<String> {
    Html(render::status_page(&core.fetch_status(STATUS_TAIL)))
}

/// POST /fetch - runs the whole fetch before redirecting
async fn handle_fetch(
    State(core): State<SharedState>,
    form: Option<Form<FetchForm>>,
) -> Redirect {
    // a POST without a form body fetches with no keyword
    let keyword = form.and_then(|Form(form)| form.keyword);
    let request = FetchRequest::new(keyword.as_deref());
    info!("Fetch requested (keyword: {:?})", request.keyword());

    // own task: dropping the connection must not cancel the fetch
    let fetch = tokio::spawn(async move { core.fetch(&request).await });
    if let Err(e) = fetch.await {
        warn!("Fetch task failed: {}", e);
    }

    Redirect::to("/")
}

/// GET /<filename> - paced download of one archive
async fn handle_download(
    State(core): State<SharedState>,
    Path(filename): Path<String>,
) -> Response {
    match core.open_artifact(&filename).await {
        Ok(stream) => {
            info!("Serving {} at {}", filename, core.rate());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/octet-stream")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Err(e) if e.is_not_found() => {
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => {
            warn!("Failed to open {}: {}", filename, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to open file").into_response()
        }
    }
}
