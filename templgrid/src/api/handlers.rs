//! API request handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::TemplgridError;
use crate::sender::{EmailQueue, EmailRequest};
use crate::templates::TemplateRegistry;

/// Shared application state
pub struct AppState {
    pub registry: Arc<TemplateRegistry>,
    /// Present when the send API is enabled
    pub queue: Option<EmailQueue>,
    pub api_key: String,
}

/// Error body: `{"ok": false, "error": "..."}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub ok: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            ok: false,
            error: msg.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub templates: usize,
}

#[derive(Debug, Serialize)]
pub struct LocaleList {
    pub locales: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub locale: String,
    pub templates: Vec<String>,
}

fn reject(status: StatusCode, msg: &str) -> Response {
    (status, Json(ApiError::new(msg))).into_response()
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        templates: state.registry.len(),
    })
}

/// POST /email - validate a send request and queue it
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return reject(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
    }

    let request: EmailRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to decode send request: {}", e);
            return reject(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    if let Err(e) = request.validate() {
        warn!("Invalid send request for {}: {}", request.template_name, e);
        return reject(StatusCode::BAD_REQUEST, &e.to_string());
    }

    if let Err(e) = state.registry.ensure_exists(&request.template_name) {
        warn!("Invalid send request: {}", e);
        return reject(StatusCode::BAD_REQUEST, &e.to_string());
    }

    let Some(queue) = &state.queue else {
        return reject(StatusCode::SERVICE_UNAVAILABLE, "Sending is disabled");
    };

    let name = request.template_name.clone();
    match queue.push(request) {
        Ok(()) => {
            info!("New email '{}' pushed to queue", name);
            (
                StatusCode::OK,
                Json(QueuedResponse {
                    ok: true,
                    message: "Message successfully queued".to_string(),
                }),
            )
                .into_response()
        }
        Err(e @ (TemplgridError::QueueFull | TemplgridError::QueueClosed)) => {
            warn!("Email '{}' rejected: {}", name, e);
            reject(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
        Err(e) => {
            error!("Failed to queue email '{}': {}", name, e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// GET /preview - known locale codes
pub async fn preview_locales(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LocaleList {
        locales: state.registry.snapshot().locales().codes(),
    })
}

/// GET /preview/:locale - template names
pub async fn preview_templates(
    State(state): State<Arc<AppState>>,
    Path(locale): Path<String>,
) -> Response {
    let snapshot = state.registry.snapshot();
    if let Err(e) = snapshot.locales().resolve(&locale) {
        return reject(StatusCode::NOT_FOUND, &e.to_string());
    }

    Json(TemplateList {
        locale,
        templates: snapshot.templates().map(|t| t.name.clone()).collect(),
    })
    .into_response()
}

/// GET /preview/:locale/:name - rendered HTML body
pub async fn preview_template(
    State(state): State<Arc<AppState>>,
    Path((locale, name)): Path<(String, String)>,
) -> Response {
    match state.registry.build(&name, &locale, &serde_json::Value::Null) {
        Ok(result) => Html(result.html).into_response(),
        Err(e) if e.is_not_found() => reject(StatusCode::NOT_FOUND, &e.to_string()),
        Err(e) => {
            error!("Preview of {} failed: {}", name, e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
