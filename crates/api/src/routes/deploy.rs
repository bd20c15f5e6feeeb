//! Upload forwarding route.
//!
//! `POST /deploy` takes a multipart form with a `file` part and optional text
//! fields, spools the file to disk while enforcing the size limit, and hands
//! it to the orchestrator.

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, State,
        multipart::{Field, Multipart, MultipartError, MultipartRejection},
    },
    http::{HeaderMap, header::CONTENT_LENGTH},
    routing::post,
};
use serde::Serialize;
use tgrelay_core::deploy::{DeployError, DeployRequest};
use tgrelay_core::remote::{MessageId, MessagingClient};
use tgrelay_core::storage::SpooledUpload;
use tgrelay_shared::AppError;
use tracing::{debug, info};

use crate::{AppState, error::ApiError};

/// Allowance for multipart framing and text fields on top of the file size.
pub const FORM_OVERHEAD: u64 = 1024 * 1024;

/// Maximum size of a single text field.
pub const TEXT_FIELD_LIMIT: usize = 64 * 1024;

/// Filename used when the client sends none.
const FALLBACK_FILENAME: &str = "unknown_file";

/// Creates the deploy routes.
pub fn routes<C: MessagingClient + 'static>() -> Router<AppState<C>> {
    Router::new()
        .route("/deploy", post(deploy::<C>))
        .layer(DefaultBodyLimit::disable())
}

// ============================================================================
// Response Types
// ============================================================================

/// Response for a delivered upload.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    /// Always `true`.
    pub success: bool,
    /// Always `"ok"`.
    pub status: &'static str,
    /// Identifier of the delivered message.
    pub message_id: MessageId,
    /// Filename as supplied by the client.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Size in MiB, two decimals.
    pub size_mb: f64,
    /// Absolute path of the retained copy, when `keep` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_path: Option<String>,
    /// Human-readable summary.
    pub message: String,
}

/// Size in MiB rounded to two decimals.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn size_mb(size: u64) -> f64 {
    (size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Parse a form boolean.
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off` in any case. An empty
/// value is `false`.
pub fn parse_flag(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(AppError::Validation(format!(
            "field '{name}' must be a boolean, got '{other}'"
        ))),
    }
}

fn multipart_error(err: &MultipartError) -> AppError {
    AppError::Validation(format!("malformed multipart body: {}", err.body_text()))
}

fn header_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

async fn read_text(mut field: Field<'_>, name: &str) -> Result<String, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e))? {
        if buf.len() + chunk.len() > TEXT_FIELD_LIMIT {
            return Err(AppError::Validation(format!(
                "field '{name}' exceeds {TEXT_FIELD_LIMIT} bytes"
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf)
        .map_err(|_| AppError::Validation(format!("field '{name}' is not valid UTF-8")))
}

async fn spool_file<C: MessagingClient>(
    state: &AppState<C>,
    mut field: Field<'_>,
) -> Result<SpooledUpload, ApiError> {
    let filename = field
        .file_name()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_FILENAME)
        .to_string();
    let declared = header_length(field.headers());

    info!(filename = %filename, declared_size = ?declared, "Receiving upload");
    let mut spool = state.deploy.begin_upload(&filename, declared).await?;

    let mut chunks = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e))? {
        chunks += 1;
        spool.write(chunk).await.map_err(DeployError::from)?;
    }
    debug!(filename = %filename, chunks, size = spool.written(), "Upload spooled");

    Ok(spool.finish().await.map_err(DeployError::from)?)
}

/// POST `/deploy` - Forward an uploaded file to a chat.
async fn deploy<C: MessagingClient + 'static>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DeployResponse>, ApiError> {
    let max = state.deploy.max_file_size();
    if let Some(length) = header_length(&headers) {
        if length > max.saturating_add(FORM_OVERHEAD) {
            return Err(DeployError::PayloadTooLarge { size: length, max }.into());
        }
    }

    let mut multipart = multipart.map_err(|e| {
        AppError::Validation(format!("expected a multipart/form-data body: {}", e.body_text()))
    })?;

    let mut request = DeployRequest::default();
    let mut upload: Option<SpooledUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if upload.is_some() {
                    return Err(
                        AppError::Validation("only one file part is allowed".into()).into(),
                    );
                }
                upload = Some(spool_file(&state, field).await?);
            }
            "caption" => request.caption = Some(read_text(field, &name).await?),
            "group_id" => request.destination = Some(read_text(field, &name).await?),
            "bot_token" => request.credential = Some(read_text(field, &name).await?),
            "button_text" => request.button_text = Some(read_text(field, &name).await?),
            "button_url" => request.button_url = Some(read_text(field, &name).await?),
            "button_active" => {
                request.button_active = parse_flag(&name, &read_text(field, &name).await?)?;
            }
            "keep" => request.keep = parse_flag(&name, &read_text(field, &name).await?)?,
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let upload = upload
        .ok_or_else(|| AppError::Validation("multipart field 'file' is required".into()))?;

    let outcome = state.deploy.deploy(request, upload).await?;

    Ok(Json(DeployResponse {
        success: true,
        status: "ok",
        message_id: outcome.message_id,
        message: format!(
            "File '{}' uploaded and sent to {}.",
            outcome.filename, outcome.destination
        ),
        size_mb: size_mb(outcome.size),
        size: outcome.size,
        stored_path: outcome.stored_path.map(|p| p.display().to_string()),
        filename: outcome.filename,
    }))
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
