// src/api.rs
//! HTTP surface: a thin shim around the extraction pipeline and the
//! record store. The browser UI is served as static files.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::aggregate;
use crate::config::Settings;
use crate::error::ExtractError;
use crate::export;
use crate::model::BrandGroup;
use crate::pipeline::Orchestrator;
use crate::store::RecordStore;
use crate::vision::ArkVisionClient;

/// Base64 screenshots are large; allow well beyond the axum default.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    store: Arc<RecordStore>,
    orchestrator: Option<Arc<Orchestrator>>,
    ui_dir: String,
}

impl AppState {
    /// Build production state. A missing API key leaves the extractor
    /// unconfigured: record queries still work, extraction answers 500.
    pub fn new(settings: &Settings) -> Self {
        let orchestrator = match ArkVisionClient::new(&settings.vision) {
            Ok(client) => Some(Arc::new(Orchestrator::new(
                Arc::new(client),
                settings.max_concurrency,
            ))),
            Err(e) => {
                tracing::warn!(error = %e, "vision backend unavailable");
                None
            }
        };
        Self {
            store: Arc::new(RecordStore::new(settings.records_path.clone())),
            orchestrator,
            ui_dir: settings.ui_dir.clone(),
        }
    }

    /// Assemble state from parts; tests inject scripted backends here.
    pub fn with_parts(
        store: Arc<RecordStore>,
        orchestrator: Option<Arc<Orchestrator>>,
        ui_dir: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            ui_dir: ui_dir.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let ui = ServeDir::new(state.ui_dir.clone());
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/ocr", post(extract_batch))
        .route("/api/records", get(list_records))
        .route("/api/records/{date}", get(get_record).delete(delete_record))
        .route("/api/records/{date}/export", get(export_record))
        .route("/api/records/month/{year}/{month}", get(list_month))
        .fallback_service(ui)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct ExtractResp {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<BrandGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

async fn extract_batch(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let images = match parse_images(&body) {
        Ok(images) => images,
        Err(msg) => return extract_error(StatusCode::BAD_REQUEST, msg),
    };
    let date = match requested_date(&body) {
        Ok(date) => date,
        Err(msg) => return extract_error(StatusCode::BAD_REQUEST, msg),
    };

    let Some(orchestrator) = state.orchestrator.clone() else {
        return extract_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("server error: {}", ExtractError::MissingApiKey),
        );
    };

    let outcome = match orchestrator.run_batch(images).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_terminal() => {
            return extract_error(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => {
            tracing::error!(error = %e, "extraction batch failed");
            return extract_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("server error: {e}"),
            );
        }
    };

    tracing::info!(
        images = outcome.images,
        succeeded = outcome.succeeded_images(),
        "extraction batch finished"
    );

    let errors = outcome.errors;
    let incoming = aggregate::merge_within_batch(outcome.cards);

    // Merge into the day's record only when the batch extracted at least
    // one card, and answer with the whole updated day. A batch with zero
    // cards never creates the day.
    let mut data: Option<Vec<BrandGroup>> = None;
    if !incoming.is_empty() {
        match state
            .store
            .update(&date, |existing| aggregate::merge_across_days(existing, incoming))
        {
            Ok(record) => data = Some(record.brands),
            Err(e) => {
                tracing::error!(error = %e, date = %date, "saving merged record failed");
                return extract_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server error: storage failure".to_string(),
                );
            }
        }
    }

    let resp = ExtractResp {
        success: errors.is_empty(),
        data,
        errors: if errors.is_empty() { None } else { Some(errors) },
    };
    (StatusCode::OK, Json(resp)).into_response()
}

async fn list_records(State(state): State<AppState>) -> Response {
    match state.store.list_dates() {
        Ok(dates) => Json(json!({ "dates": dates })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_record(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    match state.store.get(&date) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => record_not_found(),
        Err(e) => storage_error(e),
    }
}

async fn delete_record(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    match state.store.delete(&date) {
        Ok(deleted) => Json(json!({ "deleted": deleted })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn list_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Response {
    match state.store.list_dates_in_month(year, month) {
        Ok(dates) => Json(json!({ "dates": dates })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn export_record(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    let record = match state.store.get(&date) {
        Ok(Some(record)) => record,
        Ok(None) => return record_not_found(),
        Err(e) => return storage_error(e),
    };
    match export::export_workbook(&record) {
        Ok(bytes) => {
            let headers = [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                        .to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"{}\"",
                        export::export_filename(&date)
                    ),
                ),
            ];
            (headers, bytes).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, date = %date, "workbook export failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "export failed" })),
            )
                .into_response()
        }
    }
}

fn parse_images(body: &Value) -> Result<Vec<String>, String> {
    let Some(raw) = body.get("images") else {
        return Err("images is required".to_string());
    };
    let Some(list) = raw.as_array() else {
        return Err("images must be an array of base64 strings".to_string());
    };
    if list.is_empty() {
        return Err("upload at least one image".to_string());
    }
    let mut images = Vec::with_capacity(list.len());
    for item in list {
        match item.as_str() {
            Some(s) => images.push(s.to_string()),
            None => return Err("images must be an array of base64 strings".to_string()),
        }
    }
    Ok(images)
}

/// The day to merge into: the request's `date` when present, else today.
/// The parsed date is re-rendered, so the store key is always the
/// zero-padded "YYYY-MM-DD" form even when the client sends "2025-1-5".
fn requested_date(body: &Value) -> Result<String, String> {
    match body.get("date") {
        None | Some(Value::Null) => Ok(today()),
        Some(Value::String(s)) => match chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Ok(d.format("%Y-%m-%d").to_string()),
            Err(_) => Err(format!("invalid date: {s}")),
        },
        Some(_) => Err("date must be a YYYY-MM-DD string".to_string()),
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn extract_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({ "success": false, "errors": [message] })),
    )
        .into_response()
}

fn record_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no record for this date" })),
    )
        .into_response()
}

fn storage_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "storage failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "storage failure" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_must_be_a_non_empty_string_array() {
        assert!(parse_images(&json!({})).is_err());
        assert!(parse_images(&json!({ "images": "abc" })).is_err());
        assert!(parse_images(&json!({ "images": [] })).is_err());
        assert!(parse_images(&json!({ "images": [1, 2] })).is_err());
        assert_eq!(
            parse_images(&json!({ "images": ["a", "b"] })).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn date_defaults_to_today_and_rejects_garbage() {
        let today = today();
        assert_eq!(requested_date(&json!({})).unwrap(), today);
        assert_eq!(requested_date(&json!({ "date": null })).unwrap(), today);
        assert_eq!(
            requested_date(&json!({ "date": "2025-01-15" })).unwrap(),
            "2025-01-15"
        );
        assert!(requested_date(&json!({ "date": "15/01/2025" })).is_err());
        assert!(requested_date(&json!({ "date": "2025-13-40" })).is_err());
        assert!(requested_date(&json!({ "date": 20250115 })).is_err());
    }

    #[test]
    fn unpadded_date_canonicalizes_to_zero_padded_form() {
        assert_eq!(
            requested_date(&json!({ "date": "2025-1-5" })).unwrap(),
            "2025-01-05"
        );
        assert_eq!(
            requested_date(&json!({ "date": "2025-01-05" })).unwrap(),
            "2025-01-05"
        );
    }
}
