//! Admin API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use reqlog_capture::{
    CaptureOutcome, CompletionEvent, RecordQuery, ResponseOutcome, SortColumn, SortOrder,
    StoreError, DEFAULT_PAGE_SIZE,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{
    BulkDeleteRequest, BulkDeleteResponse, CaptureResponse, CleanupResponse, CompletionEventBody,
    ErrorResponse, HealthResponse, RequestDetail, RequestList, RequestListQuery, SettingsBody,
    MAX_PER_PAGE,
};
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn storage_error(e: StoreError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Database error: {}", e),
            code: Some("STORAGE_UNAVAILABLE".to_string()),
        }),
    )
}

fn bad_request(error: String, code: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error,
            code: Some(code.to_string()),
        }),
    )
}

fn not_found(id: i64) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Request '{}' not found", id),
            code: Some("REQUEST_NOT_FOUND".to_string()),
        }),
    )
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse)
    ),
    tag = "system"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let stored_requests = state.store.count(None).await.map_err(storage_error)?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stored_requests,
    }))
}

/// List stored requests
#[utoipa::path(
    get,
    path = "/api/requests",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Page of stored requests", body = RequestList),
        (status = 400, description = "Invalid sort parameters", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<RequestList>, ApiError> {
    debug!("Listing stored requests: {:?}", query);

    let order_by = match query.orderby.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<SortColumn>()
            .map_err(|e| bad_request(e, "INVALID_ORDERBY"))?,
        None => SortColumn::default(),
    };
    let order = match query.order.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<SortOrder>()
            .map_err(|e| bad_request(e, "INVALID_ORDER"))?,
        None => SortOrder::default(),
    };

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PER_PAGE);
    let search = query.s.unwrap_or_default();

    let record_query = RecordQuery::page(page, per_page)
        .with_search(search.clone())
        .sorted_by(order_by, order);

    let total = state
        .store
        .count(record_query.search.as_deref())
        .await
        .map_err(storage_error)?;
    let records = state
        .store
        .query(&record_query)
        .await
        .map_err(storage_error)?;

    Ok(Json(RequestList {
        items: records.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

/// Get one stored request
#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(
        ("id" = i64, Path, description = "Record ID")
    ),
    responses(
        (status = 200, description = "Stored request", body = RequestDetail),
        (status = 404, description = "Request not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<RequestDetail>, ApiError> {
    debug!("Getting stored request: {}", id);

    let record = state.store.get(id).await.map_err(storage_error)?;

    record
        .map(|r| Json(r.into()))
        .ok_or_else(|| not_found(id))
}

/// Delete one stored request
#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(
        ("id" = i64, Path, description = "Record ID")
    ),
    responses(
        (status = 204, description = "Request deleted"),
        (status = 404, description = "Request not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn delete_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    info!("Deleting stored request: {}", id);

    if state.store.delete_by_id(id).await.map_err(storage_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// Delete several stored requests
#[utoipa::path(
    post,
    path = "/api/requests/bulk-delete",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Per-id outcome", body = BulkDeleteResponse)
    ),
    tag = "requests"
)]
pub async fn bulk_delete_requests(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkDeleteRequest>,
) -> Json<BulkDeleteResponse> {
    info!("Bulk deleting {} stored requests", req.ids.len());

    Json(state.store.delete_many(&req.ids).await.into())
}

/// Report a completed outbound request
#[utoipa::path(
    post,
    path = "/api/events",
    request_body = CompletionEventBody,
    responses(
        (status = 200, description = "What the observer did with the event", body = CaptureResponse),
        (status = 400, description = "Malformed response object", body = ErrorResponse)
    ),
    tag = "capture"
)]
pub async fn submit_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CompletionEventBody>,
) -> Result<Json<CaptureResponse>, ApiError> {
    let response: ResponseOutcome = serde_json::from_value(body.response)
        .map_err(|e| bad_request(format!("Invalid response: {}", e), "INVALID_RESPONSE"))?;
    let event = CompletionEvent {
        url: body.url,
        request_args: body.request_args,
        response,
    };

    let outcome = state.observer.on_completion(&event).await;

    Ok(Json(match outcome {
        CaptureOutcome::NoMatch => CaptureResponse {
            outcome: "no_match".to_string(),
            pattern: None,
            id: None,
        },
        CaptureOutcome::Filtered { pattern, .. } => CaptureResponse {
            outcome: "filtered".to_string(),
            pattern: Some(pattern),
            id: None,
        },
        CaptureOutcome::Captured { pattern, id } => CaptureResponse {
            outcome: "captured".to_string(),
            pattern: Some(pattern),
            id: Some(id),
        },
        CaptureOutcome::StoreFailed { pattern, .. } => CaptureResponse {
            outcome: "store_failed".to_string(),
            pattern: Some(pattern),
            id: None,
        },
    }))
}

/// Run the retention cleanup now
#[utoipa::path(
    post,
    path = "/api/cleanup",
    responses(
        (status = 200, description = "Cleanup result", body = CleanupResponse)
    ),
    tag = "capture"
)]
pub async fn run_cleanup(State(state): State<Arc<AppState>>) -> Json<CleanupResponse> {
    info!("Manual records cleanup requested");

    Json(state.retention.run_once().await.into())
}

/// Current capture settings
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Capture settings", body = SettingsBody)
    ),
    tag = "settings"
)]
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsBody> {
    let settings = state.observer.settings().snapshot().await;
    let effective = state.observer.effective_patterns().await.into_patterns();

    Json(SettingsBody::from_settings(settings, effective))
}

/// Replace the capture settings
///
/// Applies to the next observed request without a restart.
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = SettingsBody,
    responses(
        (status = 200, description = "Updated settings", body = SettingsBody)
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SettingsBody>,
) -> Json<SettingsBody> {
    state.observer.settings().replace(body.into_settings()).await;

    get_settings(State(state)).await
}
