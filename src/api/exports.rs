// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Organization export API endpoints.
//!
//! Starting or regenerating an export returns `202 Accepted` immediately;
//! clients poll the status endpoint until the job reaches a terminal state.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{actor::Actor, blocking, file_response};
use crate::{
    error::ApiError,
    export::{ExportStatusView, StartedExport},
    state::AppState,
};

/// Response after cancelling an export.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelExportResponse {
    pub ok: bool,
    /// The job that was cancelled.
    pub job_id: String,
}

/// Start a background export of the organization.
#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/export",
    tag = "Exports",
    params(("org_id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 202, description = "Export queued", body = StartedExport),
        (status = 409, description = "An export is already pending or processing"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn start_export(
    Actor(user): Actor,
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<(StatusCode, Json<StartedExport>), ApiError> {
    let exports = state.exports.clone();
    let started = blocking(move || {
        exports
            .start_export(org_id, user.as_deref())
            .map(|(started, _)| started)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

/// Cancel the organization's active export.
#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/export/cancel",
    tag = "Exports",
    params(("org_id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Export cancelled", body = CancelExportResponse),
        (status = 404, description = "No active export")
    )
)]
pub async fn cancel_export(
    Actor(user): Actor,
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<Json<CancelExportResponse>, ApiError> {
    let exports = state.exports.clone();
    let job = blocking(move || exports.cancel_export(org_id, user.as_deref())).await?;
    Ok(Json(CancelExportResponse {
        ok: true,
        job_id: job.id,
    }))
}

/// Status of the organization's most recent export.
#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/export/status",
    tag = "Exports",
    params(("org_id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Latest export status", body = ExportStatusView)
    )
)]
pub async fn export_status(
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<Json<ExportStatusView>, ApiError> {
    let exports = state.exports.clone();
    let status = blocking(move || exports.get_export_status(org_id)).await?;
    Ok(Json(status))
}

/// Download the archive of the most recent completed export.
#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/export/download",
    tag = "Exports",
    params(("org_id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 404, description = "No completed export with an archive")
    )
)]
pub async fn download_export(
    Actor(user): Actor,
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<Response, ApiError> {
    let exports = state.exports.clone();
    let payload = blocking(move || exports.download_export(org_id, user.as_deref())).await?;
    Ok(file_response(payload))
}

/// Delete previous exports of the organization and start a new one.
#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/export/regenerate",
    tag = "Exports",
    params(("org_id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 202, description = "Export queued", body = StartedExport),
        (status = 409, description = "An export is still pending or processing")
    )
)]
pub async fn regenerate_export(
    Actor(user): Actor,
    State(state): State<AppState>,
    Path(org_id): Path<i64>,
) -> Result<(StatusCode, Json<StartedExport>), ApiError> {
    let exports = state.exports.clone();
    let started = blocking(move || {
        exports
            .regenerate_export(org_id, user.as_deref())
            .map(|(started, _)| started)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}
