// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{actor::Actor, blocking, file_response};
use crate::{error::ApiError, render::DocumentFormat, state::AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportFormatQuery {
    /// One of `markdown` (`md`), `pdf`, `docx` (`word`), `rtf`
    pub format: DocumentFormat,
}

/// Render a single document as a file download.
#[utoipa::path(
    get,
    path = "/v1/orgs/{org_id}/documents/{document_id}/export",
    tag = "Documents",
    params(
        ("org_id" = i64, Path, description = "Organization ID"),
        ("document_id" = i64, Path, description = "Document ID"),
        ExportFormatQuery
    ),
    responses(
        (status = 200, description = "Rendered document"),
        (status = 400, description = "Unknown format"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn export_document(
    Actor(user): Actor,
    State(state): State<AppState>,
    Path((org_id, document_id)): Path<(i64, i64)>,
    query: Result<Query<ExportFormatQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let exports = state.exports.clone();
    let payload = blocking(move || {
        exports.render_document(org_id, document_id, query.format, user.as_deref())
    })
    .await?;
    Ok(file_response(payload))
}
