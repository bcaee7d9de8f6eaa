// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    export::{
        service::{FilePayload, RevealedCredential},
        ExportResult, ExportStatusView, StartedExport,
    },
    render::DocumentFormat,
    state::AppState,
    storage::{ExportStatus, RenderFailure},
};

pub mod actor;
pub mod credentials;
pub mod documents;
pub mod exports;
pub mod health;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/orgs/{org_id}/export", post(exports::start_export))
        .route("/orgs/{org_id}/export/cancel", post(exports::cancel_export))
        .route("/orgs/{org_id}/export/status", get(exports::export_status))
        .route("/orgs/{org_id}/export/download", get(exports::download_export))
        .route(
            "/orgs/{org_id}/export/regenerate",
            post(exports::regenerate_export),
        )
        .route(
            "/orgs/{org_id}/credentials/{credential_id}/reveal",
            post(credentials::reveal_credential),
        )
        .route(
            "/orgs/{org_id}/documents/{document_id}/export",
            get(documents::export_document),
        );

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run blocking service work (file reads, rendering) off the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> ExportResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "Blocking task failed");
            Err(ApiError::internal("Internal server error"))
        }
    }
}

/// Attachment response for a generated file.
pub(crate) fn file_response(payload: FilePayload) -> Response {
    let mut response = (StatusCode::OK, payload.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(payload.content_type),
    );
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&payload.file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// Bytes left unescaped in an RFC 5987 `filename*` value.
const FILENAME_STAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if fallback == file_name {
        return format!("attachment; filename=\"{file_name}\"");
    }

    let encoded = utf8_percent_encode(file_name, FILENAME_STAR);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[derive(OpenApi)]
#[openapi(
    paths(
        exports::start_export,
        exports::cancel_export,
        exports::export_status,
        exports::download_export,
        exports::regenerate_export,
        credentials::reveal_credential,
        documents::export_document,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            StartedExport,
            ExportStatusView,
            ExportStatus,
            RenderFailure,
            RevealedCredential,
            DocumentFormat,
            exports::CancelExportResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Exports", description = "Organization export jobs"),
        (name = "Credentials", description = "Credential secret reveal"),
        (name = "Documents", description = "Single-document downloads"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app_with_state() -> (TempDir, AppState, Router) {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().to_string_lossy().into_owned();
        let config = Config::from_lookup(|name| (name == "DATA_DIR").then(|| data_dir.clone())).unwrap();
        let state = AppState::open(&config).unwrap();
        let app = router(state.clone());
        (temp, state, app)
    }

    fn app() -> (TempDir, Router) {
        let (temp, _, app) = app_with_state();
        (temp, app)
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn liveness_and_health() {
        let (_temp, app) = app();
        let (status, body) = send(app.clone(), "GET", "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["data_dir"], "ok");
        assert_eq!(body["checks"]["encryption"], "missing");
        assert_eq!(body["checks"]["export_workers_available"], 2);
    }

    #[tokio::test]
    async fn status_of_unexported_org() {
        let (_temp, app) = app();
        let (status, body) = send(app, "GET", "/v1/orgs/7/export/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exists"], false);
        assert_eq!(body["has_file"], false);
    }

    #[tokio::test]
    async fn missing_resources_are_json_404s() {
        let (_temp, app) = app();
        for (method, uri) in [
            ("POST", "/v1/orgs/7/export/cancel"),
            ("GET", "/v1/orgs/7/export/download"),
            ("POST", "/v1/orgs/7/credentials/1/reveal"),
            ("GET", "/v1/orgs/7/documents/1/export?format=pdf"),
        ] {
            let (status, body) = send(app.clone(), method, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert!(body["error"].is_string(), "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn unknown_format_is_a_bad_request() {
        let (_temp, app) = app();
        let (status, body) = send(app, "GET", "/v1/orgs/7/documents/1/export?format=exe").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn start_returns_accepted() {
        let (_temp, app) = app();
        let (status, body) = send(app.clone(), "POST", "/v1/orgs/7/export").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["progress"], 0);
        assert!(body["job_id"].is_string());
    }

    #[tokio::test]
    async fn cancel_and_status_report_the_active_job() {
        let (_temp, state, app) = app_with_state();
        let pending = state.exports.ledger().start_export(7, None).unwrap();

        let (status, body) = send(app.clone(), "POST", "/v1/orgs/7/export/cancel").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["job_id"], pending.id.as_str());

        let (status, body) = send(app, "GET", "/v1/orgs/7/export/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exists"], true);
        assert_eq!(body["status"], "cancelled");
        assert_eq!(body["job_id"], pending.id.as_str());
    }

    #[tokio::test]
    async fn regenerate_while_active_is_a_conflict() {
        let (_temp, state, app) = app_with_state();
        state.exports.ledger().start_export(7, None).unwrap();

        let (status, body) = send(app, "POST", "/v1/orgs/7/export/regenerate").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (_temp, app) = app();
        let (status, body) = send(app, "GET", "/api-doc/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/v1/orgs/{org_id}/export"].is_object());
    }

    #[test]
    fn disposition_escapes_non_ascii_names() {
        assert_eq!(
            content_disposition("Handbook.pdf"),
            "attachment; filename=\"Handbook.pdf\""
        );
        assert_eq!(
            content_disposition("Überblick.md"),
            "attachment; filename=\"_berblick.md\"; filename*=UTF-8''%C3%9Cberblick.md"
        );
        assert_eq!(
            content_disposition("Café \"Q1\".pdf"),
            "attachment; filename=\"Caf_ _Q1_.pdf\"; filename*=UTF-8''Caf%C3%A9%20%22Q1%22.pdf"
        );
    }
}
