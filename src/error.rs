// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::crypto::CryptoError;
use crate::export::ExportError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::NotFound(msg) => ApiError::not_found(msg),
            ExportError::Conflict(msg) => ApiError::conflict(msg),
            ExportError::Crypto(CryptoError::Configuration(msg)) => {
                error!(error = %msg, "Credential encryption is not configured");
                ApiError::internal("Credential encryption is not configured")
            }
            ExportError::Crypto(CryptoError::Decryption(reason)) => {
                error!(reason, "Credential could not be decrypted");
                ApiError::internal("Credential could not be decrypted")
            }
            other => {
                error!(error = %other, "Request failed");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let conflict = ApiError::conflict("busy");
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn export_errors_map_to_status_codes() {
        let e: ApiError = ExportError::NotFound("No active export".into()).into();
        assert_eq!((e.status, e.message.as_str()), (StatusCode::NOT_FOUND, "No active export"));

        let e: ApiError = ExportError::Conflict("already running".into()).into();
        assert_eq!(e.status, StatusCode::CONFLICT);

        let e: ApiError = ExportError::Crypto(CryptoError::Decryption("authentication failed")).into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.message.contains("authentication"));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "/data/secret/path");
        let e: ApiError = ExportError::Io(io).into();
        assert_eq!(e.message, "Internal server error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::conflict("Export already in progress").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"Export already in progress"}"#);
    }
}
