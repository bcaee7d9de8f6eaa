// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

use axum::{
    extract::{Path, State},
    Json,
};

use super::{actor::Actor, blocking};
use crate::{error::ApiError, export::service::RevealedCredential, state::AppState};

/// Decrypt one credential's password and 2FA seed.
///
/// Every reveal is written to the audit log.
#[utoipa::path(
    post,
    path = "/v1/orgs/{org_id}/credentials/{credential_id}/reveal",
    tag = "Credentials",
    params(
        ("org_id" = i64, Path, description = "Organization ID"),
        ("credential_id" = i64, Path, description = "Credential ID")
    ),
    responses(
        (status = 200, description = "Decrypted secrets", body = RevealedCredential),
        (status = 404, description = "Credential not found"),
        (status = 500, description = "Encryption not configured or token undecryptable")
    )
)]
pub async fn reveal_credential(
    Actor(user): Actor,
    State(state): State<AppState>,
    Path((org_id, credential_id)): Path<(i64, i64)>,
) -> Result<Json<RevealedCredential>, ApiError> {
    let exports = state.exports.clone();
    let revealed =
        blocking(move || exports.reveal_credential(org_id, credential_id, user.as_deref())).await?;
    Ok(Json(revealed))
}
