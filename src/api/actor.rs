// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Caller identity for audit records.
//!
//! Requests reach this service through an authenticating gateway that
//! forwards the user id in `X-User-Id`. The value is recorded as `created_by`
//! and in audit events; it is never used for access decisions.
//!
//! ```rust,ignore
//! async fn handler(Actor(user): Actor) -> impl IntoResponse {
//!     // user is Option<String>
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the calling user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Longest user id accepted; longer values are ignored.
const MAX_USER_ID_LEN: usize = 128;

/// The calling user, if the gateway identified one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor(pub Option<String>);

impl Actor {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_USER_ID_LEN)
            .map(str::to_string);
        Ok(Actor(user))
    }
}
