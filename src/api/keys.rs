// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    crypto::{KeyPair, PublicKeyEncoding},
    error::ApiError,
    state::AppState,
};

/// Header selecting the caller's key session.
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    /// SPKI PEM public key.
    pub public_key: String,
    /// Session the key pair belongs to; send it back in `x-session-id`.
    pub session_id: String,
}

/// Generate the session's RSA key pair and return the public half.
///
/// Without an `x-session-id` header a new session is opened. Sessions are
/// bounded; the oldest is forgotten once `KEY_SESSION_CAPACITY` is reached.
#[utoipa::path(
    get,
    path = "/get-public-key",
    tag = "Keys",
    params(("x-session-id" = Option<String>, Header, description = "Key session")),
    responses(
        (status = 200, body = PublicKeyResponse),
        (status = 400, description = "Key pair already generated for this session")
    )
)]
pub async fn get_public_key(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if state.keys.read().await.has_key(&session_id) {
        return Err(ApiError::bad_request("Key pair already generated"));
    }

    let key_pair = tokio::task::spawn_blocking(|| KeyPair::generate(PublicKeyEncoding::Pem))
        .await
        .map_err(|e| e.to_string())
        .and_then(|generated| generated.map_err(|e| e.to_string()))
        .map_err(|e| {
            warn!(session_id = %session_id, error = %e, "Key generation failed");
            ApiError::enclave()
        })?;

    state
        .keys
        .write()
        .await
        .insert_key(&session_id, key_pair.private_key_pem())?;
    info!(session_id = %session_id, "Session key pair generated");

    Ok(Json(PublicKeyResponse {
        public_key: key_pair.public_key_encoded().to_string(),
        session_id,
    }))
}
