// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test oracle: triggers a deployment and seals the answer to the caller's
//! registry-format public key, the way an enclave answers a request.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use super::relay;
use crate::{
    crypto::{seal, PublicKeyEncoding},
    error::ApiError,
    state::AppState,
};

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SealQuery {
    /// Base64-wrapped SPKI PEM public key.
    pub public_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SealedResponse {
    /// Base64 RSA-OAEP ciphertext.
    pub data: String,
}

#[utoipa::path(
    get,
    path = "/api/test",
    params(SealQuery),
    tag = "Oracle",
    responses(
        (status = 200, body = SealedResponse),
        (status = 500, description = "Deployment endpoint missing or failed")
    )
)]
pub async fn deployment_test(
    State(state): State<AppState>,
    Query(query): Query<SealQuery>,
) -> Result<Json<SealedResponse>, ApiError> {
    let url = state
        .config
        .deployment_url
        .clone()
        .ok_or_else(|| ApiError::internal("ENCLAVE_DEPLOYMENT_URL is not set"))?;

    let deployment = relay(state.http.post(url.clone()).json(&json!({"number_of_enclaves": 1})))
        .await
        .map_err(|e| {
            warn!(url = %url, error = %e, "Deployment request failed");
            ApiError::internal(format!("Failed to deploy enclaves: {e}"))
        })?;

    let plaintext = match deployment {
        Value::String(text) => text,
        other => other.to_string(),
    };
    let data = seal(&query.public_key, PublicKeyEncoding::Base64Pem, plaintext.as_bytes())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    info!(url = %url, "Deployment details sealed to caller key");
    Ok(Json(SealedResponse { data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{open, DeploymentMetadata, DecryptedPayload};
    use crate::test_helpers::{service_state, spawn_upstream, test_key_pair};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn sealed_deployment_opens_as_metadata() {
        let upstream = spawn_upstream().await;
        let state = service_state(&[("ENCLAVE_DEPLOYMENT_URL", format!("{upstream}/deploy").as_str())]);
        let pair = test_key_pair();

        let Json(response) = deployment_test(
            State(state),
            Query(SealQuery {
                public_key: pair.public_key_encoded().to_string(),
            }),
        )
        .await
        .expect("sealed deployment");

        let payload = open(&response.data, pair.private_key_pem()).unwrap();
        assert_eq!(
            payload,
            DecryptedPayload::DeploymentMetadata(DeploymentMetadata {
                socket_server_url: "http://localhost:8000/deployment".to_string(),
                socket_room: "room-1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn missing_deployment_url_is_server_error() {
        let result = deployment_test(
            State(service_state(&[])),
            Query(SealQuery {
                public_key: test_key_pair().public_key_encoded().to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR),
            Ok(_) => panic!("expected missing URL to fail"),
        }
    }

    #[tokio::test]
    async fn invalid_public_key_is_server_error() {
        let upstream = spawn_upstream().await;
        let state = service_state(&[("ENCLAVE_DEPLOYMENT_URL", format!("{upstream}/deploy").as_str())]);

        let result = deployment_test(
            State(state),
            Query(SealQuery {
                public_key: "bm90IGEga2V5".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(err) if err.status == StatusCode::INTERNAL_SERVER_ERROR));
    }
}
