// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors raised by the clean room request flow.
///
/// A result that the enclave has not produced yet is not an error; see
/// [`crate::blockchain::FetchOutcome::Pending`].
#[derive(Debug, thiserror::Error)]
pub enum CleanRoomError {
    #[error("No wallet provider available")]
    WalletUnavailable,

    #[error("Wallet access was rejected")]
    UserRejected,

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Enclave details not available after {attempts} attempts. Please try again later.")]
    NotAvailable { attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Please generate a key pair first")]
    NoKeyPair,

    #[error("A key pair has already been generated for this session")]
    KeyPairExists,

    #[error("Failed to generate keys: {0}")]
    KeyGeneration(String),

    #[error("Invalid base64 payload: {0}")]
    Decode(String),

    #[error("Failed to import key: {0}")]
    KeyImport(String),

    #[error("Failed to decrypt data: {0}")]
    Decrypt(String),

    #[error("Failed to encrypt data: {0}")]
    Encrypt(String),

    #[error("Deployment channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// The opaque failure every enclave route reports to callers.
    pub fn enclave() -> Self {
        Self::internal("Error from within the enclave!")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody { msg: self.message });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let enclave = ApiError::enclave();
        assert_eq!(enclave.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(enclave.message, "Error from within the enclave!");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("Key pair already generated").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"msg":"Key pair already generated"}"#);
    }

    #[test]
    fn not_available_message_names_attempts() {
        let err = CleanRoomError::NotAvailable { attempts: 4 };
        assert_eq!(
            err.to_string(),
            "Enclave details not available after 4 attempts. Please try again later."
        );
    }
}
