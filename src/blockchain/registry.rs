// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request submission, request listing and result polling on top of the
//! raw registry accessors.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::*;
use crate::error::CleanRoomError;

/// Raw registry accessors, one per contract entry point.
#[async_trait]
pub trait EnclaveRegistry: Send + Sync {
    /// Submit a public key and wait for the `EnclaveRequested` event.
    async fn request_enclave_creation(&self, public_key: &str) -> Result<RequestId, CleanRoomError>;

    /// `userRequests(owner, index)`.
    async fn user_request(&self, owner: Address, index: u64) -> Result<RequestId, CleanRoomError>;

    /// `getEnclaveDetails(requestId)`.
    async fn enclave_details(&self, request_id: RequestId) -> Result<FetchOutcome, CleanRoomError>;

    /// `enclaveRequests(requestId)`.
    async fn request_record(&self, request_id: RequestId) -> Result<Request, CleanRoomError>;
}

/// Bounded retry applied while a result is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// High-level enclave registry client.
pub struct RegistryClient<R> {
    registry: R,
}

impl<R: EnclaveRegistry> RegistryClient<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Request enclave creation for `public_key_encoded`.
    pub async fn submit_request(&self, public_key_encoded: &str) -> Result<RequestId, CleanRoomError> {
        let request_id = self
            .registry
            .request_enclave_creation(public_key_encoded)
            .await?;
        info!(request_id = %request_id, "Enclave creation requested");
        Ok(request_id)
    }

    /// List the owner's request ids in slot order.
    ///
    /// The scan ends at the first empty slot, at [`MAX_USER_REQUESTS`], or at
    /// the first accessor failure (the contract reverts past the last slot).
    pub async fn list_requests(&self, owner: Address) -> Vec<RequestId> {
        let mut requests = Vec::new();

        for index in 0..MAX_USER_REQUESTS {
            match self.registry.user_request(owner, index).await {
                Ok(id) if id == EMPTY_REQUEST_ID => break,
                Ok(id) => requests.push(id),
                Err(e) => {
                    debug!(owner = %owner, index, error = %e, "Request scan stopped");
                    break;
                }
            }
        }

        requests
    }

    /// Single read of the request's result.
    pub async fn fetch_result(&self, request_id: RequestId) -> Result<FetchOutcome, CleanRoomError> {
        self.registry.enclave_details(request_id).await
    }

    /// Fetch the result, retrying while it is pending.
    ///
    /// Makes at most `1 + policy.max_retries` reads, `policy.delay` apart.
    /// Any failure other than "pending" ends the loop immediately.
    pub async fn fetch_result_with_retry(
        &self,
        request_id: RequestId,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, CleanRoomError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(CleanRoomError::Cancelled);
            }

            attempt += 1;
            debug!(request_id = %request_id, attempt, "Fetching enclave details");

            if let FetchOutcome::Ready(ciphertext) = self.fetch_result(request_id).await? {
                return Ok(ciphertext);
            }

            if attempt > policy.max_retries {
                warn!(
                    request_id = %request_id,
                    attempts = attempt,
                    "Enclave details still pending, giving up"
                );
                return Err(CleanRoomError::NotAvailable { attempts: attempt });
            }

            info!(
                request_id = %request_id,
                retry_in_secs = policy.delay.as_secs(),
                "Waiting for enclave details, will retry"
            );

            tokio::select! {
                _ = tokio::time::sleep(policy.delay) => {},
                _ = cancel.cancelled() => return Err(CleanRoomError::Cancelled),
            }
        }
    }

    /// Owner and creation time of a request.
    pub async fn request_details(&self, request_id: RequestId) -> Result<Request, CleanRoomError> {
        self.registry.request_record(request_id).await
    }
}
