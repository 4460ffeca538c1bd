// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave registry types and constants.

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

/// Opaque 32-byte identifier assigned by the registry to one creation request.
pub type RequestId = B256;

/// Value returned by `userRequests` for an unused slot.
pub const EMPTY_REQUEST_ID: RequestId = B256::ZERO;

/// Number of per-user request slots the registry contract keeps.
pub const MAX_USER_REQUESTS: u64 = 20;

/// Revert reason the registry uses while the enclave has not answered yet.
pub const PENDING_REVERT_REASON: &str = "Enclave details not available";

/// EVM network the registry lives on.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: String,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: Url,
}

/// A creation request as recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RequestId,
    pub owner: Address,
    pub created_at: DateTime<Utc>,
}

/// Result of one `getEnclaveDetails` read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Base64 ciphertext delivered by the enclave.
    Ready(String),
    /// The enclave has not produced a result yet.
    Pending,
}

/// Whether a registry failure message means "no result yet".
pub fn is_pending_reason(message: &str) -> bool {
    message.contains(PENDING_REVERT_REASON)
}
