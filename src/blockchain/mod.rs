// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave registry integration.
//!
//! This module provides functionality for:
//! - Submitting a public key to request enclave creation
//! - Listing a user's historical request identifiers
//! - Polling for the encrypted result of a request

pub mod abi;
pub mod client;
pub mod registry;
pub mod types;

pub use client::ContractRegistry;
pub use registry::{EnclaveRegistry, RegistryClient, RetryPolicy};
pub use types::*;
