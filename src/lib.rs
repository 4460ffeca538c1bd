// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clean Room - Enclave Request Client
//!
//! Client for an on-chain enclave registry. A user connects a wallet,
//! generates an RSA key pair, submits the public key to request an enclave,
//! then polls the registry for the result encrypted to that key. Results
//! that carry deployment channel details are followed over Socket.IO until
//! the enclave is live. Also ships the demo enclave HTTP service.
//!
//! ## Modules
//!
//! - `blockchain` - Registry contract binding, request listing, result polling
//! - `crypto` - Key generation and result decryption
//! - `channel` - Deployment progress over Socket.IO
//! - `wallet` - Wallet provider and session
//! - `controller` - Headless request flow
//! - `api` - Demo enclave HTTP service (Axum)

pub mod api;
pub mod blockchain;
pub mod channel;
pub mod config;
pub mod controller;
pub mod crypto;
pub mod error;
pub mod state;
pub mod store;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_helpers;
