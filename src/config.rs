// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup; a missing required value is fatal.
//!
//! ## Client Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CONTRACT_ADDRESS` | Enclave registry contract address | Required |
//! | `NETWORK_ID` | Chain ID of the registry network, checked against the RPC endpoint | Required |
//! | `NETWORK_NAME` | Display name of the registry network | Required |
//! | `API_BASE_URL` | Base URL of the enclave HTTP service | Required |
//! | `RPC_URL` | JSON-RPC endpoint | `http://127.0.0.1:8545` |
//! | `DEV_MODE` | `true` enables development defaults | `false` |
//! | `WALLET_PRIVATE_KEY` | Hex private key backing the local wallet | Optional |
//! | `REQUEST_FEE_WEI` | Value attached to `requestEnclaveCreation` | `0` |
//! | `PUBLIC_KEY_ENCODING` | `pem` or `base64-pem` | `base64-pem` |
//!
//! ## Service Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8008` |
//! | `SIDECAR_URL` | Local encrypt/decrypt sidecar | `http://127.0.0.1:9999` |
//! | `EGRESS_URL` | Target of the `/egress` demo route | `https://jsonplaceholder.typicode.com/posts/1` |
//! | `ENCLAVE_DEPLOYMENT_URL` | Deployment endpoint used by `/api/test` | Optional |
//! | `KEY_SESSION_CAPACITY` | Key sessions kept before the oldest is evicted | `1024` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use url::Url;

use crate::blockchain::NetworkConfig;
use crate::crypto::PublicKeyEncoding;
use crate::error::CleanRoomError;

pub const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";
pub const NETWORK_ID_ENV: &str = "NETWORK_ID";
pub const NETWORK_NAME_ENV: &str = "NETWORK_NAME";
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const DEV_MODE_ENV: &str = "DEV_MODE";
pub const WALLET_PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";
pub const REQUEST_FEE_WEI_ENV: &str = "REQUEST_FEE_WEI";
pub const PUBLIC_KEY_ENCODING_ENV: &str = "PUBLIC_KEY_ENCODING";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SIDECAR_URL_ENV: &str = "SIDECAR_URL";
pub const EGRESS_URL_ENV: &str = "EGRESS_URL";
pub const ENCLAVE_DEPLOYMENT_URL_ENV: &str = "ENCLAVE_DEPLOYMENT_URL";
pub const KEY_SESSION_CAPACITY_ENV: &str = "KEY_SESSION_CAPACITY";

/// Logging format selector (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8008;
pub const DEFAULT_SIDECAR_URL: &str = "http://127.0.0.1:9999";
pub const DEFAULT_EGRESS_URL: &str = "https://jsonplaceholder.typicode.com/posts/1";
pub const DEFAULT_KEY_SESSION_CAPACITY: usize = 1024;

/// Client-side configuration for the enclave request flow.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub contract_address: Address,
    pub network: NetworkConfig,
    pub api_base_url: Url,
    pub dev_mode: bool,
    /// Hex key for the local wallet provider. `None` means no wallet is available.
    pub wallet_private_key: Option<String>,
    pub request_fee: U256,
    pub public_key_encoding: PublicKeyEncoding,
}

impl ClientConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, CleanRoomError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Load from an explicit variable map.
    ///
    /// Required keys are checked in a fixed order so the first missing one is
    /// reported, matching what an operator sees on startup.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, CleanRoomError> {
        let contract_address = required(vars, CONTRACT_ADDRESS_ENV)?;
        let network_id = required(vars, NETWORK_ID_ENV)?;
        let network_name = required(vars, NETWORK_NAME_ENV)?;
        let api_base_url = required(vars, API_BASE_URL_ENV)?;

        let contract_address = Address::from_str(&contract_address)
            .map_err(|e| invalid(CONTRACT_ADDRESS_ENV, e))?;
        let chain_id: u64 = network_id
            .parse()
            .map_err(|e| invalid(NETWORK_ID_ENV, e))?;
        let api_base_url = Url::parse(&api_base_url).map_err(|e| invalid(API_BASE_URL_ENV, e))?;

        let rpc_url = optional(vars, RPC_URL_ENV).unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let rpc_url = Url::parse(&rpc_url).map_err(|e| invalid(RPC_URL_ENV, e))?;

        let request_fee = match optional(vars, REQUEST_FEE_WEI_ENV) {
            Some(raw) => U256::from_str(&raw).map_err(|e| invalid(REQUEST_FEE_WEI_ENV, e))?,
            None => U256::ZERO,
        };

        let public_key_encoding = match optional(vars, PUBLIC_KEY_ENCODING_ENV) {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| invalid(PUBLIC_KEY_ENCODING_ENV, e))?,
            None => PublicKeyEncoding::default(),
        };

        Ok(Self {
            contract_address,
            network: NetworkConfig {
                name: network_name,
                chain_id,
                rpc_url,
            },
            api_base_url,
            dev_mode: is_true(optional(vars, DEV_MODE_ENV).as_deref()),
            wallet_private_key: optional(vars, WALLET_PRIVATE_KEY_ENV),
            request_fee,
            public_key_encoding,
        })
    }
}

/// Configuration of the demo enclave HTTP service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub sidecar_url: Url,
    pub egress_url: Url,
    pub deployment_url: Option<Url>,
    pub key_session_capacity: NonZeroUsize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, CleanRoomError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, CleanRoomError> {
        let host = optional(vars, HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = match optional(vars, PORT_ENV) {
            Some(raw) => raw.parse().map_err(|e| invalid(PORT_ENV, e))?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid(HOST_ENV, e))?;

        let sidecar_url = optional(vars, SIDECAR_URL_ENV)
            .unwrap_or_else(|| DEFAULT_SIDECAR_URL.to_string());
        let egress_url =
            optional(vars, EGRESS_URL_ENV).unwrap_or_else(|| DEFAULT_EGRESS_URL.to_string());
        let deployment_url = optional(vars, ENCLAVE_DEPLOYMENT_URL_ENV)
            .map(|raw| Url::parse(&raw).map_err(|e| invalid(ENCLAVE_DEPLOYMENT_URL_ENV, e)))
            .transpose()?;
        let key_session_capacity = match optional(vars, KEY_SESSION_CAPACITY_ENV) {
            Some(raw) => raw
                .parse::<NonZeroUsize>()
                .map_err(|e| invalid(KEY_SESSION_CAPACITY_ENV, e))?,
            None => NonZeroUsize::new(DEFAULT_KEY_SESSION_CAPACITY)
                .ok_or_else(|| invalid(KEY_SESSION_CAPACITY_ENV, "must be positive"))?,
        };

        Ok(Self {
            bind_addr,
            sidecar_url: Url::parse(&sidecar_url).map_err(|e| invalid(SIDECAR_URL_ENV, e))?,
            egress_url: Url::parse(&egress_url).map_err(|e| invalid(EGRESS_URL_ENV, e))?,
            deployment_url,
            key_session_capacity,
        })
    }
}

fn optional(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, CleanRoomError> {
    optional(vars, key)
        .ok_or_else(|| CleanRoomError::Config(format!("Missing required configuration: {key}")))
}

fn invalid(key: &str, err: impl std::fmt::Display) -> CleanRoomError {
    CleanRoomError::Config(format!("Invalid value for {key}: {err}"))
}

fn is_true(raw: Option<&str>) -> bool {
    raw.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}
