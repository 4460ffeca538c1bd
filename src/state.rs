// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::RwLock;

use crate::config::ServiceConfig;
use crate::error::CleanRoomError;
use crate::store::KeySessionStore;

/// Timeout for calls to the sidecar, egress and deployment endpoints.
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub http: Client,
    pub keys: Arc<RwLock<KeySessionStore>>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Self, CleanRoomError> {
        let http = Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .map_err(|e| CleanRoomError::Config(format!("Failed to build HTTP client: {e}")))?;

        let keys = KeySessionStore::new(config.key_session_capacity);
        Ok(Self {
            config: Arc::new(config),
            http,
            keys: Arc::new(RwLock::new(keys)),
        })
    }
}
