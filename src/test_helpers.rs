// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory doubles shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::blockchain::{EnclaveRegistry, FetchOutcome, Request, RequestId, EMPTY_REQUEST_ID};
use crate::channel::{DeploymentStatus, NotificationChannel};
use crate::crypto::{KeyPair, PublicKeyEncoding};
use crate::error::CleanRoomError;

/// Deterministic request id for slot `n`.
pub fn request_id(n: u64) -> RequestId {
    B256::from(U256::from(n))
}

/// One RSA key pair per test binary; 2048-bit generation is slow.
pub fn test_key_pair() -> &'static KeyPair {
    static KEY: OnceLock<KeyPair> = OnceLock::new();
    KEY.get_or_init(|| {
        KeyPair::generate(PublicKeyEncoding::Base64Pem).expect("test key generation")
    })
}

struct PendingResult {
    ciphertext: String,
    pending_reads: usize,
}

/// Registry fake: per-owner request slots, scripted results, call recording.
#[derive(Default)]
pub struct MockRegistry {
    requests: HashMap<Address, Vec<RequestId>>,
    fail_user_request_at: Option<u64>,
    reject_submissions: bool,
    results: Mutex<HashMap<RequestId, PendingResult>>,
    failing_details: HashSet<RequestId>,
    submitted: Mutex<Vec<String>>,
    user_request_calls: Mutex<usize>,
    detail_calls: Mutex<Vec<Instant>>,
}

impl MockRegistry {
    pub fn with_requests(owner: Address, ids: Vec<RequestId>) -> Self {
        let mut registry = Self::default();
        registry.requests.insert(owner, ids);
        registry
    }

    pub fn failing_user_request_at(mut self, index: u64) -> Self {
        self.fail_user_request_at = Some(index);
        self
    }

    pub fn rejecting_submissions(mut self) -> Self {
        self.reject_submissions = true;
        self
    }

    /// `request` stays pending for `pending_reads` reads, then yields `ciphertext`.
    pub fn with_result_after(self, request: RequestId, ciphertext: &str, pending_reads: usize) -> Self {
        self.results.lock().unwrap().insert(
            request,
            PendingResult {
                ciphertext: ciphertext.to_string(),
                pending_reads,
            },
        );
        self
    }

    pub fn with_result(self, request: RequestId, ciphertext: &str) -> Self {
        self.with_result_after(request, ciphertext, 0)
    }

    pub fn failing_details(mut self, request: RequestId) -> Self {
        self.failing_details.insert(request);
        self
    }

    pub fn submitted_keys(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn user_request_calls(&self) -> usize {
        *self.user_request_calls.lock().unwrap()
    }

    pub fn detail_calls(&self) -> Vec<Instant> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnclaveRegistry for MockRegistry {
    async fn request_enclave_creation(&self, public_key: &str) -> Result<RequestId, CleanRoomError> {
        if self.reject_submissions {
            return Err(CleanRoomError::Transaction("execution reverted".to_string()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(public_key.to_string());
        Ok(request_id(submitted.len() as u64))
    }

    async fn user_request(&self, owner: Address, index: u64) -> Result<RequestId, CleanRoomError> {
        *self.user_request_calls.lock().unwrap() += 1;
        if self.fail_user_request_at == Some(index) {
            return Err(CleanRoomError::Registry("execution reverted".to_string()));
        }
        Ok(self
            .requests
            .get(&owner)
            .and_then(|ids| ids.get(index as usize).copied())
            .unwrap_or(EMPTY_REQUEST_ID))
    }

    async fn enclave_details(&self, request_id: RequestId) -> Result<FetchOutcome, CleanRoomError> {
        self.detail_calls.lock().unwrap().push(Instant::now());
        if self.failing_details.contains(&request_id) {
            return Err(CleanRoomError::Registry("Request does not exist".to_string()));
        }
        let mut results = self.results.lock().unwrap();
        match results.get_mut(&request_id) {
            Some(result) if result.pending_reads == 0 => Ok(FetchOutcome::Ready(result.ciphertext.clone())),
            Some(result) => {
                result.pending_reads -= 1;
                Ok(FetchOutcome::Pending)
            }
            None => Ok(FetchOutcome::Pending),
        }
    }

    async fn request_record(&self, request_id: RequestId) -> Result<Request, CleanRoomError> {
        let owner = self
            .requests
            .iter()
            .find(|(_, ids)| ids.contains(&request_id))
            .map(|(owner, _)| *owner)
            .ok_or_else(|| CleanRoomError::Registry("Request does not exist".to_string()))?;
        Ok(Request {
            id: request_id,
            owner,
            created_at: Utc::now(),
        })
    }
}

/// Channel fake that records connect calls and lets tests drive the status.
pub struct RecordingChannel {
    pub connects: Vec<(String, String)>,
    pub disconnects: usize,
    status: watch::Sender<DeploymentStatus>,
    failure: watch::Sender<Option<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            connects: Vec::new(),
            disconnects: 0,
            status: watch::Sender::new(DeploymentStatus::Idle),
            failure: watch::Sender::new(None),
        }
    }

    pub fn publish(&self, status: DeploymentStatus) {
        self.status.send_replace(status);
    }

    pub fn fail(&self, message: &str) {
        self.failure.send_replace(Some(message.to_string()));
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn connect(&mut self, server_url: &str, room: &str) -> Result<(), CleanRoomError> {
        self.connects.push((server_url.to_string(), room.to_string()));
        Ok(())
    }

    fn status(&self) -> DeploymentStatus {
        self.status.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<DeploymentStatus> {
        self.status.subscribe()
    }

    fn failures(&self) -> watch::Receiver<Option<String>> {
        self.failure.subscribe()
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

/// Service state built from the given environment overrides.
pub fn service_state(vars: &[(&str, &str)]) -> crate::state::AppState {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let config = crate::config::ServiceConfig::from_vars(&vars).expect("service config");
    crate::state::AppState::new(config).expect("service state")
}

/// Local stand-in for the sidecar, egress target and deployment endpoint.
/// Returns its base URL.
pub async fn spawn_upstream() -> String {
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    let app = Router::new()
        .route(
            "/encrypt",
            post(|Json(body): Json<Value>| async move { Json(json!({ "encrypted": body })) }),
        )
        .route(
            "/decrypt",
            post(|Json(body): Json<Value>| async move { Json(json!({ "decrypted": body })) }),
        )
        .route(
            "/posts/1",
            get(|| async { Json(json!({ "id": 1, "title": "enclave egress" })) }),
        )
        .route(
            "/deploy",
            post(|Json(body): Json<Value>| async move {
                if body["number_of_enclaves"] == 1 {
                    Ok(Json(json!({
                        "job_id": "job-1",
                        "socket_room": "room-1",
                        "socket_server_url": "http://localhost:8000/deployment"
                    })))
                } else {
                    Err(StatusCode::BAD_REQUEST)
                }
            }),
        )
        .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("upstream server");
    });
    format!("http://{addr}")
}
