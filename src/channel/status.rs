// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deployment progress driven by channel events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JOINED_EVENT: &str = "joined";
pub const UPDATE_EVENT: &str = "deployment_update_client";
pub const COMPLETE_EVENT: &str = "deployment_complete_client";
pub const ERROR_EVENT: &str = "deployment_error_client";

/// Platform configuration register hashes of the deployed enclave image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pcrs {
    pub pcr0: String,
    pub pcr1: String,
    pub pcr2: String,
    pub pcr8: String,
}

/// Final descriptor of a deployed enclave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveDetails {
    pub name: String,
    pub domain: String,
    pub uuid: String,
    pub pcrs: Pcrs,
}

/// Forward-only deployment state: `Idle -> Deploying -> Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Idle,
    Deploying,
    Completed {
        #[serde(rename = "enclaveDetails")]
        enclave_details: EnclaveDetails,
    },
}

/// Application events received on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentEvent {
    Joined(Value),
    Update(Value),
    Complete(EnclaveDetails),
    /// The deployment service gave up; carries its error text.
    Failed(String),
}

impl DeploymentEvent {
    /// Interpret a Socket.IO event. Unrelated events yield `Ok(None)`.
    pub fn from_socket_event(name: &str, args: &[Value]) -> Result<Option<Self>, String> {
        let first = args.first().cloned().unwrap_or(Value::Null);
        match name {
            JOINED_EVENT => Ok(Some(Self::Joined(first))),
            UPDATE_EVENT => Ok(Some(Self::Update(first))),
            COMPLETE_EVENT => parse_completion(args).map(|details| Some(Self::Complete(details))),
            ERROR_EVENT => Ok(Some(Self::Failed(failure_message(&first)))),
            _ => Ok(None),
        }
    }
}

/// Error payloads look like `{"room": .., "error": "..."}`.
fn failure_message(payload: &Value) -> String {
    match payload.get("error").unwrap_or(payload) {
        Value::String(message) => message.clone(),
        Value::Null => "Deployment failed".to_string(),
        other => other.to_string(),
    }
}

/// The completion payload is an `[eventName, data]` pair, sent either as one
/// array argument or as two arguments.
fn parse_completion(args: &[Value]) -> Result<EnclaveDetails, String> {
    let pair = match args {
        [Value::Array(pair)] => pair.as_slice(),
        pair => pair,
    };
    let data = pair
        .get(1)
        .ok_or_else(|| "completion event carries no data".to_string())?;
    let enclave = data
        .get("enclave")
        .cloned()
        .ok_or_else(|| "completion data has no `enclave` field".to_string())?;
    serde_json::from_value(enclave).map_err(|e| format!("invalid enclave descriptor: {e}"))
}

impl DeploymentStatus {
    /// State after `event`, or `None` when the event changes nothing.
    /// Failures are reported beside the status and never move it.
    pub fn apply(&self, event: &DeploymentEvent) -> Option<Self> {
        match (self, event) {
            (Self::Idle, DeploymentEvent::Update(_)) => Some(Self::Deploying),
            (Self::Idle | Self::Deploying, DeploymentEvent::Complete(details)) => {
                Some(Self::Completed {
                    enclave_details: details.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn enclave_details(&self) -> Option<&EnclaveDetails> {
        match self {
            Self::Completed { enclave_details } => Some(enclave_details),
            _ => None,
        }
    }
}
