// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demo routes served from inside the enclave.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;
use utoipa::ToSchema;

use super::{json_body, relay};
use crate::{error::ApiError, state::AppState};

pub const HELLO_MESSAGE: &str = "Hello! I'm writing to you from within an enclave";

#[derive(Debug, Serialize, ToSchema)]
pub struct ComputeResponse {
    pub sum: i64,
}

/// Fetch the configured egress URL and relay its JSON.
#[utoipa::path(
    get,
    path = "/egress",
    tag = "Enclave",
    responses(
        (status = 200, description = "Relayed upstream JSON"),
        (status = 500, description = "Upstream unreachable")
    )
)]
pub async fn egress(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let url = state.config.egress_url.clone();
    relay(state.http.get(url.clone())).await.map(Json).map_err(|e| {
        warn!(url = %url, error = %e, "Could not send request out of enclave");
        ApiError::enclave()
    })
}

/// Add `a` and `b`. Strings are read up to their first non-digit.
#[utoipa::path(
    post,
    path = "/compute",
    tag = "Enclave",
    request_body = Value,
    responses(
        (status = 200, body = ComputeResponse),
        (status = 400, description = "`a` or `b` is not an integer")
    )
)]
pub async fn compute(body: Bytes) -> Result<Json<ComputeResponse>, ApiError> {
    let body = json_body(&body)?;
    let operand = |name: &str| body.get(name).and_then(parse_int);

    match (operand("a"), operand("b")) {
        (Some(a), Some(b)) => a
            .checked_add(b)
            .map(|sum| Json(ComputeResponse { sum }))
            .ok_or_else(|| ApiError::bad_request("Sum is out of range")),
        _ => Err(ApiError::bad_request("`a` and `b` must be integers")),
    }
}

/// Forward the body to the sidecar's encrypt API.
#[utoipa::path(
    post,
    path = "/encrypt",
    tag = "Enclave",
    request_body = Value,
    responses(
        (status = 200, description = "Sidecar response"),
        (status = 500, description = "Sidecar unreachable")
    )
)]
pub async fn encrypt(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    sidecar(&state, "encrypt", &body).await
}

/// Forward the body to the sidecar's decrypt API.
#[utoipa::path(
    post,
    path = "/decrypt",
    tag = "Enclave",
    request_body = Value,
    responses(
        (status = 200, description = "Sidecar response"),
        (status = 500, description = "Sidecar unreachable")
    )
)]
pub async fn decrypt(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    sidecar(&state, "decrypt", &body).await
}

async fn sidecar(state: &AppState, operation: &str, body: &Bytes) -> Result<Json<Value>, ApiError> {
    let payload = json_body(body)?;
    let url = format!(
        "{}/{operation}",
        state.config.sidecar_url.as_str().trim_end_matches('/')
    );

    relay(state.http.post(&url).json(&payload))
        .await
        .map(Json)
        .map_err(|e| {
            warn!(url = %url, error = %e, "Sidecar {operation} call failed");
            ApiError::enclave()
        })
}

/// Greeting merged with the request body's fields.
pub async fn hello(body: Bytes) -> Result<Json<Value>, ApiError> {
    let mut response = Map::new();
    response.insert("response".to_string(), Value::String(HELLO_MESSAGE.to_string()));
    if let Value::Object(fields) = json_body(&body)? {
        response.extend(fields);
    }
    Ok(Json(Value::Object(response)))
}

/// Integer reading of a JSON value: numbers truncate, strings parse a
/// leading (optionally signed, optionally `0x`) integer prefix.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?.trunc();
            (f.is_finite() && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) => parse_int_prefix(s),
        _ => None,
    }
}

fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        _ => (10, unsigned),
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    if negative {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}
