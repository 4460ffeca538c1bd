// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface of the demo enclave service.

use axum::{
    body::Bytes,
    routing::{any, get},
    Router,
};
use serde_json::{Map, Value};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ApiError, state::AppState};

pub mod enclave;
pub mod health;
pub mod keys;
pub mod oracle;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/egress", get(enclave::egress))
        .route("/compute", any(enclave::compute))
        .route("/encrypt", any(enclave::encrypt))
        .route("/decrypt", any(enclave::decrypt))
        .route("/get-public-key", get(keys::get_public_key))
        .route("/api/test", get(oracle::deployment_test))
        .fallback(enclave::hello)
        .with_state(state);

    routes
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Parse a request body as JSON. An empty body is an empty object.
pub(crate) fn json_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

/// Send an outbound request and return its JSON body. Non-2xx is an error.
pub(crate) async fn relay(request: reqwest::RequestBuilder) -> Result<Value, reqwest::Error> {
    request.send().await?.error_for_status()?.json::<Value>().await
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        enclave::egress,
        enclave::compute,
        enclave::encrypt,
        enclave::decrypt,
        keys::get_public_key,
        oracle::deployment_test
    ),
    components(
        schemas(
            enclave::ComputeResponse,
            keys::PublicKeyResponse,
            oracle::SealedResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Enclave", description = "Demo enclave routes"),
        (name = "Keys", description = "Per-session key generation"),
        (name = "Oracle", description = "Deployment relay sealed to a caller key")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::service_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        (status, to_bytes(response.into_body(), usize::MAX).await.unwrap())
    }

    #[tokio::test]
    async fn health_is_plain_ok() {
        let (status, body) = send(
            router(service_state(&[])),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn unknown_paths_echo_body() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/anything/else")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"enclave","n":3}"#))
            .unwrap();
        let (status, body) = send(router(service_state(&[])), request).await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!({
                "response": "Hello! I'm writing to you from within an enclave",
                "name": "enclave",
                "n": 3
            })
        );
    }

    #[tokio::test]
    async fn compute_accepts_any_method() {
        let request = Request::builder()
            .method(Method::PATCH)
            .uri("/compute")
            .body(Body::from(r#"{"a":"40","b":2}"#))
            .unwrap();
        let (status, body) = send(router(service_state(&[])), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"sum": 42}));
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = router(service_state(&[]))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let (status, body) = send(
            router(service_state(&[])),
            Request::get("/api-doc/openapi.json").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let doc: Value = serde_json::from_slice(&body).unwrap();
        for path in ["/health", "/egress", "/compute", "/get-public-key", "/api/test"] {
            assert!(doc["paths"].get(path).is_some(), "missing {path}");
        }
        for path in ["/compute", "/encrypt", "/decrypt"] {
            let body = &doc["paths"][path]["post"]["requestBody"]["content"]["application/json"];
            assert!(body.is_object(), "{path} has no JSON request body");
        }
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(json_body(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(json_body(&Bytes::from_static(b"  \n")).unwrap(), json!({}));
        let err = json_body(&Bytes::from_static(b"{nope")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
