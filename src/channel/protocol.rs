// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Socket.IO v4 framing over the Engine.IO v4 WebSocket transport.
//!
//! The path of the server URL names the Socket.IO namespace, so
//! `http://host:8000/deployment` connects to `/socket.io/` on `host:8000`
//! and joins namespace `/deployment`. Each WebSocket text frame carries one
//! Engine.IO packet; Engine.IO `message` packets (type `4`) carry one
//! Socket.IO packet, prefixed with `/nsp,` outside the default namespace:
//!
//! ```text
//! 0{"sid":..}                engine.io open
//! 2 / 3                      engine.io ping / pong
//! 40/nsp, / 40/nsp,{"sid":..} socket.io connect request / ack
//! 44/nsp,{"message":..}      socket.io connect error
//! 42/nsp,["event",args..]    socket.io event
//! ```

use serde_json::Value;
use url::Url;

use crate::error::CleanRoomError;

/// Fixed Socket.IO handshake path.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// The namespace every Socket.IO server serves.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO pong reply.
pub const PONG: &str = "3";

/// One inbound packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open,
    Close,
    Ping,
    Connected { namespace: String },
    ConnectError { namespace: String, message: String },
    Disconnected { namespace: String },
    Event { namespace: String, name: String, args: Vec<Value> },
    Unknown(String),
}

/// Where to open the socket and which namespace to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    pub namespace: String,
}

/// Resolve a Socket.IO server URL into its WebSocket endpoint and namespace.
pub fn endpoint(server_url: &str) -> Result<Endpoint, CleanRoomError> {
    let mut url = Url::parse(server_url)
        .map_err(|e| CleanRoomError::Channel(format!("Invalid server URL {server_url}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CleanRoomError::Channel(format!(
                "Unsupported server URL scheme `{other}`"
            )))
        }
    };

    let namespace = match url.path().trim_end_matches('/') {
        "" => DEFAULT_NAMESPACE.to_string(),
        path => path.to_string(),
    };

    url.set_scheme(scheme)
        .map_err(|_| CleanRoomError::Channel(format!("Cannot use {server_url} as a WebSocket URL")))?;
    url.set_path(SOCKET_IO_PATH);
    url.set_query(Some("EIO=4&transport=websocket"));
    url.set_fragment(None);
    Ok(Endpoint { url, namespace })
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// Socket.IO connect request for `namespace`.
pub fn connect(namespace: &str) -> String {
    format!("40{}", namespace_prefix(namespace))
}

/// Encode an event emission on `namespace`.
pub fn event(namespace: &str, name: &str, args: &[Value]) -> String {
    let mut packet = Vec::with_capacity(args.len() + 1);
    packet.push(Value::String(name.to_string()));
    packet.extend_from_slice(args);
    format!("42{}{}", namespace_prefix(namespace), Value::Array(packet))
}

/// Decode one text frame.
pub fn parse(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Frame::Open,
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping,
        Some('4') => parse_message(chars.as_str()),
        _ => Frame::Unknown(text.to_string()),
    }
}

fn parse_message(packet: &str) -> Frame {
    let mut chars = packet.chars();
    let kind = chars.next();
    let (namespace, body) = split_namespace(chars.as_str());
    let namespace = namespace.to_string();
    match kind {
        Some('0') => Frame::Connected { namespace },
        Some('1') => Frame::Disconnected { namespace },
        Some('2') => parse_event(namespace, body).unwrap_or_else(|| Frame::Unknown(packet.to_string())),
        Some('4') => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            Frame::ConnectError { namespace, message }
        }
        _ => Frame::Unknown(packet.to_string()),
    }
}

fn parse_event(namespace: String, body: &str) -> Option<Frame> {
    // optional ack id digits before the payload
    let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let mut items = match serde_json::from_str::<Value>(body).ok()? {
        Value::Array(items) => items,
        _ => return None,
    };
    if items.is_empty() {
        return None;
    }
    let name = items.remove(0).as_str()?.to_string();
    Some(Frame::Event { namespace, name, args: items })
}

/// `/nsp,rest` -> (`/nsp`, `rest`); no prefix means the default namespace.
fn split_namespace(body: &str) -> (&str, &str) {
    if body.starts_with('/') {
        body.split_once(',').unwrap_or((body, ""))
    } else {
        (DEFAULT_NAMESPACE, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_url_path_becomes_namespace() {
        let ep = endpoint("http://localhost:8000/deployment").unwrap();
        assert_eq!(ep.url.as_str(), "ws://localhost:8000/socket.io/?EIO=4&transport=websocket");
        assert_eq!(ep.namespace, "/deployment");

        let ep = endpoint("https://deploy.example.com/some/path/?x=1").unwrap();
        assert_eq!(
            ep.url.as_str(),
            "wss://deploy.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(ep.namespace, "/some/path");

        assert_eq!(endpoint("http://localhost:8000").unwrap().namespace, "/");
        assert_eq!(endpoint("ws://localhost:8000/").unwrap().namespace, "/");

        assert!(endpoint("ftp://example.com").is_err());
        assert!(endpoint("not a url").is_err());
    }

    #[test]
    fn connect_and_join_carry_namespace() {
        assert_eq!(connect("/"), "40");
        assert_eq!(connect("/deployment"), "40/deployment,");
        assert_eq!(event("/", "join", &[json!("room-1")]), r#"42["join","room-1"]"#);
        assert_eq!(
            event("/deployment", "join", &[json!("room-1")]),
            r#"42/deployment,["join","room-1"]"#
        );
    }

    #[test]
    fn transport_packets() {
        let root = || "/".to_string();
        assert_eq!(parse(r#"0{"sid":"abc","pingInterval":25000}"#), Frame::Open);
        assert_eq!(parse("2"), Frame::Ping);
        assert_eq!(parse("1"), Frame::Close);
        assert_eq!(parse("40"), Frame::Connected { namespace: root() });
        assert_eq!(parse(r#"40{"sid":"xyz"}"#), Frame::Connected { namespace: root() });
        assert_eq!(
            parse(r#"40/deployment,{"sid":"xyz"}"#),
            Frame::Connected { namespace: "/deployment".to_string() }
        );
        assert_eq!(parse("41"), Frame::Disconnected { namespace: root() });
        assert_eq!(
            parse("41/deployment,"),
            Frame::Disconnected { namespace: "/deployment".to_string() }
        );
    }

    #[test]
    fn connect_error_extracts_message() {
        assert_eq!(
            parse(r#"44/deployment,{"message":"Not authorized"}"#),
            Frame::ConnectError {
                namespace: "/deployment".to_string(),
                message: "Not authorized".to_string()
            }
        );
    }

    #[test]
    fn events_with_namespace_and_ack_id() {
        let event = |namespace: &str| Frame::Event {
            namespace: namespace.to_string(),
            name: "joined".to_string(),
            args: vec![json!({"room": "r"})],
        };
        assert_eq!(parse(r#"42["joined",{"room":"r"}]"#), event("/"));
        assert_eq!(parse(r#"42/deployment,["joined",{"room":"r"}]"#), event("/deployment"));
        assert_eq!(parse(r#"42/deployment,17["joined",{"room":"r"}]"#), event("/deployment"));
        assert_eq!(parse(r#"4217["joined",{"room":"r"}]"#), event("/"));
    }

    #[test]
    fn malformed_events_are_unknown() {
        assert!(matches!(parse("42{}"), Frame::Unknown(_)));
        assert!(matches!(parse("42[]"), Frame::Unknown(_)));
        assert!(matches!(parse("42[1,2]"), Frame::Unknown(_)));
        assert!(matches!(parse("42/deployment"), Frame::Unknown(_)));
        assert!(matches!(parse(""), Frame::Unknown(_)));
    }
}
