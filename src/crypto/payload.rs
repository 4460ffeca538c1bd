// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decryption and classification of enclave results.

use base64ct::{Base64, Encoding};
use rsa::{pkcs8::DecodePrivateKey, Oaep, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::CleanRoomError;

const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// Connection details for the deployment channel, sent by the enclave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetadata {
    #[serde(alias = "socket_server_url")]
    pub socket_server_url: String,
    #[serde(alias = "socket_room")]
    pub socket_room: String,
}

impl DeploymentMetadata {
    /// Read the channel fields from a JSON object. The deployment service
    /// answers in snake_case, enclaves in camelCase.
    fn from_object(object: &Map<String, Value>) -> Option<Self> {
        let field = |names: [&str; 2]| {
            names
                .iter()
                .find_map(|name| object.get(*name).and_then(Value::as_str))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            socket_server_url: field(["socketServerUrl", "socket_server_url"])?,
            socket_room: field(["socketRoom", "socket_room"])?,
        })
    }
}

/// A decrypted enclave result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum DecryptedPayload {
    PlainText(String),
    DeploymentMetadata(DeploymentMetadata),
}

impl DecryptedPayload {
    /// A JSON object carrying non-empty `socketServerUrl` and `socketRoom`
    /// strings (or their snake_case forms) is deployment metadata; anything
    /// else, arrays included, is shown as text.
    pub fn classify(text: String) -> Self {
        let meta = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(object)) => DeploymentMetadata::from_object(&object),
            _ => None,
        };
        match meta {
            Some(meta) => Self::DeploymentMetadata(meta),
            None => Self::PlainText(text),
        }
    }

    pub fn deployment_metadata(&self) -> Option<&DeploymentMetadata> {
        match self {
            Self::DeploymentMetadata(meta) => Some(meta),
            Self::PlainText(_) => None,
        }
    }
}

/// Decrypt a base64 RSA-OAEP ciphertext with a PKCS#8 PEM private key.
pub fn decrypt(ciphertext_b64: &str, private_key_pem: &str) -> Result<String, CleanRoomError> {
    let ciphertext = Base64::decode_vec(ciphertext_b64.trim())
        .map_err(|e| CleanRoomError::Decode(e.to_string()))?;

    let pem = pem::parse(private_key_pem)
        .map_err(|e| CleanRoomError::KeyImport(format!("Invalid PEM: {e}")))?;
    if pem.tag() != PRIVATE_KEY_TAG {
        return Err(CleanRoomError::KeyImport(format!(
            "Expected a {PRIVATE_KEY_TAG} block, found {}",
            pem.tag()
        )));
    }

    let private_key = RsaPrivateKey::from_pkcs8_der(pem.contents())
        .map_err(|e| CleanRoomError::KeyImport(e.to_string()))?;

    let plaintext = private_key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext)
        .map_err(|e| CleanRoomError::Decrypt(e.to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| CleanRoomError::Decrypt(format!("Invalid UTF-8: {e}")))
}

/// Decrypt and classify in one step.
pub fn open(ciphertext_b64: &str, private_key_pem: &str) -> Result<DecryptedPayload, CleanRoomError> {
    decrypt(ciphertext_b64, private_key_pem).map(DecryptedPayload::classify)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::seal;
    use crate::test_helpers::test_key_pair;

    #[test]
    fn sealed_text_round_trips() {
        let pair = test_key_pair();
        for message in ["hello enclave", "", "ünïcødé ✓"] {
            let ciphertext = seal(pair.public_key_encoded(), pair.encoding(), message.as_bytes()).unwrap();
            assert_eq!(decrypt(&ciphertext, pair.private_key_pem()).unwrap(), message);
        }
    }

    #[test]
    fn deployment_metadata_is_classified() {
        let pair = test_key_pair();
        let json = r#"{"socketServerUrl":"http://localhost:8000","socketRoom":"room-42","status":"queued"}"#;
        let ciphertext = seal(pair.public_key_encoded(), pair.encoding(), json.as_bytes()).unwrap();

        let payload = open(&ciphertext, pair.private_key_pem()).unwrap();
        assert_eq!(
            payload,
            DecryptedPayload::DeploymentMetadata(DeploymentMetadata {
                socket_server_url: "http://localhost:8000".to_string(),
                socket_room: "room-42".to_string(),
            })
        );
    }

    #[test]
    fn other_json_stays_plain_text() {
        for text in [
            r#"{"enclave":"ready"}"#,
            r#"{"socketServerUrl":"","socketRoom":"r"}"#,
            r#"["socketServerUrl","socketRoom"]"#,
            r#"["http://localhost:8000/deployment","room-1"]"#,
            r#"{"socketServerUrl":1,"socketRoom":"r"}"#,
            "42",
            "not json",
        ] {
            assert_eq!(
                DecryptedPayload::classify(text.to_string()),
                DecryptedPayload::PlainText(text.to_string())
            );
        }
    }

    #[test]
    fn snake_case_job_response_is_deployment_metadata() {
        let text = r#"{"job_id":"j","socket_room":"room-1","socket_server_url":"http://localhost:8000/deployment"}"#;
        assert_eq!(
            DecryptedPayload::classify(text.to_string()),
            DecryptedPayload::DeploymentMetadata(DeploymentMetadata {
                socket_server_url: "http://localhost:8000/deployment".to_string(),
                socket_room: "room-1".to_string(),
            })
        );
    }

    #[test]
    fn malformed_base64_is_decode_error() {
        let err = decrypt("***", test_key_pair().private_key_pem()).unwrap_err();
        assert!(matches!(err, CleanRoomError::Decode(_)));
    }

    #[test]
    fn bad_private_key_is_key_import_error() {
        let err = decrypt("AAAA", "not a pem").unwrap_err();
        assert!(matches!(err, CleanRoomError::KeyImport(_)));

        let public_pem = crate::crypto::PublicKeyEncoding::Base64Pem
            .unwrap_pem(test_key_pair().public_key_encoded())
            .unwrap();
        let err = decrypt("AAAA", &public_pem).unwrap_err();
        assert!(matches!(err, CleanRoomError::KeyImport(msg) if msg.contains("PUBLIC KEY")));
    }

    #[test]
    fn corrupted_ciphertext_is_decrypt_error() {
        let pair = test_key_pair();
        let ciphertext = seal(pair.public_key_encoded(), pair.encoding(), b"secret").unwrap();
        let mut bytes = Base64::decode_vec(&ciphertext).unwrap();
        bytes[10] ^= 0xff;
        let corrupted = Base64::encode_string(&bytes);

        let err = decrypt(&corrupted, pair.private_key_pem()).unwrap_err();
        assert!(matches!(err, CleanRoomError::Decrypt(_)));
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let value = serde_json::to_value(DecryptedPayload::PlainText("hi".into())).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "plainText", "value": "hi"}));
    }
}
