// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RSA key material for enclave results.
//!
//! The client generates a 2048-bit RSA key pair, submits the public half to
//! the registry and keeps the private half in memory to decrypt the result.
//! Enclave results are encrypted with RSA-OAEP using SHA-256 for both the
//! OAEP digest and MGF1.
//!
//! ## Public key wire encoding
//!
//! The public key is exported as an SPKI PEM block. With
//! [`PublicKeyEncoding::Base64Pem`] (the registry's format) the full PEM text,
//! header lines included, is base64-encoded once more before submission.

use std::fmt;
use std::str::FromStr;

use base64ct::{Base64, Encoding};
use rand::rngs::OsRng;
use rsa::{
    pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CleanRoomError;

/// Modulus size of generated keys.
pub const RSA_KEY_BITS: usize = 2048;

/// How the SPKI PEM public key is encoded for on-chain submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicKeyEncoding {
    /// PEM text as is.
    Pem,
    /// PEM text wrapped in one extra layer of base64.
    #[default]
    Base64Pem,
}

impl PublicKeyEncoding {
    /// Encode PEM text for submission.
    pub fn wrap(self, pem: &str) -> String {
        match self {
            Self::Pem => pem.to_string(),
            Self::Base64Pem => Base64::encode_string(pem.as_bytes()),
        }
    }

    /// Recover the PEM text from a submitted value.
    pub fn unwrap_pem(self, encoded: &str) -> Result<String, CleanRoomError> {
        match self {
            Self::Pem => Ok(encoded.to_string()),
            Self::Base64Pem => {
                let bytes = Base64::decode_vec(encoded.trim())
                    .map_err(|e| CleanRoomError::Decode(e.to_string()))?;
                String::from_utf8(bytes)
                    .map_err(|e| CleanRoomError::Decode(format!("Invalid UTF-8: {e}")))
            }
        }
    }
}

impl FromStr for PublicKeyEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pem" => Ok(Self::Pem),
            "base64-pem" | "base64" => Ok(Self::Base64Pem),
            other => Err(format!("unknown public key encoding `{other}`")),
        }
    }
}

impl fmt::Display for PublicKeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pem => f.write_str("pem"),
            Self::Base64Pem => f.write_str("base64-pem"),
        }
    }
}

/// Session key pair. The private key never leaves memory and is wiped on drop.
#[derive(Clone)]
pub struct KeyPair {
    public_key_encoded: String,
    private_key_pem: Zeroizing<String>,
    encoding: PublicKeyEncoding,
}

impl KeyPair {
    /// Generate a fresh RSA key pair.
    ///
    /// CPU-bound; async callers should run it on a blocking thread.
    pub fn generate(encoding: PublicKeyEncoding) -> Result<Self, CleanRoomError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CleanRoomError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CleanRoomError::KeyGeneration(e.to_string()))?;
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CleanRoomError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            public_key_encoded: encoding.wrap(public_pem.trim_end()),
            private_key_pem: Zeroizing::new(private_pem.trim_end().to_string()),
            encoding,
        })
    }

    /// Public key in its submission encoding.
    pub fn public_key_encoded(&self) -> &str {
        &self.public_key_encoded
    }

    /// PKCS#8 PEM private key.
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    pub fn encoding(&self) -> PublicKeyEncoding {
        self.encoding
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_encoded", &self.public_key_encoded)
            .field("private_key_pem", &"<redacted>")
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Parse a submitted public key back into an RSA key.
pub fn decode_public_key(
    encoded: &str,
    encoding: PublicKeyEncoding,
) -> Result<RsaPublicKey, CleanRoomError> {
    let pem = encoding.unwrap_pem(encoded)?;
    RsaPublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| CleanRoomError::KeyImport(format!("Invalid public key: {e}")))
}

/// Encrypt `plaintext` to a submitted public key; returns base64 ciphertext.
///
/// This is what the enclave side does with the key it reads from the
/// registry. A 2048-bit key with OAEP/SHA-256 fits at most 190 bytes.
pub fn seal(
    public_key_encoded: &str,
    encoding: PublicKeyEncoding,
    plaintext: &[u8],
) -> Result<String, CleanRoomError> {
    let public_key = decode_public_key(public_key_encoded, encoding)?;
    let ciphertext = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| CleanRoomError::Encrypt(e.to_string()))?;
    Ok(Base64::encode_string(&ciphertext))
}
