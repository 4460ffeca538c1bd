// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side key material and result decryption.

pub mod keys;
pub mod payload;

pub use keys::{decode_public_key, seal, KeyPair, PublicKeyEncoding, RSA_KEY_BITS};
pub use payload::{decrypt, open, DecryptedPayload, DeploymentMetadata};
