// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-session key material held by the enclave service.
//!
//! Each caller session generates at most one RSA key pair. Sessions live in
//! an LRU bounded by `KEY_SESSION_CAPACITY`; the least recently created
//! session is evicted first and its private key is wiped on drop.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::ApiError;

pub struct KeySessionStore {
    private_keys: LruCache<String, Zeroizing<String>>,
}

impl KeySessionStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            private_keys: LruCache::new(capacity),
        }
    }

    pub fn has_key(&self, session_id: &str) -> bool {
        self.private_keys.contains(session_id)
    }

    /// Record the session's private key. A session keeps its first key.
    pub fn insert_key(&mut self, session_id: &str, private_key_pem: &str) -> Result<(), ApiError> {
        if self.has_key(session_id) {
            return Err(ApiError::bad_request("Key pair already generated"));
        }
        let evicted = self
            .private_keys
            .push(session_id.to_string(), Zeroizing::new(private_key_pem.to_string()));
        if let Some((evicted, _)) = evicted {
            debug!(session_id = %evicted, "Evicted key session");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.private_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.private_keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.private_keys.cap().get()
    }
}
