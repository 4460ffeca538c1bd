// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Clean Room Controller
//!
//! Headless state machine behind the request flow:
//!
//! ```text
//! connect wallet -> generate key pair -> request enclave
//!                -> view details (poll, decrypt, classify)
//!                -> follow deployment (metadata results only)
//! ```
//!
//! Every action clears the current error, and a failing action stores its
//! message as the new current error before returning it. Actions take
//! `&mut self`, so at most one runs at a time; the deployment channel's
//! reader publishes through a watch channel instead of touching this state.

use alloy::primitives::Address;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::blockchain::{EnclaveRegistry, RegistryClient, RequestId, RetryPolicy};
use crate::channel::{DeploymentStatus, NotificationChannel};
use crate::crypto::{self, DecryptedPayload, KeyPair, PublicKeyEncoding};
use crate::error::CleanRoomError;
use crate::wallet::{WalletProvider, WalletSession};

pub struct CleanRoom<W, R, C> {
    wallet: W,
    client: RegistryClient<R>,
    channel: C,
    session: WalletSession,
    encoding: PublicKeyEncoding,
    retry: RetryPolicy,
    key_pair: Option<KeyPair>,
    latest_request: Option<RequestId>,
    requests: Vec<RequestId>,
    retrieved: Option<String>,
    decrypted: Option<DecryptedPayload>,
    error: Option<String>,
    cancel: CancellationToken,
}

impl<W, R, C> CleanRoom<W, R, C>
where
    W: WalletProvider,
    R: EnclaveRegistry,
    C: NotificationChannel,
{
    pub fn new(wallet: W, registry: R, channel: C, encoding: PublicKeyEncoding) -> Self {
        Self {
            wallet,
            client: RegistryClient::new(registry),
            channel,
            session: WalletSession::default(),
            encoding,
            retry: RetryPolicy::default(),
            key_pair: None,
            latest_request: None,
            requests: Vec::new(),
            retrieved: None,
            decrypted: None,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Start with existing key material instead of generating it.
    pub fn with_key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    pub fn connected_address(&self) -> Option<Address> {
        self.session.address()
    }

    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        self.latest_request
    }

    pub fn requests(&self) -> &[RequestId] {
        &self.requests
    }

    /// Raw ciphertext of the last viewed result.
    pub fn retrieved(&self) -> Option<&str> {
        self.retrieved.as_deref()
    }

    pub fn decrypted(&self) -> Option<&DecryptedPayload> {
        self.decrypted.as_ref()
    }

    /// The current error message, if the last action failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn client(&self) -> &RegistryClient<R> {
        &self.client
    }

    pub fn deployment_status(&self) -> DeploymentStatus {
        self.channel.status()
    }

    pub fn deployment_updates(&self) -> watch::Receiver<DeploymentStatus> {
        self.channel.subscribe()
    }

    pub fn deployment_failures(&self) -> watch::Receiver<Option<String>> {
        self.channel.failures()
    }

    /// Current deployment status, or the failure the deployment service
    /// reported, which also becomes the current error.
    pub fn check_deployment(&mut self) -> Result<DeploymentStatus, CleanRoomError> {
        let failure = self.channel.failures().borrow().clone();
        match failure {
            Some(message) => Err(self.fail(CleanRoomError::Channel(message))),
            None => Ok(self.channel.status()),
        }
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Ask the wallet for access, then load the account's requests.
    pub async fn connect_wallet(&mut self) -> Result<Address, CleanRoomError> {
        self.error = None;
        let result = self.session.connect(&self.wallet).await;
        let address = self.record(result)?;
        self.refresh_requests().await;
        Ok(address)
    }

    /// Generate the session key pair. Refused while one exists.
    pub async fn generate_key_pair(&mut self) -> Result<&KeyPair, CleanRoomError> {
        self.error = None;
        if self.key_pair.is_some() {
            return Err(self.fail(CleanRoomError::KeyPairExists));
        }

        let encoding = self.encoding;
        let generated = tokio::task::spawn_blocking(move || KeyPair::generate(encoding))
            .await
            .map_err(|e| CleanRoomError::KeyGeneration(e.to_string()))
            .and_then(|result| result);
        let key_pair = self.record(generated)?;

        info!(encoding = %encoding, "Key pair generated");
        Ok(self.key_pair.insert(key_pair))
    }

    /// Submit the public key and remember the new request id.
    pub async fn request_enclave_creation(&mut self) -> Result<RequestId, CleanRoomError> {
        self.error = None;
        if let Err(e) = self.session.require() {
            return Err(self.fail(e));
        }
        let Some(public_key) = self
            .key_pair
            .as_ref()
            .map(|key_pair| key_pair.public_key_encoded().to_string())
        else {
            return Err(self.fail(CleanRoomError::NoKeyPair));
        };

        let submitted = self.client.submit_request(&public_key).await;
        let request_id = self.record(submitted)?;
        self.latest_request = Some(request_id);
        self.refresh_requests().await;
        Ok(request_id)
    }

    /// Reload the connected account's request ids; empty when disconnected.
    pub async fn refresh_requests(&mut self) -> &[RequestId] {
        self.requests = match self.session.address() {
            Some(owner) => self.client.list_requests(owner).await,
            None => Vec::new(),
        };
        &self.requests
    }

    /// Fetch a request's result (retrying while pending), decrypt it and
    /// follow the deployment when it carries channel details.
    pub async fn view_details(
        &mut self,
        request_id: RequestId,
    ) -> Result<DecryptedPayload, CleanRoomError> {
        self.error = None;
        let Some(private_key_pem) = self
            .key_pair
            .as_ref()
            .map(|key_pair| Zeroizing::new(key_pair.private_key_pem().to_string()))
        else {
            return Err(self.fail(CleanRoomError::NoKeyPair));
        };
        self.retrieved = None;
        self.decrypted = None;

        let fetched = self
            .client
            .fetch_result_with_retry(request_id, &self.retry, &self.cancel)
            .await;
        let ciphertext = self.record(fetched)?;
        self.retrieved = Some(ciphertext.clone());

        let opened = crypto::open(&ciphertext, &private_key_pem);
        let payload = self.record(opened)?;
        self.decrypted = Some(payload.clone());

        if let Some(meta) = payload.deployment_metadata() {
            info!(
                request_id = %request_id,
                server = %meta.socket_server_url,
                room = %meta.socket_room,
                "Result carries deployment channel details"
            );
            let connected = self
                .channel
                .connect(&meta.socket_server_url, &meta.socket_room)
                .await;
            self.record(connected)?;
        }

        Ok(payload)
    }

    /// Follow a wallet account change. An empty list disconnects the session
    /// and clears the request list.
    pub async fn handle_accounts_changed(&mut self, accounts: &[Address]) {
        match self.session.adopt(accounts) {
            Some(address) => {
                info!(address = %address, "Wallet account changed");
                self.refresh_requests().await;
            }
            None => {
                info!("Wallet disconnected");
                self.requests.clear();
                self.latest_request = None;
            }
        }
    }

    /// Apply wallet account changes until `cancel` fires or the wallet goes
    /// away.
    pub async fn watch_accounts(&mut self, cancel: &CancellationToken) {
        let mut changes = self.wallet.subscribe();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.cancel.cancelled() => return,
                changed = changes.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            let accounts = changes.borrow_and_update().clone();
            self.handle_accounts_changed(&accounts).await;
        }
    }

    /// Disconnect the channel, cancel pending retries and drop key material.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        self.channel.disconnect();
        self.key_pair = None;
        info!("Clean room session torn down");
    }

    fn fail(&mut self, error: CleanRoomError) -> CleanRoomError {
        if !matches!(error, CleanRoomError::Cancelled) {
            warn!(error = %error, "Clean room action failed");
            self.error = Some(error.to_string());
        }
        error
    }

    fn record<T>(&mut self, result: Result<T, CleanRoomError>) -> Result<T, CleanRoomError> {
        result.map_err(|e| self.fail(e))
    }
}
