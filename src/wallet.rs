// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet session: which account is connected and who signs submissions.

use std::sync::Arc;

use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::error::CleanRoomError;

/// Account access and signing, as an injected browser wallet would offer.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask for account access. An empty list means access was refused.
    async fn request_accounts(&self) -> Result<Vec<Address>, CleanRoomError>;

    /// Account-change notifications. An empty list means the wallet
    /// disconnected.
    fn subscribe(&self) -> watch::Receiver<Vec<Address>>;

    /// Signer for registry transactions.
    fn wallet(&self) -> EthereumWallet;
}

#[async_trait]
impl<T: WalletProvider + ?Sized> WalletProvider for Arc<T> {
    async fn request_accounts(&self) -> Result<Vec<Address>, CleanRoomError> {
        (**self).request_accounts().await
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Address>> {
        (**self).subscribe()
    }

    fn wallet(&self) -> EthereumWallet {
        (**self).wallet()
    }
}

/// Wallet provider backed by a local secp256k1 key.
pub struct LocalWallet {
    signer: PrivateKeySigner,
    accounts: watch::Sender<Vec<Address>>,
}

impl LocalWallet {
    /// Build from a hex private key, with or without `0x`.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, CleanRoomError> {
        let key_bytes = alloy::hex::decode(private_key_hex.trim())
            .map_err(|e| CleanRoomError::Config(format!("Invalid wallet private key: {e}")))?;
        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| CleanRoomError::Config(format!("Invalid wallet private key: {e}")))?;

        Ok(Self {
            accounts: watch::Sender::new(vec![signer.address()]),
            signer,
        })
    }

    /// No configured key means no wallet provider at all.
    pub fn from_config(private_key_hex: Option<&str>) -> Result<Self, CleanRoomError> {
        match private_key_hex {
            Some(key) => Self::from_hex(key),
            None => Err(CleanRoomError::WalletUnavailable),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Publish a new set of authorized accounts.
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        self.accounts.send_replace(accounts);
    }

    /// Revoke access; subscribers see an empty account list.
    pub fn disconnect(&self) {
        self.accounts.send_replace(Vec::new());
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, CleanRoomError> {
        Ok(self.accounts.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Address>> {
        self.accounts.subscribe()
    }

    fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

/// The currently connected account, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSession {
    connected_address: Option<Address>,
}

impl WalletSession {
    /// Request access and adopt the first authorized account.
    pub async fn connect<W: WalletProvider + ?Sized>(
        &mut self,
        provider: &W,
    ) -> Result<Address, CleanRoomError> {
        let accounts = provider.request_accounts().await?;
        let address = self.adopt(&accounts).ok_or(CleanRoomError::UserRejected)?;
        info!(address = %address, "Wallet connected");
        Ok(address)
    }

    pub fn address(&self) -> Option<Address> {
        self.connected_address
    }

    /// The connected address, or `NotConnected`.
    pub fn require(&self) -> Result<Address, CleanRoomError> {
        self.connected_address.ok_or(CleanRoomError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.connected_address.is_some()
    }

    pub fn clear(&mut self) {
        self.connected_address = None;
    }

    /// Follow an account change: the first account becomes current, an empty
    /// list disconnects.
    pub fn adopt(&mut self, accounts: &[Address]) -> Option<Address> {
        self.connected_address = accounts.first().copied();
        self.connected_address
    }
}
