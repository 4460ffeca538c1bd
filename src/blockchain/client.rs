// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-chain enclave registry backed by an alloy HTTP provider.

use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol_types::decode_revert_reason,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::abi::IEnclaveRegistry;
use super::registry::EnclaveRegistry;
use super::types::*;
use crate::error::CleanRoomError;

/// Registry contract reached over JSON-RPC, signing with the session wallet.
pub struct ContractRegistry {
    contract: IEnclaveRegistry::IEnclaveRegistryInstance<DynProvider>,
    network: NetworkConfig,
    /// Value attached to `requestEnclaveCreation`
    request_fee: U256,
}

impl ContractRegistry {
    /// Bind the registry at `address` on `network`.
    pub fn connect(
        network: NetworkConfig,
        address: Address,
        wallet: EthereumWallet,
        request_fee: U256,
    ) -> Self {
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(network.rpc_url.clone())
            .erased();

        Self {
            contract: IEnclaveRegistry::new(address, provider),
            network,
            request_fee,
        }
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Contract address.
    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    /// Confirm the RPC endpoint serves the configured `NETWORK_ID`.
    pub async fn verify_network(&self) -> Result<(), CleanRoomError> {
        let reported = self
            .contract
            .provider()
            .get_chain_id()
            .await
            .map_err(|e| {
                CleanRoomError::Registry(format!(
                    "Failed to read chain id from {}: {e}",
                    self.network.rpc_url
                ))
            })?;
        check_chain_id(&self.network, reported)
    }
}

fn check_chain_id(network: &NetworkConfig, reported: u64) -> Result<(), CleanRoomError> {
    if reported == network.chain_id {
        Ok(())
    } else {
        Err(CleanRoomError::Config(format!(
            "NETWORK_ID is {} ({}) but {} serves chain {reported}",
            network.chain_id, network.name, network.rpc_url
        )))
    }
}

#[async_trait]
impl EnclaveRegistry for ContractRegistry {
    async fn request_enclave_creation(&self, public_key: &str) -> Result<RequestId, CleanRoomError> {
        let pending = self
            .contract
            .requestEnclaveCreation(public_key.to_string())
            .value(self.request_fee)
            .send()
            .await
            .map_err(|e| CleanRoomError::Transaction(format!("Failed to send: {}", revert_message(&e))))?;

        let tx_hash = *pending.tx_hash();
        tracing::info!(
            tx_hash = %tx_hash,
            network = %self.network.name,
            "Enclave creation request submitted"
        );

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| CleanRoomError::Transaction(format!("Failed to confirm: {e}")))?;

        if !receipt.status() {
            return Err(CleanRoomError::Transaction(format!(
                "Transaction {tx_hash} reverted"
            )));
        }

        receipt
            .inner
            .logs()
            .iter()
            .find_map(|log| log.log_decode::<IEnclaveRegistry::EnclaveRequested>().ok())
            .map(|log| log.inner.data.requestId)
            .ok_or_else(|| {
                CleanRoomError::Transaction(format!(
                    "Transaction {tx_hash} emitted no EnclaveRequested event"
                ))
            })
    }

    async fn user_request(&self, owner: Address, index: u64) -> Result<RequestId, CleanRoomError> {
        self.contract
            .userRequests(owner, U256::from(index))
            .call()
            .await
            .map_err(|e| CleanRoomError::Registry(revert_message(&e)))
    }

    async fn enclave_details(&self, request_id: RequestId) -> Result<FetchOutcome, CleanRoomError> {
        match self.contract.getEnclaveDetails(request_id).call().await {
            Ok(details) if details.is_empty() => Ok(FetchOutcome::Pending),
            Ok(details) => Ok(FetchOutcome::Ready(details)),
            Err(e) => {
                let message = revert_message(&e);
                if is_pending_reason(&message) {
                    Ok(FetchOutcome::Pending)
                } else {
                    Err(CleanRoomError::Registry(message))
                }
            }
        }
    }

    async fn request_record(&self, request_id: RequestId) -> Result<Request, CleanRoomError> {
        let record = self
            .contract
            .enclaveRequests(request_id)
            .call()
            .await
            .map_err(|e| CleanRoomError::Registry(revert_message(&e)))?;

        Ok(Request {
            id: request_id,
            owner: record.user,
            created_at: timestamp_to_datetime(record.createdAt)?,
        })
    }
}

/// Prefer the decoded `Error(string)` revert reason over the transport text.
fn revert_message(err: &ContractError) -> String {
    err.as_revert_data()
        .and_then(|data| decode_revert_reason(&data))
        .unwrap_or_else(|| err.to_string())
}

fn timestamp_to_datetime(secs: U256) -> Result<DateTime<Utc>, CleanRoomError> {
    u64::try_from(secs)
        .ok()
        .and_then(|s| i64::try_from(s).ok())
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .ok_or_else(|| CleanRoomError::Registry(format!("Invalid createdAt timestamp: {secs}")))
}
