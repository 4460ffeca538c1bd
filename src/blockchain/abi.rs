// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave registry contract interface.

use alloy::sol;

// Define the registry interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IEnclaveRegistry {
        function requestEnclaveCreation(string memory publicKey) external payable returns (bytes32 requestId);
        function getEnclaveDetails(bytes32 requestId) external view returns (string memory);
        function userRequests(address user, uint256 index) external view returns (bytes32);
        function enclaveRequests(bytes32 requestId) external view returns (address user, string memory encryptedDetails, uint256 createdAt);

        event EnclaveRequested(bytes32 indexed requestId, address indexed user);
        event EnclaveFulfilled(bytes32 indexed requestId, string encryptedDetails);
    }
}

#[cfg(test)]
mod tests {
    use super::IEnclaveRegistry;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn signatures_match_deployed_contract() {
        assert_eq!(
            IEnclaveRegistry::requestEnclaveCreationCall::SIGNATURE,
            "requestEnclaveCreation(string)"
        );
        assert_eq!(
            IEnclaveRegistry::userRequestsCall::SIGNATURE,
            "userRequests(address,uint256)"
        );
        assert_eq!(
            IEnclaveRegistry::EnclaveRequested::SIGNATURE,
            "EnclaveRequested(bytes32,address)"
        );
        assert_eq!(
            IEnclaveRegistry::EnclaveFulfilled::SIGNATURE,
            "EnclaveFulfilled(bytes32,string)"
        );
    }
}
