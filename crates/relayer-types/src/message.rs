// Copyright 2023 Trestle Network
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ethereum_types::U256;

use crate::{ChainId, DepositNonce, ResourceId};

/// Kind-specific payload of a [`Message`]. The field order fixes the
/// positional meaning of the encoded proposal data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    /// A fungible token transfer: amount and destination recipient.
    FungibleTransfer { amount: U256, recipient: Vec<u8> },
    /// A non-fungible token transfer: token id, destination recipient and
    /// token metadata.
    NonFungibleTransfer {
        token_id: U256,
        recipient: Vec<u8>,
        metadata: Vec<u8>,
    },
    /// An arbitrary payload for the generic handler.
    GenericTransfer { metadata: Vec<u8> },
}

impl MessagePayload {
    /// A short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FungibleTransfer { .. } => "FungibleTransfer",
            Self::NonFungibleTransfer { .. } => "NonFungibleTransfer",
            Self::GenericTransfer { .. } => "GenericTransfer",
        }
    }
}

/// The canonical cross-chain intent, created by a listener when it decodes a
/// deposit event and consumed exactly once by the destination writer.
/// Messages are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The chain the deposit happened on.
    pub source: ChainId,
    /// The chain the proposal must be voted on.
    pub destination: ChainId,
    /// Deposit counter assigned by the source bridge.
    pub deposit_nonce: DepositNonce,
    /// Selects the handler on the destination bridge.
    pub resource_id: ResourceId,
    /// Kind-specific transfer payload.
    pub payload: MessagePayload,
}

impl Message {
    pub fn new_fungible_transfer(
        source: ChainId,
        destination: ChainId,
        deposit_nonce: DepositNonce,
        amount: U256,
        resource_id: ResourceId,
        recipient: Vec<u8>,
    ) -> Self {
        Self {
            source,
            destination,
            deposit_nonce,
            resource_id,
            payload: MessagePayload::FungibleTransfer { amount, recipient },
        }
    }

    pub fn new_non_fungible_transfer(
        source: ChainId,
        destination: ChainId,
        deposit_nonce: DepositNonce,
        resource_id: ResourceId,
        token_id: U256,
        recipient: Vec<u8>,
        metadata: Vec<u8>,
    ) -> Self {
        Self {
            source,
            destination,
            deposit_nonce,
            resource_id,
            payload: MessagePayload::NonFungibleTransfer {
                token_id,
                recipient,
                metadata,
            },
        }
    }

    pub fn new_generic_transfer(
        source: ChainId,
        destination: ChainId,
        deposit_nonce: DepositNonce,
        resource_id: ResourceId,
        metadata: Vec<u8>,
    ) -> Self {
        Self {
            source,
            destination,
            deposit_nonce,
            resource_id,
            payload: MessagePayload::GenericTransfer { metadata },
        }
    }

    /// A short tag for logging.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fungible_constructor_sets_all_fields() {
        let m = Message::new_fungible_transfer(
            ChainId(1),
            ChainId(2),
            DepositNonce(7),
            U256::from(1_000u64),
            ResourceId([0xab; 32]),
            vec![0x11; 20],
        );
        assert_eq!(m.source, ChainId(1));
        assert_eq!(m.destination, ChainId(2));
        assert_eq!(m.deposit_nonce, DepositNonce(7));
        assert_eq!(m.resource_id, ResourceId([0xab; 32]));
        assert_eq!(m.kind(), "FungibleTransfer");
        match m.payload {
            MessagePayload::FungibleTransfer { amount, recipient } => {
                assert_eq!(amount, U256::from(1_000u64));
                assert_eq!(recipient, vec![0x11; 20]);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn payload_kinds_are_distinct() {
        let generic = Message::new_generic_transfer(
            ChainId(1),
            ChainId(2),
            DepositNonce(1),
            ResourceId([0u8; 32]),
            vec![],
        );
        let nft = Message::new_non_fungible_transfer(
            ChainId(1),
            ChainId(2),
            DepositNonce(1),
            ResourceId([0u8; 32]),
            U256::one(),
            vec![],
            vec![],
        );
        assert_eq!(generic.kind(), "GenericTransfer");
        assert_eq!(nft.kind(), "NonFungibleTransfer");
    }
}
