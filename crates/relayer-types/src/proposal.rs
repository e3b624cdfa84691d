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

//! Proposal status and the proposal data encodings submitted to the
//! destination bridge.
//!
//! The byte layouts here are wire-critical: every relayer must derive the
//! exact same bytes (and therefore the same data hash) from the same
//! deposit, or votes scatter across distinct proposals and never pass.

use ethereum_types::{H160, H256, U256};
use tiny_keccak::{Hasher, Keccak};

/// Proposal lifecycle status as reported by the destination bridge
/// contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ProposalStatus {
    Inactive = 0,
    Active = 1,
    Passed = 2,
    Transferred = 3,
    Cancelled = 4,
}

impl ProposalStatus {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Inactive),
            1 => Some(Self::Active),
            2 => Some(Self::Passed),
            3 => Some(Self::Transferred),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Voting has concluded; no further vote may be submitted.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Passed | Self::Transferred | Self::Cancelled)
    }

    /// The proposal was executed or cancelled; no further execution may be
    /// submitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transferred | Self::Cancelled)
    }
}

/// keccak256 of the handler address concatenated with the encoded proposal
/// data. This is the proposal key on the destination bridge.
pub fn data_hash(handler: H160, data: &[u8]) -> H256 {
    let mut hasher = Keccak::v256();
    hasher.update(handler.as_bytes());
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    H256(out)
}

/// `leftPad32(amount) || leftPad32(len(recipient)) || recipient`
pub fn erc20_proposal_data(amount: U256, recipient: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(64 + recipient.len());
    data.extend_from_slice(&u256_bytes(amount));
    data.extend_from_slice(&len_bytes(recipient));
    data.extend_from_slice(recipient);
    data
}

/// `leftPad32(tokenId) || leftPad32(len(recipient)) || recipient ||
/// leftPad32(len(metadata)) || metadata`
pub fn erc721_proposal_data(
    token_id: U256,
    recipient: &[u8],
    metadata: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(96 + recipient.len() + metadata.len());
    data.extend_from_slice(&u256_bytes(token_id));
    data.extend_from_slice(&len_bytes(recipient));
    data.extend_from_slice(recipient);
    data.extend_from_slice(&len_bytes(metadata));
    data.extend_from_slice(metadata);
    data
}

/// `leftPad32(len(metadata)) || metadata`
pub fn generic_proposal_data(metadata: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(32 + metadata.len());
    data.extend_from_slice(&len_bytes(metadata));
    data.extend_from_slice(metadata);
    data
}

fn u256_bytes(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn len_bytes(bytes: &[u8]) -> [u8; 32] {
    u256_bytes(U256::from(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_data_layout() {
        let recipient = vec![0x11u8; 20];
        let data = erc20_proposal_data(U256::from(1_000u64), &recipient);
        assert_eq!(data.len(), 64 + 20);
        // amount, big-endian in the last bytes of the first word
        assert_eq!(&data[..30], &[0u8; 30]);
        assert_eq!(&data[30..32], &[0x03, 0xe8]);
        // recipient length
        assert_eq!(data[63], 20);
        assert_eq!(&data[64..], recipient.as_slice());
    }

    #[test]
    fn erc721_data_layout() {
        let recipient = vec![0x22u8; 20];
        let metadata = vec![0xde, 0xad];
        let data =
            erc721_proposal_data(U256::from(77u64), &recipient, &metadata);
        assert_eq!(data.len(), 96 + 20 + 2);
        assert_eq!(data[31], 77);
        assert_eq!(data[63], 20);
        assert_eq!(&data[64..84], recipient.as_slice());
        assert_eq!(data[84 + 31], 2);
        assert_eq!(&data[116..], metadata.as_slice());
    }

    #[test]
    fn generic_data_layout() {
        let metadata = vec![0xaa; 5];
        let data = generic_proposal_data(&metadata);
        assert_eq!(data.len(), 37);
        assert_eq!(data[31], 5);
        assert_eq!(&data[32..], metadata.as_slice());
    }

    #[test]
    fn data_hash_is_deterministic() {
        let handler = H160::repeat_byte(0x42);
        let data = erc20_proposal_data(U256::from(5u64), &[0x01; 20]);
        assert_eq!(data_hash(handler, &data), data_hash(handler, &data));
    }

    #[test]
    fn data_hash_binds_the_handler_address() {
        let data = generic_proposal_data(&[0x01]);
        let a = data_hash(H160::repeat_byte(0x01), &data);
        let b = data_hash(H160::repeat_byte(0x02), &data);
        assert_ne!(a, b);
    }

    #[test]
    fn status_mapping_round_trips() {
        for raw in 0..=4u8 {
            let status = ProposalStatus::from_u8(raw).unwrap();
            assert_eq!(status as u8, raw);
        }
        assert_eq!(ProposalStatus::from_u8(5), None);
    }

    #[test]
    fn complete_and_terminal_sets() {
        use ProposalStatus::*;
        assert!(!Inactive.is_complete());
        assert!(!Active.is_complete());
        assert!(Passed.is_complete());
        assert!(Transferred.is_complete());
        assert!(Cancelled.is_complete());

        assert!(!Passed.is_terminal());
        assert!(Transferred.is_terminal());
        assert!(Cancelled.is_terminal());
    }
}
