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

//! Event signatures the relayer observes on both chains.

use ethers::types::{Log, H256};
use ethers::utils::keccak256;
use trestle_relayer_types::{ChainId, DepositNonce, ResourceId};

/// A contract event signature, hashed into its `topics[0]` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSig(pub &'static str);

impl EventSig {
    /// The `topics[0]` value of this event.
    pub fn topic(&self) -> H256 {
        H256::from(keccak256(self.0.as_bytes()))
    }
}

/// Deposit event emitted by the source bridge.
pub const DEPOSIT_EVENT: EventSig = EventSig("Deposit(uint8,bytes32,uint64)");
/// Proposal status transition emitted by the destination bridge.
pub const PROPOSAL_EVENT: EventSig =
    EventSig("ProposalEvent(uint8,uint64,uint8,bytes32,bytes32)");
/// Individual vote record; not filtered on, kept for log visibility.
pub const PROPOSAL_VOTE_EVENT: EventSig =
    EventSig("ProposalVote(uint8,uint64,uint8,bytes32)");

/// The indexed fields of a deposit event: destination chain, resource id
/// and deposit nonce. `None` if the log does not carry the deposit topic
/// layout.
pub fn parse_deposit_topics(
    log: &Log,
) -> Option<(ChainId, ResourceId, DepositNonce)> {
    if log.topics.len() != 4 || log.topics[0] != DEPOSIT_EVENT.topic() {
        return None;
    }
    let destination = ChainId(log.topics[1].to_low_u64_be() as u8);
    let resource_id = ResourceId(log.topics[2].to_fixed_bytes());
    let nonce = DepositNonce(log.topics[3].to_low_u64_be());
    Some((destination, resource_id, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit_log(destination: u8, nonce: u64) -> Log {
        let mut topics = vec![DEPOSIT_EVENT.topic()];
        topics.push(H256::from_low_u64_be(destination as u64));
        topics.push(H256::repeat_byte(0xab));
        topics.push(H256::from_low_u64_be(nonce));
        Log {
            topics,
            ..Default::default()
        }
    }

    #[test]
    fn deposit_topic_is_the_keccak_of_the_signature() {
        assert_eq!(
            DEPOSIT_EVENT.topic(),
            H256::from(keccak256(b"Deposit(uint8,bytes32,uint64)"))
        );
        assert_ne!(DEPOSIT_EVENT.topic(), PROPOSAL_EVENT.topic());
    }

    #[test]
    fn parses_the_indexed_deposit_fields() {
        let log = deposit_log(2, 7);
        let (destination, resource_id, nonce) =
            parse_deposit_topics(&log).unwrap();
        assert_eq!(destination, ChainId(2));
        assert_eq!(resource_id, ResourceId([0xab; 32]));
        assert_eq!(nonce, DepositNonce(7));
    }

    #[test]
    fn wrong_topic0_is_ignored() {
        let mut log = deposit_log(2, 7);
        log.topics[0] = PROPOSAL_EVENT.topic();
        assert!(parse_deposit_topics(&log).is_none());
    }

    #[test]
    fn missing_topics_are_ignored() {
        let mut log = deposit_log(2, 7);
        log.topics.pop();
        assert!(parse_deposit_topics(&log).is_none());
    }
}
