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

//! The chain-contract seams the listener and writer are written against.
//! The production implementation is [`BridgeClient`](crate::BridgeClient);
//! tests substitute stubs.

use async_trait::async_trait;
use ethers::types::{Address, Log, H256, U256};
use trestle_relayer_types::{
    ChainId, DepositNonce, ProposalStatus, ResourceId,
};
use trestle_relayer_utils::Result;

use crate::connection::TxSubmitError;
use crate::records::{
    Erc20DepositRecord, Erc721DepositRecord, GenericDepositRecord,
};

/// A proposal record read from the destination bridge.
#[derive(Debug, Clone)]
pub struct BridgeProposal {
    pub resource_id: ResourceId,
    pub data_hash: H256,
    pub yes_votes: Vec<Address>,
    pub no_votes: Vec<Address>,
    pub status: ProposalStatus,
    pub proposed_block: U256,
}

/// The indexed fields of a decoded `ProposalEvent` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalEventLog {
    pub source: ChainId,
    pub deposit_nonce: DepositNonce,
    pub status: u8,
}

/// Source-chain reads the listener depends on.
#[async_trait]
pub trait SourceBridge: Send + Sync + 'static {
    /// Current chain head.
    async fn latest_block(&self) -> Result<u64>;

    /// Every log emitted in `block`, regardless of contract; the listener
    /// filters by address and topic itself.
    async fn block_logs(&self, block: u64) -> Result<Vec<Log>>;

    /// The handler contract the bridge maps `resource_id` to.
    async fn handler_for_resource(
        &self,
        resource_id: ResourceId,
    ) -> Result<Address>;

    async fn erc20_deposit_record(
        &self,
        handler: Address,
        nonce: DepositNonce,
        destination: ChainId,
    ) -> Result<Erc20DepositRecord>;

    async fn erc721_deposit_record(
        &self,
        handler: Address,
        nonce: DepositNonce,
        destination: ChainId,
    ) -> Result<Erc721DepositRecord>;

    async fn generic_deposit_record(
        &self,
        handler: Address,
        nonce: DepositNonce,
        destination: ChainId,
    ) -> Result<GenericDepositRecord>;
}

/// Destination-bridge operations the writer drives.
#[async_trait]
pub trait DestinationBridge: Send + Sync + 'static {
    /// The relayer identity that votes are accounted to on chain.
    fn relayer_address(&self) -> Address;

    /// Current chain head.
    async fn latest_block(&self) -> Result<u64>;

    async fn get_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
    ) -> Result<BridgeProposal>;

    async fn has_voted_on_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
        relayer: Address,
    ) -> Result<bool>;

    /// Submits the vote transaction, holding the submission slot for the
    /// whole prepare-submit window.
    async fn vote_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        resource_id: ResourceId,
        data: &[u8],
        data_hash: H256,
    ) -> std::result::Result<H256, TxSubmitError>;

    /// Submits the execute transaction, with the same slot discipline as
    /// [`Self::vote_proposal`].
    async fn execute_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data: &[u8],
        resource_id: ResourceId,
    ) -> std::result::Result<H256, TxSubmitError>;

    /// `ProposalEvent` logs emitted by the bridge in `block`.
    async fn proposal_events(
        &self,
        block: u64,
    ) -> Result<Vec<ProposalEventLog>>;
}
