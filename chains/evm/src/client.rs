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

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Address, Filter, Log, H256};
use trestle_relayer_types::{ChainId, DepositNonce, ResourceId};
use trestle_relayer_utils::Result;

use crate::api::{
    BridgeProposal, DestinationBridge, ProposalEventLog, SourceBridge,
};
use crate::connection::{Connection, TxSubmitError};
use crate::contracts;
use crate::events::PROPOSAL_EVENT;
use crate::records::{
    Erc20DepositRecord, Erc721DepositRecord, GenericDepositRecord,
};

/// Bridge and handler access for one chain, backed by the shared
/// [`Connection`].
#[derive(Clone)]
pub struct BridgeClient {
    conn: Arc<Connection>,
    bridge: Address,
}

impl BridgeClient {
    pub fn new(conn: Arc<Connection>, bridge: Address) -> Self {
        Self { conn, bridge }
    }

    /// Reads the bridge contract's `_chainID()`.
    pub async fn bridge_chain_id(&self) -> Result<u8> {
        let ret = self
            .conn
            .view_call(self.bridge, contracts::chain_id_call())
            .await?;
        contracts::decode_chain_id(&ret)
    }
}

#[async_trait]
impl SourceBridge for BridgeClient {
    async fn latest_block(&self) -> Result<u64> {
        self.conn.latest_block().await
    }

    async fn block_logs(&self, block: u64) -> Result<Vec<Log>> {
        let filter = Filter::new().from_block(block).to_block(block);
        Ok(self.conn.provider().get_logs(&filter).await?)
    }

    async fn handler_for_resource(
        &self,
        resource_id: ResourceId,
    ) -> Result<Address> {
        let call = contracts::resource_id_to_handler_address_call(resource_id);
        let ret = self.conn.view_call(self.bridge, call).await?;
        contracts::decode_handler_address(&ret)
    }

    async fn erc20_deposit_record(
        &self,
        handler: Address,
        nonce: DepositNonce,
        destination: ChainId,
    ) -> Result<Erc20DepositRecord> {
        let call = contracts::get_deposit_record_call(nonce, destination);
        let ret = self.conn.view_call(handler, call).await?;
        Erc20DepositRecord::decode(&ret)
    }

    async fn erc721_deposit_record(
        &self,
        handler: Address,
        nonce: DepositNonce,
        destination: ChainId,
    ) -> Result<Erc721DepositRecord> {
        let call = contracts::get_deposit_record_call(nonce, destination);
        let ret = self.conn.view_call(handler, call).await?;
        Erc721DepositRecord::decode(&ret)
    }

    async fn generic_deposit_record(
        &self,
        handler: Address,
        nonce: DepositNonce,
        destination: ChainId,
    ) -> Result<GenericDepositRecord> {
        let call = contracts::get_deposit_record_call(nonce, destination);
        let ret = self.conn.view_call(handler, call).await?;
        GenericDepositRecord::decode(&ret)
    }
}

#[async_trait]
impl DestinationBridge for BridgeClient {
    fn relayer_address(&self) -> Address {
        self.conn.address()
    }

    async fn latest_block(&self) -> Result<u64> {
        self.conn.latest_block().await
    }

    async fn get_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
    ) -> Result<BridgeProposal> {
        let call = contracts::get_proposal_call(source, nonce, data_hash);
        let ret = self.conn.view_call(self.bridge, call).await?;
        contracts::decode_proposal(&ret)
    }

    async fn has_voted_on_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
        relayer: Address,
    ) -> Result<bool> {
        let call = contracts::has_voted_on_proposal_call(
            contracts::id_and_nonce(source, nonce),
            data_hash,
            relayer,
        );
        let ret = self.conn.view_call(self.bridge, call).await?;
        contracts::decode_bool(&ret)
    }

    async fn vote_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        resource_id: ResourceId,
        data: &[u8],
        data_hash: H256,
    ) -> std::result::Result<H256, TxSubmitError> {
        let token = self
            .conn
            .lock_and_update_opts()
            .await
            .map_err(TxSubmitError::OptsRefresh)?;
        let calldata = contracts::vote_proposal_call(
            source,
            nonce,
            resource_id,
            data,
            data_hash,
        );
        self.conn.submit(token, self.bridge, calldata).await
    }

    async fn execute_proposal(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data: &[u8],
        resource_id: ResourceId,
    ) -> std::result::Result<H256, TxSubmitError> {
        let token = self
            .conn
            .lock_and_update_opts()
            .await
            .map_err(TxSubmitError::OptsRefresh)?;
        let calldata =
            contracts::execute_proposal_call(source, nonce, data, resource_id);
        self.conn.submit(token, self.bridge, calldata).await
    }

    async fn proposal_events(
        &self,
        block: u64,
    ) -> Result<Vec<ProposalEventLog>> {
        let filter = Filter::new()
            .address(self.bridge)
            .topic0(PROPOSAL_EVENT.topic())
            .from_block(block)
            .to_block(block);
        let logs = self.conn.provider().get_logs(&filter).await?;
        Ok(logs.iter().filter_map(parse_proposal_event).collect())
    }
}

fn parse_proposal_event(log: &Log) -> Option<ProposalEventLog> {
    if log.topics.len() < 4 {
        return None;
    }
    Some(ProposalEventLog {
        source: ChainId(log.topics[1].to_low_u64_be() as u8),
        deposit_nonce: DepositNonce(log.topics[2].to_low_u64_be()),
        status: log.topics[3].to_low_u64_be() as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;

    #[test]
    fn parses_proposal_event_topics() {
        let log = Log {
            topics: vec![
                PROPOSAL_EVENT.topic(),
                H256::from_low_u64_be(1),
                H256::from_low_u64_be(7),
                H256::from_low_u64_be(2),
            ],
            ..Default::default()
        };
        let event = parse_proposal_event(&log).unwrap();
        assert_eq!(event.source, ChainId(1));
        assert_eq!(event.deposit_nonce, DepositNonce(7));
        assert_eq!(event.status, 2);
    }

    #[test]
    fn short_proposal_event_is_ignored() {
        let log = Log {
            topics: vec![PROPOSAL_EVENT.topic()],
            ..Default::default()
        };
        assert!(parse_proposal_event(&log).is_none());
    }
}
