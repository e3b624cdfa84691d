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
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::H256;
use tokio::sync::mpsc;
use trestle_relayer_config::ChainConfig;
use trestle_relayer_core::{MessageWriter, ShutdownListener};
use trestle_relayer_types::proposal;
use trestle_relayer_types::{
    ChainId, DepositNonce, Message, MessagePayload, ProposalStatus,
};
use trestle_relayer_utils::{metric::ChainMetrics, probe, Error};

use crate::api::DestinationBridge;
use crate::connection::TxSubmitError;
use crate::listener::{BLOCK_RETRY_INTERVAL, BLOCK_RETRY_LIMIT};

/// Time between retrying a failed transaction.
pub const TX_RETRY_INTERVAL: Duration = Duration::from_secs(2);
/// Submission attempts per proposal before escalating to the controller.
pub const TX_RETRY_LIMIT: usize = 10;
/// How many consecutive blocks the execution watcher scans for the
/// finalization event before giving up.
pub const EXECUTE_BLOCK_WATCH_LIMIT: u64 = 100;

/// Progress of one bounded submit/reconcile loop. The fatal edge is only
/// reachable from `Submitting`, after `TX_RETRY_LIMIT` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitState {
    /// Reserve the options slot and submit the transaction.
    Submitting,
    /// Back off after a failed submission.
    Sleeping,
    /// Check whether another relayer already finished the proposal.
    Reconciling,
}

/// Consumes messages addressed to its chain: builds the handler-specific
/// proposal data, votes on the proposal, and once the vote lands watches
/// for finalization to execute it.
pub struct Writer<D: DestinationBridge> {
    cfg: ChainConfig,
    chain_id: ChainId,
    bridge: Arc<D>,
    shutdown: ShutdownListener,
    sys_err: mpsc::UnboundedSender<Error>,
    metrics: Option<ChainMetrics>,
}

impl<D: DestinationBridge> Clone for Writer<D> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            chain_id: self.chain_id,
            bridge: Arc::clone(&self.bridge),
            shutdown: self.shutdown.clone(),
            sys_err: self.sys_err.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[async_trait]
impl<D: DestinationBridge> MessageWriter for Writer<D> {
    #[tracing::instrument(skip_all, fields(chain = %self.cfg.name))]
    async fn resolve_message(&self, message: Message) -> bool {
        tracing::info!(
            kind = message.kind(),
            src = %message.source,
            dst = %message.destination,
            nonce = %message.deposit_nonce,
            resource_id = %message.resource_id,
            "attempting to resolve message"
        );
        let (handler, data) = match &message.payload {
            MessagePayload::FungibleTransfer { amount, recipient } => {
                tracing::info!(
                    src = %message.source,
                    nonce = %message.deposit_nonce,
                    "creating erc20 proposal"
                );
                let Some(handler) = self.cfg.erc20_handler else {
                    tracing::error!("no erc20 handler configured");
                    return false;
                };
                (handler, proposal::erc20_proposal_data(*amount, recipient))
            }
            MessagePayload::NonFungibleTransfer {
                token_id,
                recipient,
                metadata,
            } => {
                tracing::info!(
                    src = %message.source,
                    nonce = %message.deposit_nonce,
                    "creating erc721 proposal"
                );
                let Some(handler) = self.cfg.erc721_handler else {
                    tracing::error!("no erc721 handler configured");
                    return false;
                };
                (
                    handler,
                    proposal::erc721_proposal_data(
                        *token_id, recipient, metadata,
                    ),
                )
            }
            MessagePayload::GenericTransfer { metadata } => {
                tracing::info!(
                    src = %message.source,
                    nonce = %message.deposit_nonce,
                    "creating generic proposal"
                );
                let Some(handler) = self.cfg.generic_handler else {
                    tracing::error!("no generic handler configured");
                    return false;
                };
                (handler, proposal::generic_proposal_data(metadata))
            }
        };
        let data_hash = proposal::data_hash(handler, &data);

        if !self.should_vote(&message, data_hash).await {
            return true;
        }
        if !self.vote_proposal(&message, data_hash, &data).await {
            return false;
        }

        // drive execution from a background task so the listener is not
        // held up for up to ExecuteBlockWatchLimit blocks
        match self.bridge.latest_block().await {
            Ok(latest_block) => {
                let writer = self.clone();
                tokio::spawn(async move {
                    writer
                        .watch_then_execute(
                            message,
                            data,
                            data_hash,
                            latest_block,
                        )
                        .await;
                });
            }
            Err(e) => tracing::error!(
                error = %e,
                "unable to fetch latest block, skipping execution watch"
            ),
        }
        true
    }
}

impl<D: DestinationBridge> Writer<D> {
    pub fn new(
        cfg: ChainConfig,
        bridge: Arc<D>,
        shutdown: ShutdownListener,
        sys_err: mpsc::UnboundedSender<Error>,
        metrics: Option<ChainMetrics>,
    ) -> Self {
        let chain_id = ChainId(cfg.chain_id);
        Self {
            cfg,
            chain_id,
            bridge,
            shutdown,
            sys_err,
            metrics,
        }
    }

    /// Pre-checks before voting: skip when the proposal already concluded
    /// or this relayer already voted. Both conditions make a vote a revert
    /// on chain.
    async fn should_vote(&self, message: &Message, data_hash: H256) -> bool {
        if self
            .proposal_is_complete(
                message.source,
                message.deposit_nonce,
                data_hash,
            )
            .await
        {
            tracing::info!(
                src = %message.source,
                nonce = %message.deposit_nonce,
                "proposal complete, not voting"
            );
            return false;
        }
        if self
            .has_voted(message.source, message.deposit_nonce, data_hash)
            .await
        {
            tracing::info!(
                src = %message.source,
                nonce = %message.deposit_nonce,
                "relayer has already voted, not voting"
            );
            return false;
        }
        true
    }

    /// Bounded submit/reconcile loop for the vote transaction. Exhaustion
    /// escalates to the controller: a vote that cannot land is a relayer
    /// liveness bug, not a skippable message.
    async fn vote_proposal(
        &self,
        message: &Message,
        data_hash: H256,
        data: &[u8],
    ) -> bool {
        let mut attempts = 0;
        let mut state = SubmitState::Submitting;
        loop {
            if self.shutdown.is_shutdown() {
                return false;
            }
            match state {
                SubmitState::Submitting => {
                    if attempts == TX_RETRY_LIMIT {
                        tracing::error!(
                            src = %message.source,
                            dst = %message.destination,
                            nonce = %message.deposit_nonce,
                            "submission of vote transaction failed"
                        );
                        let _ = self.sys_err.send(Error::FatalTx);
                        return false;
                    }
                    attempts += 1;
                    let submitted = self
                        .bridge
                        .vote_proposal(
                            message.source,
                            message.deposit_nonce,
                            message.resource_id,
                            data,
                            data_hash,
                        )
                        .await;
                    match submitted {
                        Ok(tx_hash) => {
                            tracing::info!(
                                tx = ?tx_hash,
                                src = %message.source,
                                nonce = %message.deposit_nonce,
                                "submitted proposal vote"
                            );
                            if let Some(metrics) = &self.metrics {
                                metrics.votes_submitted.inc();
                            }
                            tracing::event!(
                                target: probe::TARGET,
                                tracing::Level::DEBUG,
                                kind = %probe::Kind::Vote,
                                chain_id = %self.chain_id,
                                src = %message.source,
                                nonce = %message.deposit_nonce,
                            );
                            return true;
                        }
                        Err(TxSubmitError::OptsRefresh(e)) => {
                            tracing::error!(
                                error = %e,
                                "failed to update tx opts"
                            );
                        }
                        Err(TxSubmitError::NonceTooLow)
                        | Err(TxSubmitError::ReplacementUnderpriced) => {
                            tracing::debug!("nonce too low, will retry");
                            state = SubmitState::Sleeping;
                        }
                        Err(TxSubmitError::Other(e)) => {
                            tracing::warn!(
                                src = %message.source,
                                dst = %message.destination,
                                nonce = %message.deposit_nonce,
                                error = %e,
                                "voting failed"
                            );
                            state = SubmitState::Sleeping;
                        }
                    }
                }
                SubmitState::Sleeping => {
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::TRACE,
                        kind = %probe::Kind::Retry,
                        chain_id = %self.chain_id,
                        nonce = %message.deposit_nonce,
                    );
                    self.sleep(TX_RETRY_INTERVAL).await;
                    state = SubmitState::Reconciling;
                }
                SubmitState::Reconciling => {
                    if self
                        .proposal_is_complete(
                            message.source,
                            message.deposit_nonce,
                            data_hash,
                        )
                        .await
                    {
                        tracing::info!(
                            src = %message.source,
                            dst = %message.destination,
                            nonce = %message.deposit_nonce,
                            "proposal voting complete on chain"
                        );
                        return true;
                    }
                    state = SubmitState::Submitting;
                }
            }
        }
    }

    /// After a vote lands, scans forward from `latest_block` for the
    /// bridge's finalization event and executes the proposal when it
    /// appears.
    async fn watch_then_execute(
        &self,
        message: Message,
        data: Vec<u8>,
        data_hash: H256,
        mut latest_block: u64,
    ) {
        tracing::info!(
            src = %message.source,
            nonce = %message.deposit_nonce,
            "watching for finalization event"
        );
        for _ in 0..EXECUTE_BLOCK_WATCH_LIMIT {
            if self.shutdown.is_shutdown() {
                return;
            }
            for _ in 0..BLOCK_RETRY_LIMIT {
                match self.wait_for_block(latest_block).await {
                    Ok(()) => break,
                    Err(e) => tracing::error!(
                        block = latest_block,
                        error = %e,
                        "waiting for block failed"
                    ),
                }
            }
            let events = match self.bridge.proposal_events(latest_block).await
            {
                Ok(events) => events,
                Err(e) => {
                    tracing::error!(error = %e, "failed to fetch logs");
                    return;
                }
            };
            for event in events {
                if event.source == message.source
                    && event.deposit_nonce == message.deposit_nonce
                    && ProposalStatus::from_u8(event.status)
                        == Some(ProposalStatus::Passed)
                {
                    self.execute_proposal(&message, &data, data_hash).await;
                    return;
                }
                tracing::trace!(
                    src = %event.source,
                    nonce = %event.deposit_nonce,
                    "ignoring event"
                );
            }
            tracing::trace!(
                block = latest_block,
                src = %message.source,
                nonce = %message.deposit_nonce,
                "no finalization event found in current block"
            );
            latest_block += 1;
        }
        tracing::warn!(
            src = %message.source,
            dst = %message.destination,
            nonce = %message.deposit_nonce,
            "block watch limit exceeded, skipping execution"
        );
    }

    /// Bounded submit/reconcile loop for the execute transaction, mirroring
    /// [`Self::vote_proposal`] with the terminal reconcile predicate.
    async fn execute_proposal(
        &self,
        message: &Message,
        data: &[u8],
        data_hash: H256,
    ) {
        let mut attempts = 0;
        let mut state = SubmitState::Submitting;
        loop {
            if self.shutdown.is_shutdown() {
                return;
            }
            match state {
                SubmitState::Submitting => {
                    if attempts == TX_RETRY_LIMIT {
                        tracing::error!(
                            src = %message.source,
                            dst = %message.destination,
                            nonce = %message.deposit_nonce,
                            "submission of execute transaction failed"
                        );
                        let _ = self.sys_err.send(Error::FatalTx);
                        return;
                    }
                    attempts += 1;
                    let submitted = self
                        .bridge
                        .execute_proposal(
                            message.source,
                            message.deposit_nonce,
                            data,
                            message.resource_id,
                        )
                        .await;
                    match submitted {
                        Ok(tx_hash) => {
                            tracing::info!(
                                tx = ?tx_hash,
                                src = %message.source,
                                dst = %message.destination,
                                nonce = %message.deposit_nonce,
                                "submitted proposal execution"
                            );
                            if let Some(metrics) = &self.metrics {
                                metrics.proposals_executed.inc();
                            }
                            tracing::event!(
                                target: probe::TARGET,
                                tracing::Level::DEBUG,
                                kind = %probe::Kind::Execute,
                                chain_id = %self.chain_id,
                                src = %message.source,
                                nonce = %message.deposit_nonce,
                            );
                            return;
                        }
                        Err(TxSubmitError::OptsRefresh(e)) => {
                            tracing::error!(
                                error = %e,
                                "failed to update tx opts"
                            );
                        }
                        Err(TxSubmitError::NonceTooLow)
                        | Err(TxSubmitError::ReplacementUnderpriced) => {
                            tracing::debug!("nonce too low, will retry");
                            state = SubmitState::Sleeping;
                        }
                        Err(TxSubmitError::Other(e)) => {
                            tracing::warn!(
                                error = %e,
                                "execution failed, proposal may already be complete"
                            );
                            state = SubmitState::Sleeping;
                        }
                    }
                }
                SubmitState::Sleeping => {
                    self.sleep(TX_RETRY_INTERVAL).await;
                    state = SubmitState::Reconciling;
                }
                SubmitState::Reconciling => {
                    if self
                        .proposal_is_finalized(
                            message.source,
                            message.deposit_nonce,
                            data_hash,
                        )
                        .await
                    {
                        tracing::info!(
                            src = %message.source,
                            dst = %message.destination,
                            nonce = %message.deposit_nonce,
                            "proposal finalized on chain"
                        );
                        return;
                    }
                    state = SubmitState::Submitting;
                }
            }
        }
    }

    /// Waits until `block` is at confirmation depth behind the chain head.
    async fn wait_for_block(
        &self,
        block: u64,
    ) -> Result<(), Error> {
        loop {
            if self.shutdown.is_shutdown() {
                return Ok(());
            }
            let latest = self.bridge.latest_block().await?;
            if latest.saturating_sub(block) >= self.cfg.block_confirmations {
                return Ok(());
            }
            tracing::trace!(
                target_block = block,
                latest,
                "block not ready, waiting"
            );
            self.sleep(BLOCK_RETRY_INTERVAL).await;
        }
    }

    async fn proposal_is_complete(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
    ) -> bool {
        match self.bridge.get_proposal(source, nonce, data_hash).await {
            Ok(prop) => prop.status.is_complete(),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to check proposal existence"
                );
                false
            }
        }
    }

    async fn proposal_is_finalized(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
    ) -> bool {
        match self.bridge.get_proposal(source, nonce, data_hash).await {
            Ok(prop) => prop.status.is_terminal(),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to check proposal existence"
                );
                false
            }
        }
    }

    async fn has_voted(
        &self,
        source: ChainId,
        nonce: DepositNonce,
        data_hash: H256,
    ) -> bool {
        let relayer = self.bridge.relayer_address();
        match self
            .bridge
            .has_voted_on_proposal(source, nonce, data_hash, relayer)
            .await
        {
            Ok(voted) => voted,
            Err(e) => {
                tracing::error!(error = %e, "failed to check vote record");
                false
            }
        }
    }

    async fn sleep(&self, duration: Duration) {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = shutdown.recv() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}
