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

use ethers::types::Address;
use tokio::sync::mpsc;
use trestle_relayer_config::ChainConfig;
use trestle_relayer_core::{Router, ShutdownListener};
use trestle_relayer_store::BlockStore;
use trestle_relayer_types::{ChainId, DepositNonce, Message};
use trestle_relayer_utils::{metric::ChainMetrics, probe, retry, Error, Result};

use crate::api::SourceBridge;
use crate::events::parse_deposit_topics;

/// Time between polling retries, and between polls while a block is inside
/// the confirmation window.
pub const BLOCK_RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Consecutive polling failures tolerated before escalating to the
/// controller.
pub const BLOCK_RETRY_LIMIT: usize = 5;

const RECORD_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const RECORD_RETRY_COUNT: usize = 5;

/// Polls the source chain one block at a time, decodes every deposit event
/// bound to the configured bridge and hands the resulting messages to the
/// router.
///
/// The cursor only ever advances. A crash between routing a block's events
/// and persisting the cursor re-emits that block on restart; the writer's
/// pre-checks absorb the duplicates.
pub struct Listener<S: SourceBridge> {
    cfg: ChainConfig,
    chain_id: ChainId,
    source: Arc<S>,
    block_store: Arc<dyn BlockStore>,
    start_block: u64,
    shutdown: ShutdownListener,
    sys_err: mpsc::UnboundedSender<Error>,
    metrics: Option<ChainMetrics>,
}

impl<S: SourceBridge> Listener<S> {
    pub fn new(
        cfg: ChainConfig,
        source: Arc<S>,
        block_store: Arc<dyn BlockStore>,
        start_block: u64,
        shutdown: ShutdownListener,
        sys_err: mpsc::UnboundedSender<Error>,
        metrics: Option<ChainMetrics>,
    ) -> Self {
        let chain_id = ChainId(cfg.chain_id);
        Self {
            cfg,
            chain_id,
            source,
            block_store,
            start_block,
            shutdown,
            sys_err,
            metrics,
        }
    }

    /// The polling loop. Runs until the stop signal fires or the retry
    /// limit is exhausted.
    #[tracing::instrument(skip_all, fields(chain = %self.cfg.name))]
    pub async fn poll_blocks(mut self, router: Arc<Router>) -> Result<()> {
        let mut current_block = self.start_block;
        let mut retry = BLOCK_RETRY_LIMIT;
        tracing::info!(block = current_block, "polling blocks...");
        loop {
            if self.shutdown.is_shutdown() {
                tracing::debug!("polling terminated");
                return Ok(());
            }
            if retry == 0 {
                tracing::error!("polling failed, retries exceeded");
                let _ = self.sys_err.send(Error::FatalPolling);
                return Ok(());
            }

            let latest_block = match self.source.latest_block().await {
                Ok(latest) => latest,
                Err(e) => {
                    tracing::error!(
                        block = current_block,
                        error = %e,
                        "unable to get latest block"
                    );
                    retry -= 1;
                    self.sleep(BLOCK_RETRY_INTERVAL).await;
                    continue;
                }
            };
            if let Some(metrics) = &self.metrics {
                metrics.latest_known_block.set(latest_block as f64);
            }

            if latest_block.saturating_sub(current_block)
                < self.cfg.block_confirmations
            {
                tracing::debug!(
                    target_block = current_block,
                    latest_block,
                    "block not ready, will retry"
                );
                self.sleep(BLOCK_RETRY_INTERVAL).await;
                continue;
            }

            if let Err(e) = self.process_block(current_block, &router).await {
                tracing::error!(
                    block = current_block,
                    error = %e,
                    "failed to get events for block"
                );
                retry -= 1;
                self.sleep(BLOCK_RETRY_INTERVAL).await;
                continue;
            }

            // best effort: a lost cursor only re-emits a block on restart
            if let Err(e) = self.block_store.store_block(current_block) {
                tracing::error!(
                    block = current_block,
                    error = %e,
                    "failed to write latest block to blockstore"
                );
            }
            if let Some(metrics) = &self.metrics {
                metrics.blocks_processed.inc();
                metrics.latest_processed_block.set(latest_block as f64);
            }
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::TRACE,
                kind = %probe::Kind::Sync,
                chain_id = %self.chain_id,
                block = current_block,
                latest_block,
            );

            current_block += 1;
            retry = BLOCK_RETRY_LIMIT;
        }
    }

    /// Decodes every deposit event in `block` and routes the resulting
    /// messages. An RPC failure fails the whole block so it is retried; an
    /// unrecognized handler only skips that event.
    async fn process_block(&self, block: u64, router: &Router) -> Result<()> {
        tracing::debug!(block, "querying block for deposit events");
        let logs = self.source.block_logs(block).await?;
        for log in logs {
            if log.address != self.cfg.bridge {
                continue;
            }
            let Some((destination, resource_id, nonce)) =
                parse_deposit_topics(&log)
            else {
                continue;
            };
            let handler =
                self.source.handler_for_resource(resource_id).await?;
            let message = match self
                .decode_deposit(handler, destination, nonce)
                .await?
            {
                Some(message) => message,
                None => {
                    tracing::error!(
                        handler = ?handler,
                        nonce = %nonce,
                        "deposit event has an unrecognized handler"
                    );
                    continue;
                }
            };
            if let Err(e) = router.send(message).await {
                tracing::error!(error = %e, "failed to route message");
            }
        }
        Ok(())
    }

    async fn decode_deposit(
        &self,
        handler: Address,
        destination: ChainId,
        nonce: DepositNonce,
    ) -> Result<Option<Message>> {
        if Some(handler) == self.cfg.erc20_handler {
            self.handle_erc20_deposit(handler, destination, nonce)
                .await
                .map(Some)
        } else if Some(handler) == self.cfg.erc721_handler {
            self.handle_erc721_deposit(handler, destination, nonce)
                .await
                .map(Some)
        } else if Some(handler) == self.cfg.generic_handler {
            self.handle_generic_deposit(handler, destination, nonce)
                .await
                .map(Some)
        } else {
            Ok(None)
        }
    }

    async fn handle_erc20_deposit(
        &self,
        handler: Address,
        destination: ChainId,
        nonce: DepositNonce,
    ) -> Result<Message> {
        tracing::info!(
            dest = %destination,
            nonce = %nonce,
            "handling fungible deposit event"
        );
        let backoff = retry::ConstantWithMaxRetryCount::new(
            RECORD_RETRY_INTERVAL,
            RECORD_RETRY_COUNT,
        );
        let record = backoff::future::retry(backoff, || async {
            self.source
                .erc20_deposit_record(handler, nonce, destination)
                .await
                .map_err(backoff::Error::transient)
        })
        .await?;
        Ok(Message::new_fungible_transfer(
            self.chain_id,
            destination,
            nonce,
            record.amount,
            record.resource_id,
            record.destination_recipient_address,
        ))
    }

    async fn handle_erc721_deposit(
        &self,
        handler: Address,
        destination: ChainId,
        nonce: DepositNonce,
    ) -> Result<Message> {
        tracing::info!(
            dest = %destination,
            nonce = %nonce,
            "handling nonfungible deposit event"
        );
        let backoff = retry::ConstantWithMaxRetryCount::new(
            RECORD_RETRY_INTERVAL,
            RECORD_RETRY_COUNT,
        );
        let record = backoff::future::retry(backoff, || async {
            self.source
                .erc721_deposit_record(handler, nonce, destination)
                .await
                .map_err(backoff::Error::transient)
        })
        .await?;
        Ok(Message::new_non_fungible_transfer(
            self.chain_id,
            destination,
            nonce,
            record.resource_id,
            record.token_id,
            record.destination_recipient_address,
            record.metadata,
        ))
    }

    async fn handle_generic_deposit(
        &self,
        handler: Address,
        destination: ChainId,
        nonce: DepositNonce,
    ) -> Result<Message> {
        tracing::info!(
            dest = %destination,
            nonce = %nonce,
            "handling generic deposit event"
        );
        let backoff = retry::ConstantWithMaxRetryCount::new(
            RECORD_RETRY_INTERVAL,
            RECORD_RETRY_COUNT,
        );
        let record = backoff::future::retry(backoff, || async {
            self.source
                .generic_deposit_record(handler, nonce, destination)
                .await
                .map_err(backoff::Error::transient)
        })
        .await?;
        Ok(Message::new_generic_transfer(
            self.chain_id,
            destination,
            nonce,
            record.resource_id,
            record.metadata,
        ))
    }

    async fn sleep(&mut self, duration: Duration) {
        tokio::select! {
            _ = self.shutdown.recv() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DEPOSIT_EVENT;
    use crate::records::Erc20DepositRecord;
    use async_trait::async_trait;
    use ethers::types::{Log, H256, U256};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use trestle_relayer_core::{
        MessageWriter, ShutdownSignal,
    };
    use trestle_relayer_store::InMemoryBlockStore;
    use trestle_relayer_types::{MessagePayload, ResourceId};
    use url::Url;

    fn bridge() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn erc20_handler() -> Address {
        Address::repeat_byte(0x20)
    }

    struct MockSource {
        latest: AtomicU64,
        fail_latest: AtomicBool,
        logs: Mutex<HashMap<u64, Vec<Log>>>,
        handler: Address,
        erc20: Option<Erc20DepositRecord>,
    }

    impl MockSource {
        fn new(latest: u64) -> Self {
            Self {
                latest: AtomicU64::new(latest),
                fail_latest: AtomicBool::new(false),
                logs: Mutex::new(HashMap::new()),
                handler: erc20_handler(),
                erc20: Some(erc20_record()),
            }
        }
    }

    #[async_trait]
    impl SourceBridge for MockSource {
        async fn latest_block(&self) -> Result<u64> {
            if self.fail_latest.load(Ordering::SeqCst) {
                return Err(Error::Generic("rpc unavailable"));
            }
            Ok(self.latest.load(Ordering::SeqCst))
        }

        async fn block_logs(&self, block: u64) -> Result<Vec<Log>> {
            Ok(self.logs.lock().get(&block).cloned().unwrap_or_default())
        }

        async fn handler_for_resource(
            &self,
            _resource_id: ResourceId,
        ) -> Result<Address> {
            Ok(self.handler)
        }

        async fn erc20_deposit_record(
            &self,
            _handler: Address,
            _nonce: DepositNonce,
            _destination: ChainId,
        ) -> Result<Erc20DepositRecord> {
            self.erc20
                .clone()
                .ok_or(Error::Generic("no deposit record"))
        }

        async fn erc721_deposit_record(
            &self,
            _handler: Address,
            _nonce: DepositNonce,
            _destination: ChainId,
        ) -> Result<crate::records::Erc721DepositRecord> {
            Err(Error::Generic("no deposit record"))
        }

        async fn generic_deposit_record(
            &self,
            _handler: Address,
            _nonce: DepositNonce,
            _destination: ChainId,
        ) -> Result<crate::records::GenericDepositRecord> {
            Err(Error::Generic("no deposit record"))
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl MessageWriter for RecordingWriter {
        async fn resolve_message(&self, message: Message) -> bool {
            self.seen.lock().push(message);
            true
        }
    }

    fn erc20_record() -> Erc20DepositRecord {
        Erc20DepositRecord {
            token_address: Address::repeat_byte(0x01),
            len_destination_recipient_address: 20,
            destination_chain_id: 2,
            resource_id: ResourceId([0xab; 32]),
            destination_recipient_address: vec![0x11; 20],
            depositer: Address::repeat_byte(0x02),
            amount: U256::from(1_000u64),
        }
    }

    fn deposit_log(destination: u8, nonce: u64) -> Log {
        Log {
            address: bridge(),
            topics: vec![
                DEPOSIT_EVENT.topic(),
                H256::from_low_u64_be(destination as u64),
                H256::repeat_byte(0xab),
                H256::from_low_u64_be(nonce),
            ],
            ..Default::default()
        }
    }

    fn test_config() -> ChainConfig {
        ChainConfig {
            name: "testchain".into(),
            enabled: true,
            chain_id: 1,
            endpoint: Url::parse("http://localhost:8545").unwrap(),
            from: Address::repeat_byte(0xfe),
            keystore_path: "/tmp/keys".into(),
            blockstore_path: "/tmp/blocks".into(),
            bridge: bridge(),
            erc20_handler: Some(erc20_handler()),
            erc721_handler: None,
            generic_handler: None,
            start_block: 98,
            fresh_start: false,
            latest_block: false,
            block_confirmations: 3,
            gas_limit: 6_721_975,
            max_gas_price: 20_000_000_000,
        }
    }

    struct Fixture {
        source: Arc<MockSource>,
        store: InMemoryBlockStore,
        writer: Arc<RecordingWriter>,
        router: Arc<Router>,
        shutdown: ShutdownSignal,
        sys_err_rx: mpsc::UnboundedReceiver<Error>,
        listener: Listener<MockSource>,
    }

    fn fixture(source: MockSource, cfg: ChainConfig) -> Fixture {
        let source = Arc::new(source);
        let store = InMemoryBlockStore::default();
        let writer = Arc::new(RecordingWriter::default());
        let router = Arc::new(Router::new());
        router.register(ChainId(2), writer.clone()).unwrap();
        let shutdown = ShutdownSignal::new();
        let (sys_err_tx, sys_err_rx) = mpsc::unbounded_channel();
        let listener = Listener::new(
            cfg.clone(),
            source.clone(),
            Arc::new(store.clone()),
            cfg.start_block,
            shutdown.listen(),
            sys_err_tx,
            None,
        );
        Fixture {
            source,
            store,
            writer,
            router,
            shutdown,
            sys_err_rx,
            listener,
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..10_000 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn routes_a_fungible_deposit_once_confirmed() {
        let source = MockSource::new(102);
        source.logs.lock().insert(100, vec![deposit_log(2, 7)]);
        let f = fixture(source, test_config());
        let handle = tokio::spawn(f.listener.poll_blocks(f.router.clone()));

        // advance a few polling rounds: 102 - 100 < 3, nothing must arrive
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(f.writer.seen.lock().is_empty());

        // one more block and 100 reaches confirmation depth
        f.source.latest.store(103, Ordering::SeqCst);
        wait_until(|| !f.writer.seen.lock().is_empty()).await;

        {
            let seen = f.writer.seen.lock();
            assert_eq!(seen.len(), 1);
            let message = &seen[0];
            assert_eq!(message.source, ChainId(1));
            assert_eq!(message.destination, ChainId(2));
            assert_eq!(message.deposit_nonce, DepositNonce(7));
            assert_eq!(message.resource_id, ResourceId([0xab; 32]));
            match &message.payload {
                MessagePayload::FungibleTransfer { amount, recipient } => {
                    assert_eq!(*amount, U256::from(1_000u64));
                    assert_eq!(recipient.len(), 20);
                }
                other => panic!("unexpected payload: {other:?}"),
            }
        }
        wait_until(|| {
            f.store.try_load_latest_block().unwrap() >= Some(100)
        })
        .await;

        f.shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn skips_foreign_addresses_and_topics() {
        let source = MockSource::new(110);
        let mut foreign = deposit_log(2, 8);
        foreign.address = Address::repeat_byte(0x99);
        let mut wrong_topic = deposit_log(2, 9);
        wrong_topic.topics[0] = H256::repeat_byte(0x01);
        source
            .logs
            .lock()
            .insert(100, vec![foreign, wrong_topic, deposit_log(2, 7)]);
        let f = fixture(source, test_config());
        let handle = tokio::spawn(f.listener.poll_blocks(f.router.clone()));

        wait_until(|| !f.writer.seen.lock().is_empty()).await;
        let seen = f.writer.seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].deposit_nonce, DepositNonce(7));

        f.shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_handler_skips_the_event_but_completes_the_block() {
        let mut source = MockSource::new(110);
        source.handler = Address::repeat_byte(0x77);
        source.logs.lock().insert(100, vec![deposit_log(2, 7)]);
        let f = fixture(source, test_config());
        let handle = tokio::spawn(f.listener.poll_blocks(f.router.clone()));

        wait_until(|| {
            f.store.try_load_latest_block().unwrap() >= Some(100)
        })
        .await;
        assert!(f.writer.seen.lock().is_empty());

        f.shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_polling_retries_escalate_to_the_controller() {
        let source = MockSource::new(110);
        source.fail_latest.store(true, Ordering::SeqCst);
        let mut f = fixture(source, test_config());
        let handle = tokio::spawn(f.listener.poll_blocks(f.router.clone()));

        let err = f.sys_err_rx.recv().await.unwrap();
        assert!(matches!(err, Error::FatalPolling));
        // the loop exits on its own after escalating
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let f = fixture(MockSource::new(0), test_config());
        let handle = tokio::spawn(f.listener.poll_blocks(f.router.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        f.shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }
}
