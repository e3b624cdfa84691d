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
use parking_lot::Mutex;
use tokio::sync::mpsc;
use trestle_relayer_config::ChainConfig;
use trestle_relayer_core::{
    Chain, MessageWriter, Router, ShutdownSignal,
};
use trestle_relayer_store::{BlockStore, FsBlockStore};
use trestle_relayer_types::ChainId;
use trestle_relayer_utils::{metric::ChainMetrics, Error, Result};

use crate::client::BridgeClient;
use crate::connection::Connection;
use crate::keystore;
use crate::listener::Listener;
use crate::writer::Writer;

/// A fully wired engine for one EVM chain: connection, listener and
/// writer, sharing one stop signal.
pub struct EvmChain {
    cfg: ChainConfig,
    writer: Arc<Writer<BridgeClient>>,
    listener: Mutex<Option<Listener<BridgeClient>>>,
    shutdown: ShutdownSignal,
}

impl EvmChain {
    /// Builds the engine: unlocks the keystore, opens the block store and
    /// resumes its cursor, connects, checks that every configured contract
    /// holds code, and verifies the bridge's chain id against the
    /// configuration. Any failure here aborts before `start`.
    pub async fn initialize(
        cfg: ChainConfig,
        sys_err: mpsc::UnboundedSender<Error>,
        metrics: Option<ChainMetrics>,
    ) -> Result<Self> {
        let password = keystore::keystore_password(cfg.from)?;
        let wallet =
            keystore::unlock_keystore(&cfg.keystore_path, cfg.from, &password)?;

        let block_store =
            FsBlockStore::new(&cfg.blockstore_path, ChainId(cfg.chain_id), cfg.from)?;
        let mut start_block = resume_start_block(&cfg, &block_store)?;

        let conn = Arc::new(
            Connection::connect(
                &cfg.endpoint,
                wallet,
                cfg.gas_limit,
                cfg.max_gas_price,
            )
            .await?,
        );
        conn.ensure_has_bytecode(cfg.bridge).await?;
        for handler in
            [cfg.erc20_handler, cfg.erc721_handler, cfg.generic_handler]
                .into_iter()
                .flatten()
        {
            conn.ensure_has_bytecode(handler).await?;
        }

        let client = Arc::new(BridgeClient::new(Arc::clone(&conn), cfg.bridge));
        let on_chain = client.bridge_chain_id().await?;
        if on_chain != cfg.chain_id {
            return Err(Error::ChainIdMismatch {
                on_chain,
                configured: cfg.chain_id,
            });
        }

        if cfg.latest_block {
            start_block = conn.latest_block().await?;
        }

        let shutdown = ShutdownSignal::new();
        let writer = Arc::new(Writer::new(
            cfg.clone(),
            Arc::clone(&client),
            shutdown.listen(),
            sys_err.clone(),
            metrics.clone(),
        ));
        let listener = Listener::new(
            cfg.clone(),
            client,
            Arc::new(block_store) as Arc<dyn BlockStore>,
            start_block,
            shutdown.listen(),
            sys_err,
            metrics,
        );
        Ok(Self {
            cfg,
            writer,
            listener: Mutex::new(Some(listener)),
            shutdown,
        })
    }
}

/// The block to start polling from: the persisted cursor when it is ahead
/// of the configured start block, unless a fresh start was requested.
fn resume_start_block(
    cfg: &ChainConfig,
    store: &FsBlockStore,
) -> Result<u64> {
    if cfg.fresh_start {
        return Ok(cfg.start_block);
    }
    match store.try_load_latest_block()? {
        Some(latest) if latest > cfg.start_block => Ok(latest),
        _ => Ok(cfg.start_block),
    }
}

#[async_trait]
impl Chain for EvmChain {
    fn id(&self) -> ChainId {
        ChainId(self.cfg.chain_id)
    }

    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn writer(&self) -> Arc<dyn MessageWriter> {
        Arc::clone(&self.writer) as Arc<dyn MessageWriter>
    }

    async fn start(&self, router: Arc<Router>) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or(Error::Generic("chain already started"))?;
        tracing::debug!(chain = %self.cfg.name, "starting listener...");
        tokio::spawn(async move {
            if let Err(e) = listener.poll_blocks(router).await {
                tracing::error!(error = %e, "polling blocks failed");
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.shutdown.shutdown();
    }
}
