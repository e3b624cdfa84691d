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

use tokio::sync::mpsc;
use trestle_relayer_utils::{probe, Error, Result};

use crate::{Chain, Router};

/// Aggregates chain engines, the shared fatal-error channel and the OS
/// signal source.
///
/// [`Core::run`] blocks until any engine posts to the error channel or a
/// termination signal arrives, then fans the stop out to every engine. A
/// fatal error is returned to the caller so the process exits non-zero.
pub struct Core {
    router: Arc<Router>,
    chains: Vec<Arc<dyn Chain>>,
    sys_err_tx: mpsc::UnboundedSender<Error>,
    sys_err_rx: mpsc::UnboundedReceiver<Error>,
}

impl Core {
    pub fn new() -> Self {
        let (sys_err_tx, sys_err_rx) = mpsc::unbounded_channel();
        Self {
            router: Arc::new(Router::new()),
            chains: Vec::new(),
            sys_err_tx,
            sys_err_rx,
        }
    }

    /// The sender half handed to every engine for fatal-error escalation.
    pub fn error_sender(&self) -> mpsc::UnboundedSender<Error> {
        self.sys_err_tx.clone()
    }

    /// Registers the chain's writer with the router and takes ownership of
    /// the engine.
    pub fn add_chain(&mut self, chain: Arc<dyn Chain>) -> Result<()> {
        self.router.register(chain.id(), chain.writer())?;
        self.chains.push(chain);
        Ok(())
    }

    /// Starts every engine. Writers are all registered before any listener
    /// runs, so the first message always finds its destination.
    pub async fn start(&self) -> Result<()> {
        for chain in &self.chains {
            tracing::info!(
                chain = chain.name(),
                id = %chain.id(),
                "starting chain"
            );
            chain.start(Arc::clone(&self.router)).await?;
        }
        Ok(())
    }

    /// Runs until a fatal engine error or a termination signal, then stops
    /// every engine.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;
        let outcome = self.wait().await;
        for chain in &self.chains {
            chain.stop();
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            shutdown = true
        );
        outcome
    }

    async fn wait(&mut self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            maybe_err = self.sys_err_rx.recv() => match maybe_err {
                Some(err) => {
                    tracing::error!(error = %err, "fatal chain error, shutting down");
                    Err(err)
                }
                None => Ok(()),
            },
            _ = interrupt.recv() => {
                tracing::warn!("interrupted (ctrl+c), shutting down");
                Ok(())
            }
            _ = terminate.recv() => {
                tracing::warn!("got terminate signal, shutting down");
                Ok(())
            }
        }
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}
