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

//! # Relayer Core
//!
//! The process-wide fabric between chain engines: message routing from
//! listeners to writers, the cooperative stop signal, and the controller
//! that starts every engine and escalates fatal errors into a process
//! shutdown.

/// The lifecycle controller.
pub mod controller;
/// The listener-to-writer message router.
pub mod router;
/// The cooperative stop signal.
pub mod shutdown;

pub use controller::Core;
pub use router::Router;
pub use shutdown::{ShutdownListener, ShutdownSignal};

use std::sync::Arc;

use async_trait::async_trait;
use trestle_relayer_types::{ChainId, Message};
use trestle_relayer_utils::Result;

/// Consumes messages addressed to one destination chain and drives the
/// on-chain proposal lifecycle for each.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Resolves one message; returns whether it was handled successfully.
    ///
    /// Messages for one destination are resolved serially, on the caller's
    /// task: the transaction options slot is a single shared resource, and
    /// a slow writer is what throttles its source listener.
    async fn resolve_message(&self, message: Message) -> bool;
}

/// A chain engine the controller can start and stop.
#[async_trait]
pub trait Chain: Send + Sync {
    /// The bridge chain id of this engine.
    fn id(&self) -> ChainId;

    /// Human-readable chain name.
    fn name(&self) -> &str;

    /// The writer consuming messages addressed to this chain.
    fn writer(&self) -> Arc<dyn MessageWriter>;

    /// Launches the engine's background tasks. The router is handed over
    /// here, after every writer is registered, so construction stays
    /// cycle-free.
    async fn start(&self, router: Arc<Router>) -> Result<()>;

    /// Signals every task of this engine to stop. Idempotent, and safe to
    /// call on an engine that was never started.
    fn stop(&self);
}
