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

//! Trestle Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use structopt::StructOpt;
use trestle_chain_evm::EvmChain;
use trestle_relayer_config::cli::{load_config, setup_logger, Opts};
use trestle_relayer_core::Core;
use trestle_relayer_utils::metric::ChainMetrics;
use trestle_relayer_utils::probe;

/// The main entry point for the relayer.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Opts::from_args();
    setup_logger(args.verbose, "trestle_relayer")?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;

    // One engine per enabled chain; all writers are registered with the
    // router before any listener starts.
    let mut core = Core::new();
    for (_, chain_config) in config.chains {
        let metrics = ChainMetrics::new(&chain_config.name)?;
        let chain = EvmChain::initialize(
            chain_config,
            core.error_sender(),
            Some(metrics),
        )
        .await?;
        core.add_chain(Arc::new(chain))?;
    }

    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true
    );
    // Blocks until a fatal engine error or a termination signal; a fatal
    // error propagates so the process exits non-zero.
    core.run().await?;
    Ok(())
}
