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

#![warn(missing_docs)]

//! # Relayer Configuration Module
//!
//! Configuration model for the relayer: one [`ChainConfig`] per chain, read
//! from a directory of TOML/JSON files with `TRESTLE_`-prefixed environment
//! overrides.

/// CLI configuration
pub mod cli;
/// Default values for optional configuration fields
pub mod defaults;
/// Configuration loading and validation
pub mod utils;

use std::collections::HashMap;
use std::path::PathBuf;

use ethereum_types::Address;
use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level relayer configuration: one entry per chain, keyed by a
/// human-readable name in the config files and re-keyed by chain id after
/// loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayerConfig {
    /// Configured chains.
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
}

/// Configuration of a single chain engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    /// String that groups configuration for this chain on a human-readable
    /// name.
    pub name: String,
    /// Whether this chain should be started.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// The bridge-assigned chain id. Cross-checked against the bridge
    /// contract's `_chainID()` at startup; this is not the EVM network id.
    pub chain_id: u8,
    /// Http(s) RPC endpoint.
    #[serde(skip_serializing)]
    pub endpoint: Url,
    /// The relayer account on this chain.
    pub from: Address,
    /// Directory holding the Web3 Secret Storage keyfiles, one
    /// sub-directory per account address.
    pub keystore_path: PathBuf,
    /// Directory holding the persisted block cursors.
    pub blockstore_path: PathBuf,
    /// Address of the bridge contract.
    pub bridge: Address,
    /// Address of the fungible-token handler, if deployed.
    pub erc20_handler: Option<Address>,
    /// Address of the non-fungible-token handler, if deployed.
    pub erc721_handler: Option<Address>,
    /// Address of the generic handler, if deployed.
    pub generic_handler: Option<Address>,
    /// First block to process when no cursor is persisted.
    #[serde(default)]
    pub start_block: u64,
    /// Ignore the persisted cursor and start from `start-block`.
    #[serde(default)]
    pub fresh_start: bool,
    /// Override the start block with the chain head at startup.
    #[serde(default)]
    pub latest_block: bool,
    /// Confirmation depth a block must reach before it is processed.
    #[serde(default = "defaults::block_confirmations")]
    pub block_confirmations: u64,
    /// Gas limit for submitted transactions.
    #[serde(default = "defaults::gas_limit")]
    pub gas_limit: u64,
    /// Upper bound on the gas price, in wei.
    #[serde(default = "defaults::max_gas_price")]
    pub max_gas_price: u64,
}
