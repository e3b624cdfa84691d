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
//! # Relayer Utils
//!
//! Shared plumbing for the relayer workspace: the workspace-wide error
//! type, per-chain metrics, the probe logging target and retry policies.

use ethers::types::Address;
use trestle_relayer_types::ChainId;

/// Metrics functionality.
pub mod metric;
/// A module used for debugging relayer lifecycle and sync state.
pub mod probe;
/// Retry policies for async calls.
pub mod retry;

/// An enum of all possible errors that could be encountered during the
/// execution of the relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from the glob iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Error in the Http provider.
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// Ether wallet error.
    #[error(transparent)]
    EtherWallet(#[from] ethers::signers::WalletError),
    /// Prometheus registration error.
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
    /// Error while parsing the config files.
    #[error("config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// ABI decoding error.
    #[error("abi decode error: {}", _0)]
    AbiDecode(String),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// The listener exhausted its block polling retries.
    #[error("listener block polling failed")]
    FatalPolling,
    /// The writer exhausted its transaction submission retries.
    #[error("submission of transaction failed")]
    FatalTx,
    /// No writer is registered for the destination chain of a message.
    #[error("no writer registered for destination chain {}", _0)]
    WriterNotFound(ChainId),
    /// A writer was registered twice for the same chain.
    #[error("a writer is already registered for chain {}", _0)]
    DuplicateWriter(ChainId),
    /// The bridge contract reports a different chain id than the
    /// configuration.
    #[error(
        "chain id mismatch: bridge reports {}, configuration says {}",
        on_chain,
        configured
    )]
    ChainIdMismatch {
        /// Chain id read from the bridge's `_chainID()`.
        on_chain: u8,
        /// Chain id from the configuration file.
        configured: u8,
    },
    /// A configured contract address holds no code.
    #[error("no bytecode found at contract address {:?}", _0)]
    MissingBytecode(Address),
    /// The persisted block cursor could not be parsed.
    #[error("corrupt block cursor at {}: {}", path, reason)]
    CorruptBlockCursor {
        /// Path of the cursor file.
        path: String,
        /// Why the contents could not be parsed.
        reason: String,
    },
    /// No decryptable keystore file was found for the configured account.
    #[error("no keystore file found for account {}", _0)]
    KeystoreNotFound(String),
}

/// A type alias for the result used throughout the relayer.
pub type Result<T> = std::result::Result<T, Error>;
