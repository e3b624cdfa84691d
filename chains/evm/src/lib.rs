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

//! # EVM Chain Engine
//!
//! One engine per configured Ethereum-family chain: a block-by-block
//! deposit listener, a proposal-voting (and executing) writer, and the
//! connection that serializes transaction submission for the chain's
//! signer.

/// The chain-contract seams the listener and writer are written against.
pub mod api;
/// Engine construction and lifecycle.
pub mod chain;
/// Ethers-backed implementation of the contract seams.
pub mod client;
/// RPC client, signer and the transaction options slot.
pub mod connection;
/// Typed records shared across the chain engine.
pub mod records;
/// Calldata builders and return decoders for the bridge and handlers.
pub mod contracts;
/// Event signatures and topic parsing.
pub mod events;
/// Web3 Secret Storage unlock.
pub mod keystore;
/// The source-chain deposit listener.
pub mod listener;
/// The destination-chain proposal writer.
pub mod writer;

pub use chain::EvmChain;
pub use client::BridgeClient;
pub use connection::{Connection, TxSubmitError};
pub use listener::Listener;
pub use writer::Writer;
