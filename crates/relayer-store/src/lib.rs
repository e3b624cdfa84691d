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

//! # Relayer Store
//!
//! Durable cursor storage for the chain listeners. The block cursor, the
//! last fully processed source block per (chain, relayer account), is the
//! only durable state the relayer owns; everything else is reconstructed
//! from chain.

/// A filesystem-backed cursor store.
pub mod fs;
/// An in-memory cursor store, used in tests.
pub mod mem;

pub use fs::FsBlockStore;
pub use mem::InMemoryBlockStore;

use trestle_relayer_utils::Result;

/// Stores the last fully processed block height for one
/// (chain, relayer account) pair.
pub trait BlockStore: Send + Sync {
    /// Persists `block` as the latest fully processed height.
    fn store_block(&self, block: u64) -> Result<()>;

    /// The most recently persisted height, or `None` if nothing was ever
    /// written.
    fn try_load_latest_block(&self) -> Result<Option<u64>>;
}
