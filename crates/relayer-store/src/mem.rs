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

use parking_lot::RwLock;
use trestle_relayer_utils::Result;

use crate::BlockStore;

/// In-memory cursor store. Loses its contents with the process; meant for
/// tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlockStore {
    last: Arc<RwLock<Option<u64>>>,
}

impl BlockStore for InMemoryBlockStore {
    fn store_block(&self, block: u64) -> Result<()> {
        *self.last.write() = Some(block);
        Ok(())
    }

    fn try_load_latest_block(&self) -> Result<Option<u64>> {
        Ok(*self.last.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_and_keeps_the_latest() {
        let store = InMemoryBlockStore::default();
        assert_eq!(store.try_load_latest_block().unwrap(), None);
        store.store_block(7).unwrap();
        store.store_block(8).unwrap();
        assert_eq!(store.try_load_latest_block().unwrap(), Some(8));
    }

    #[test]
    fn clones_share_state() {
        let store = InMemoryBlockStore::default();
        let clone = store.clone();
        store.store_block(3).unwrap();
        assert_eq!(clone.try_load_latest_block().unwrap(), Some(3));
    }
}
