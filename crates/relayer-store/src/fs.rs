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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ethereum_types::Address;
use trestle_relayer_types::ChainId;
use trestle_relayer_utils::{Error, Result};

use crate::BlockStore;

/// Filesystem-backed cursor store: one `<chainId>-<accountAddr>.block` file
/// holding the block height as decimal ASCII.
#[derive(Debug, Clone)]
pub struct FsBlockStore {
    path: PathBuf,
}

impl FsBlockStore {
    /// Opens the store for one chain and relayer account, creating the
    /// directory if needed.
    pub fn new<P: AsRef<Path>>(
        root: P,
        chain_id: ChainId,
        relayer: Address,
    ) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        let file = format!("{chain_id}-{relayer:#x}.block");
        Ok(Self {
            path: root.as_ref().join(file),
        })
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FsBlockStore {
    #[tracing::instrument(skip(self))]
    fn store_block(&self, block: u64) -> Result<()> {
        fs::write(&self.path, block.to_string())?;
        Ok(())
    }

    fn try_load_latest_block(&self) -> Result<Option<u64>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        raw.trim().parse::<u64>().map(Some).map_err(|e| {
            Error::CorruptBlockCursor {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })
    }
}
