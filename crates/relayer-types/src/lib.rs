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

//! # Relayer Types
//!
//! Wire types shared between the chain listeners and writers: chain and
//! deposit identifiers, the cross-chain [`Message`], and the proposal data
//! encoding submitted to the destination bridge.

use core::fmt;

use serde::{Deserialize, Serialize};

mod message;
pub mod proposal;

pub use message::{Message, MessagePayload};
pub use proposal::ProposalStatus;

/// Identifies a chain within a relayer deployment.
///
/// This is the id the bridge contracts were deployed with, not the EVM
/// network id.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ChainId(pub u8);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ChainId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Deposit counter assigned by the source bridge contract, monotonically
/// increasing per source chain. `(source, deposit nonce)` uniquely
/// identifies a [`Message`].
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct DepositNonce(pub u64);

impl fmt::Display for DepositNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DepositNonce {
    fn from(nonce: u64) -> Self {
        Self(nonce)
    }
}

/// 32-byte opaque identifier selecting a handler contract on the
/// destination bridge.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(pub [u8; 32]);

impl ResourceId {
    /// Builds a resource id from up to 32 bytes, zero-padded on the right.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        let len = bytes.len().min(32);
        out[..len].copy_from_slice(&bytes[..len]);
        Self(out)
    }

    /// The raw 32 bytes.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl From<[u8; 32]> for ResourceId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_from_short_slice_pads_right() {
        let rid = ResourceId::from_slice(&[0xaa, 0xbb]);
        assert_eq!(rid.to_bytes()[0], 0xaa);
        assert_eq!(rid.to_bytes()[1], 0xbb);
        assert_eq!(rid.to_bytes()[2..], [0u8; 30]);
    }

    #[test]
    fn resource_id_displays_as_hex() {
        let rid = ResourceId([0x01; 32]);
        let hex = rid.to_string();
        assert!(hex.starts_with("0x0101"));
        assert_eq!(hex.len(), 2 + 64);
    }
}
