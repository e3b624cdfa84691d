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

use derive_more::Display;

/// Target for the machine-readable probe logger.
pub const TARGET: &str = "trestle_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the lifecycle of the relayer changes, like starting or shutting
    /// down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Listener sync state on a specific chain.
    #[display(fmt = "sync")]
    Sync,
    /// A proposal vote submitted on a destination chain.
    #[display(fmt = "vote")]
    Vote,
    /// A proposal execution submitted on a destination chain.
    #[display(fmt = "execute")]
    Execute,
    /// When the relayer will retry to do something.
    #[display(fmt = "retry")]
    Retry,
}
