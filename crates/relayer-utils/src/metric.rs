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

use prometheus::core::{AtomicF64, GenericCounter, GenericGauge};
use prometheus::{register_counter, register_gauge, Encoder, TextEncoder};

/// Counters and gauges tracking one chain engine. Registered with the
/// default registry under a per-chain name prefix.
#[derive(Debug, Clone)]
pub struct ChainMetrics {
    /// Number of source blocks fully processed.
    pub blocks_processed: GenericCounter<AtomicF64>,
    /// Head of the chain as last observed by the listener.
    pub latest_known_block: GenericGauge<AtomicF64>,
    /// Head of the chain when the last block was processed.
    pub latest_processed_block: GenericGauge<AtomicF64>,
    /// Proposal votes submitted by this relayer.
    pub votes_submitted: GenericCounter<AtomicF64>,
    /// Proposal executions submitted by this relayer.
    pub proposals_executed: GenericCounter<AtomicF64>,
}

impl ChainMetrics {
    /// Instantiates and registers the metrics for `chain_name`.
    pub fn new(chain_name: &str) -> crate::Result<Self> {
        let prefix = chain_name.to_lowercase().replace('-', "_");
        let blocks_processed = register_counter!(
            format!("{prefix}_blocks_processed"),
            format!("Number of blocks processed on {chain_name}")
        )?;
        let latest_known_block = register_gauge!(
            format!("{prefix}_latest_known_block"),
            format!("Latest observed head of {chain_name}")
        )?;
        let latest_processed_block = register_gauge!(
            format!("{prefix}_latest_processed_block"),
            format!("Head of {chain_name} when the last block was processed")
        )?;
        let votes_submitted = register_counter!(
            format!("{prefix}_votes_submitted"),
            format!("Number of proposal votes submitted on {chain_name}")
        )?;
        let proposals_executed = register_counter!(
            format!("{prefix}_proposals_executed"),
            format!("Number of proposals executed on {chain_name}")
        )?;
        Ok(Self {
            blocks_processed,
            latest_known_block,
            latest_processed_block,
            votes_submitted,
            proposals_executed,
        })
    }

    /// Renders the whole default registry in the text exposition format.
    pub fn gather() -> crate::Result<String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|_| crate::Error::Generic("metrics are not valid utf-8"))
    }
}
