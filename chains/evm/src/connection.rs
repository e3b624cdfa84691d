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

use std::cmp;
use std::time::Duration;

use ethers::providers::{
    Http, JsonRpcError, Middleware, Provider, ProviderError, RpcError,
};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockNumber, Bytes, TransactionRequest, H256, U256,
};
use tokio::sync::{Mutex, MutexGuard};
use trestle_relayer_utils::{Error, Result};
use url::Url;

/// Transaction submission failures, classified from the structured JSON-RPC
/// error. Callers match on this enum only, never on error strings.
#[derive(Debug, thiserror::Error)]
pub enum TxSubmitError {
    /// The reserved nonce was already consumed on chain.
    #[error("nonce too low")]
    NonceTooLow,
    /// A pending transaction with the same nonce outbids this one.
    #[error("replacement transaction underpriced")]
    ReplacementUnderpriced,
    /// The options slot could not be refreshed; nothing was submitted.
    #[error("failed to update tx opts: {}", _0)]
    OptsRefresh(#[source] Error),
    /// Any other submission failure.
    #[error(transparent)]
    Other(#[from] Error),
}

/// The mutable transaction options slot. Refreshed from chain while the
/// connection's mutex is held.
#[derive(Debug, Clone, Copy)]
pub struct TxOpts {
    pub from: Address,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
}

/// Exclusive reservation of the options slot, acquired through
/// [`Connection::lock_and_update_opts`]. Dropping the token releases the
/// slot, whether or not the submission succeeded.
pub struct SubmitToken<'a> {
    opts: MutexGuard<'a, TxOpts>,
}

impl SubmitToken<'_> {
    pub fn from(&self) -> Address {
        self.opts.from
    }

    pub fn nonce(&self) -> U256 {
        self.opts.nonce
    }

    pub fn gas_price(&self) -> U256 {
        self.opts.gas_price
    }

    pub fn gas_limit(&self) -> U256 {
        self.opts.gas_limit
    }
}

/// One chain's RPC client and signer.
///
/// The options mutex is the sole primitive enforcing monotonic nonce use
/// for the signer: no two transactions from the same signer are ever in
/// flight concurrently.
#[derive(Debug)]
pub struct Connection {
    provider: Provider<Http>,
    wallet: LocalWallet,
    opts: Mutex<TxOpts>,
    max_gas_price: U256,
}

impl Connection {
    /// Connects to `endpoint` and binds `wallet` to the chain's EVM network
    /// id for EIP-155 signing.
    pub async fn connect(
        endpoint: &Url,
        wallet: LocalWallet,
        gas_limit: u64,
        max_gas_price: u64,
    ) -> Result<Self> {
        tracing::info!(url = %endpoint, "connecting to evm chain");
        let provider = Provider::<Http>::try_from(endpoint.as_str())?
            .interval(Duration::from_millis(500));
        let network_id = provider.get_chainid().await?;
        let wallet = wallet.with_chain_id(network_id.as_u64());
        let opts = TxOpts {
            from: wallet.address(),
            nonce: U256::zero(),
            gas_price: U256::zero(),
            gas_limit: U256::from(gas_limit),
        };
        Ok(Self {
            provider,
            wallet,
            opts: Mutex::new(opts),
            max_gas_price: U256::from(max_gas_price),
        })
    }

    /// The signer's account address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }

    /// Current chain head.
    pub async fn latest_block(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    /// Verifies the account at `address` holds code. Called for every
    /// configured contract before the engine starts.
    pub async fn ensure_has_bytecode(&self, address: Address) -> Result<()> {
        let code = self.provider.get_code(address, None).await?;
        if code.as_ref().is_empty() {
            return Err(Error::MissingBytecode(address));
        }
        Ok(())
    }

    /// Read-only contract call from the relayer account. Does not touch the
    /// options slot.
    pub async fn view_call(
        &self,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<Bytes> {
        let tx = TransactionRequest::new()
            .from(self.address())
            .to(to)
            .data(calldata);
        Ok(self.provider.call(&tx.into(), None).await?)
    }

    /// Acquires the options slot and refreshes nonce and gas price from
    /// chain. The slot stays reserved until the returned token is dropped.
    pub async fn lock_and_update_opts(&self) -> Result<SubmitToken<'_>> {
        let mut opts = self.opts.lock().await;
        let nonce = self
            .provider
            .get_transaction_count(
                opts.from,
                Some(BlockNumber::Pending.into()),
            )
            .await?;
        let gas_price =
            cmp::min(self.provider.get_gas_price().await?, self.max_gas_price);
        opts.nonce = nonce;
        opts.gas_price = gas_price;
        Ok(SubmitToken { opts })
    }

    /// Signs and submits a contract call with the reserved options. The
    /// slot is released as soon as the RPC call returns, before the outcome
    /// is classified, so sibling submitters may proceed.
    pub async fn submit(
        &self,
        token: SubmitToken<'_>,
        to: Address,
        calldata: Vec<u8>,
    ) -> std::result::Result<H256, TxSubmitError> {
        let tx = TransactionRequest::new()
            .from(token.from())
            .to(to)
            .data(calldata)
            .nonce(token.nonce())
            .gas(token.gas_limit())
            .gas_price(token.gas_price());
        let tx: TypedTransaction = tx.into();
        let signature =
            self.wallet.sign_transaction(&tx).await.map_err(Error::from)?;
        let raw = tx.rlp_signed(&signature);
        let sent = self.provider.send_raw_transaction(raw).await;
        drop(token);
        match sent {
            Ok(pending) => Ok(*pending),
            Err(err) => Err(classify_submit_error(err)),
        }
    }
}

/// Maps a provider error onto the retry taxonomy.
///
/// geth assigns both retryable conditions the same JSON-RPC error code, so
/// the structured error's message field is the discriminator; the formatted
/// `Display` output of the outer error is never inspected.
fn classify_submit_error(err: ProviderError) -> TxSubmitError {
    if let Some(rpc_err) = as_json_rpc_error(&err) {
        let message = rpc_err.message.to_ascii_lowercase();
        if message.contains("nonce too low") {
            return TxSubmitError::NonceTooLow;
        }
        if message.contains("replacement transaction underpriced") {
            return TxSubmitError::ReplacementUnderpriced;
        }
    }
    TxSubmitError::Other(err.into())
}

fn as_json_rpc_error(err: &ProviderError) -> Option<&JsonRpcError> {
    match err {
        ProviderError::JsonRpcClientError(inner) => inner.as_error_response(),
        _ => None,
    }
}
