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

//! Web3 Secret Storage unlock for the relayer account. The private key
//! never leaves the wallet; the engine only uses `sign` and `address`.

use std::fs;
use std::path::Path;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use trestle_relayer_utils::{Error, Result};

/// Environment variable consulted before prompting for the keystore
/// password, for unattended runs.
pub const PASSWORD_ENV: &str = "TRESTLE_KEYSTORE_PASSWORD";

/// Decrypts the keyfile for `account` under `<root>/<address>/`, verifying
/// that the decrypted key actually controls `account`.
pub fn unlock_keystore(
    root: &Path,
    account: Address,
    password: &str,
) -> Result<LocalWallet> {
    let dir = root.join(format!("{account:#x}"));
    let entries = fs::read_dir(&dir)
        .map_err(|_| Error::KeystoreNotFound(format!("{account:#x}")))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match LocalWallet::decrypt_keystore(&path, password) {
            Ok(wallet) if wallet.address() == account => return Ok(wallet),
            Ok(_) => tracing::warn!(
                keyfile = %path.display(),
                "keyfile decrypts to a different account, skipping"
            ),
            Err(e) => tracing::debug!(
                keyfile = %path.display(),
                error = %e,
                "failed to decrypt keyfile"
            ),
        }
    }
    Err(Error::KeystoreNotFound(format!("{account:#x}")))
}

/// Resolves the keystore password: [`PASSWORD_ENV`] when set, otherwise a
/// terminal prompt.
pub fn keystore_password(account: Address) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(format!(
        "Enter password for key {account:#x}: "
    ))
    .map_err(Into::into)
}
