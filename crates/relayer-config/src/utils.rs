use config::{Config, File};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::RelayerConfig;
use trestle_relayer_utils::Result;

/// A helper function that will search for all config files in the given
/// directory and return them as a vec of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory
    // and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(trestle_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`RelayerConfig`] from the given config file(s).
pub fn parse_from_files(files: &[PathBuf]) -> Result<RelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of TRESTLE).
    let builder = builder
        .add_source(config::Environment::with_prefix("TRESTLE").separator("_"));
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: std::result::Result<
        RelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Searches `path` for config files and parses them.
///
/// It is the same as using the [`search_config_files`] and
/// [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(path: P) -> Result<RelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: RelayerConfig,
) -> Result<RelayerConfig> {
    tracing::trace!("Checking configuration sanity ...");
    // 1. drain everything, and take enabled chains.
    let enabled = config
        .chains
        .drain()
        .filter(|(_, chain)| chain.enabled)
        .collect::<HashMap<_, _>>();
    // 2. insert them again, keyed by chain id.
    for (_, chain) in enabled {
        config.chains.insert(chain.chain_id.to_string(), chain);
    }
    for chain in config.chains.values() {
        if chain.erc20_handler.is_none()
            && chain.erc721_handler.is_none()
            && chain.generic_handler.is_none()
        {
            tracing::warn!(
                "chain {} has no handler contracts configured; \
                 its deposit events cannot be decoded",
                chain.name
            );
        }
    }
    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOERLI: &str = r#"
[chains.goerli]
name = "goerli"
chain-id = 1
endpoint = "http://localhost:8545"
from = "0x1111111111111111111111111111111111111111"
keystore-path = "/tmp/keys"
blockstore-path = "/tmp/blocks"
bridge = "0x2222222222222222222222222222222222222222"
erc20-handler = "0x3333333333333333333333333333333333333333"
start-block = 100
"#;

    const DISABLED: &str = r#"
[chains.dead]
name = "dead"
enabled = false
chain-id = 9
endpoint = "http://localhost:9545"
from = "0x1111111111111111111111111111111111111111"
keystore-path = "/tmp/keys"
blockstore-path = "/tmp/blocks"
bridge = "0x2222222222222222222222222222222222222222"
"#;

    #[test]
    fn loads_a_chain_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("goerli.toml"), GOERLI).unwrap();
        let config = load(dir.path()).unwrap();
        let chain = config.chains.get("1").unwrap();
        assert_eq!(chain.name, "goerli");
        assert_eq!(chain.chain_id, 1);
        assert_eq!(chain.start_block, 100);
        assert!(chain.enabled);
        assert!(!chain.fresh_start);
        assert_eq!(chain.block_confirmations, 10);
        assert_eq!(chain.gas_limit, 6_721_975);
        assert_eq!(chain.max_gas_price, 20_000_000_000);
        assert!(chain.erc20_handler.is_some());
        assert!(chain.erc721_handler.is_none());
    }

    #[test]
    fn disabled_chains_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("goerli.toml"), GOERLI).unwrap();
        std::fs::write(dir.path().join("dead.toml"), DISABLED).unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.chains.len(), 1);
        assert!(config.chains.contains_key("1"));
    }

    #[test]
    fn empty_directory_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert!(config.chains.is_empty());
    }
}
