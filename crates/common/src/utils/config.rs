use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads configuration from a file into a struct.
/// Supports TOML, YAML, JSON, etc. based on file extension.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    load_layered(Some(path.as_ref()), None)
}

/// Layers an optional config file under environment variables.
///
/// With `env_prefix = Some("FAUCET")`, `FAUCET_RPC_URL` maps to the `rpc_url`
/// field and `FAUCET_LOGGING__LEVEL` to `logging.level`. Fields missing from
/// every source must be covered by `#[serde(default)]` on `T`.
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>, env_prefix: Option<&str>) -> Result<T> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        let path_str = path.to_str().context("Invalid config path")?;
        builder = builder.add_source(File::with_name(path_str));
    }

    if let Some(prefix) = env_prefix {
        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__"),
        );
    }

    let settings = builder.build().context("Failed to build configuration")?;
    settings
        .try_deserialize::<T>()
        .context("Failed to deserialize configuration")
}
