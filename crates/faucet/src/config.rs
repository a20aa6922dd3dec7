//! Faucet configuration

use crate::error::{FaucetError, FaucetResult};
use crate::transaction::Wallet;
use axum::http::HeaderValue;
use faucet_common::utils::converter::parse_base_units;
use faucet_common::utils::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_AMOUNT: &str = "0.01";
pub const DEFAULT_DECIMALS: u32 = 18;
pub const DEFAULT_DELAY_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
/// 1 gwei
pub const DEFAULT_FALLBACK_GAS_PRICE: &str = "1000000000";
/// Upper bound for every configured duration (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Faucet service configuration as read from file, environment and flags
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// RPC endpoint for blockchain
    pub rpc_url: String,

    /// Faucet account private key (hex)
    pub private_key: String,

    /// Amount to dispense per claim, in display units
    pub amount: String,

    /// Decimal places between display units and base units
    pub decimals: u32,

    /// HTTP listen port
    pub port: u16,

    /// Seconds an address or origin must wait between claims
    pub delay_secs: u64,

    /// Seconds between sweeps of expired rate-limit entries
    pub cleanup_interval_secs: u64,

    /// Deadline for the remote calls of one dispatch
    pub rpc_timeout_secs: u64,

    /// Gas price used when the node cannot suggest one (in wei)
    pub fallback_gas_price: String,

    /// Chain id; fetched from the RPC endpoint when unset
    pub chain_id: Option<u64>,

    /// Number of trusted reverse proxies in front of the service
    pub proxy_hops: usize,

    /// Query parameter carrying the recipient address
    pub address_query_key: String,

    /// Allowed CORS origin, `*` for any
    pub cors_origin: String,

    /// Only serve claims approved by upstream middleware
    pub require_approval: bool,

    pub logging: LoggingConfig,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            private_key: String::new(),
            amount: DEFAULT_AMOUNT.to_string(),
            decimals: DEFAULT_DECIMALS,
            port: 8080,
            delay_secs: DEFAULT_DELAY_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            fallback_gas_price: DEFAULT_FALLBACK_GAS_PRICE.to_string(),
            chain_id: None,
            proxy_hops: 0,
            address_query_key: "address".to_string(),
            cors_origin: "*".to_string(),
            require_approval: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl fmt::Debug for FaucetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaucetConfig")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("amount", &self.amount)
            .field("decimals", &self.decimals)
            .field("port", &self.port)
            .field("delay_secs", &self.delay_secs)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("fallback_gas_price", &self.fallback_gas_price)
            .field("chain_id", &self.chain_id)
            .field("proxy_hops", &self.proxy_hops)
            .field("address_query_key", &self.address_query_key)
            .field("cors_origin", &self.cors_origin)
            .field("require_approval", &self.require_approval)
            .field("logging", &self.logging)
            .finish()
    }
}

fn secs_or_default(name: &str, secs: u64, default: u64) -> FaucetResult<Duration> {
    if secs > MAX_DURATION_SECS {
        return Err(FaucetError::Config(format!(
            "{name} {secs} exceeds the maximum of {MAX_DURATION_SECS} seconds"
        )));
    }
    Ok(Duration::from_secs(if secs == 0 { default } else { secs }))
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value.trim()
    }
}

impl FaucetConfig {
    /// Validates the configuration and converts it into runtime settings.
    pub fn resolve(&self) -> FaucetResult<FaucetSettings> {
        if self.rpc_url.trim().is_empty() {
            return Err(FaucetError::Config("rpc_url is required".to_string()));
        }
        if self.private_key.trim().is_empty() {
            return Err(FaucetError::Config("private_key is required".to_string()));
        }

        let wallet = Wallet::from_hex(&self.private_key).map_err(|e| FaucetError::InvalidKey(e.to_string()))?;

        let amount_text = non_empty_or(&self.amount, DEFAULT_AMOUNT);
        let amount = parse_base_units(amount_text, self.decimals)
            .map_err(|e| FaucetError::Config(format!("amount: {e}")))?;
        let amount = u128::try_from(&amount)
            .map_err(|_| FaucetError::Config(format!("amount {amount_text} is too large")))?;
        if amount == 0 {
            return Err(FaucetError::Config(format!(
                "amount {amount_text} is zero at {} decimals",
                self.decimals
            )));
        }

        let gas_text = non_empty_or(&self.fallback_gas_price, DEFAULT_FALLBACK_GAS_PRICE);
        let fallback_gas_price: u128 = gas_text
            .parse()
            .map_err(|e| FaucetError::Config(format!("fallback_gas_price {gas_text:?}: {e}")))?;
        if fallback_gas_price == 0 {
            return Err(FaucetError::Config("fallback_gas_price must be positive".to_string()));
        }

        let cors_origin = match non_empty_or(&self.cors_origin, "*") {
            "*" => None,
            origin => Some(
                HeaderValue::from_str(origin)
                    .map_err(|e| FaucetError::Config(format!("cors_origin {origin:?}: {e}")))?,
            ),
        };

        Ok(FaucetSettings {
            wallet,
            rpc_url: self.rpc_url.trim().to_string(),
            amount,
            decimals: self.decimals,
            delay: secs_or_default("delay_secs", self.delay_secs, DEFAULT_DELAY_SECS)?,
            cleanup_interval: secs_or_default(
                "cleanup_interval_secs",
                self.cleanup_interval_secs,
                DEFAULT_CLEANUP_INTERVAL_SECS,
            )?,
            rpc_timeout: secs_or_default("rpc_timeout_secs", self.rpc_timeout_secs, DEFAULT_RPC_TIMEOUT_SECS)?,
            fallback_gas_price,
            chain_id: self.chain_id.filter(|id| *id != 0),
            proxy_hops: self.proxy_hops,
            address_query_key: non_empty_or(&self.address_query_key, "address").to_string(),
            cors_origin,
            require_approval: self.require_approval,
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port)),
        })
    }
}

/// Validated runtime settings. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct FaucetSettings {
    pub wallet: Wallet,
    pub rpc_url: String,
    /// Claim amount in base units
    pub amount: u128,
    pub decimals: u32,
    pub delay: Duration,
    pub cleanup_interval: Duration,
    pub rpc_timeout: Duration,
    pub fallback_gas_price: u128,
    pub chain_id: Option<u64>,
    pub proxy_hops: usize,
    pub address_query_key: String,
    /// `None` allows any origin
    pub cors_origin: Option<HeaderValue>,
    pub require_approval: bool,
    pub listen_addr: SocketAddr,
}
