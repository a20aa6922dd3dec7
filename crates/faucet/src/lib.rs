//! Rate-limited testnet faucet for EVM-compatible chains.
//!
//! Each claim sends a fixed amount to the requested address, subject to:
//! - A cooldown per recipient address and per request origin
//! - Optional approval by upstream middleware
//! - A bounded deadline on every remote chain call

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod limiter;
pub mod metrics;
pub mod rpc;
pub mod service;
pub mod transaction;

pub use config::{FaucetConfig, FaucetSettings};
pub use dispatcher::{Dispatcher, Receipt};
pub use error::{DispatchError, FaucetError, FaucetResult, LimitedKey};
pub use limiter::ClaimLimiter;
pub use rpc::{ChainClient, JsonRpcClient, RpcError};
pub use service::{ClaimApproval, ClaimRequest, FaucetService};
pub use transaction::{Eip155Signer, LegacyTransaction, SignedTransaction, Wallet};
