#![allow(dead_code)]

use async_trait::async_trait;
use evm_faucet::{ChainClient, FaucetConfig, FaucetService, RpcError, SignedTransaction};
use faucet_common::utils::logging::init_test_logging;
use faucet_common::Address;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FAUCET_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";
pub const FAUCET_ADDRESS: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";
pub const RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const OTHER_RECIPIENT: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
pub const CHAIN_ID: u64 = 1337;
pub const NODE_GAS_PRICE: u128 = 20_000_000_000;

/// In-memory chain that records broadcasts and can be told to misbehave.
#[derive(Default)]
pub struct FakeChain {
    pub fail_nonce: bool,
    pub fail_gas_price: bool,
    pub fail_broadcast: bool,
    pub nonce_delay: Duration,
    pub gas_price_delay: Duration,
    pub next_nonce: AtomicU64,
    pub nonce_calls: AtomicUsize,
    pub sent: Mutex<Vec<SignedTransaction>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(CHAIN_ID)
    }

    async fn pending_nonce_at(&self, _address: &Address) -> Result<u64, RpcError> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        if !self.nonce_delay.is_zero() {
            tokio::time::sleep(self.nonce_delay).await;
        }
        if self.fail_nonce {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        Ok(self.next_nonce.load(Ordering::SeqCst))
    }

    async fn suggest_gas_price(&self) -> Result<u128, RpcError> {
        if !self.gas_price_delay.is_zero() {
            tokio::time::sleep(self.gas_price_delay).await;
        }
        if self.fail_gas_price {
            return Err(RpcError::Remote {
                code: -32000,
                message: "gas price unavailable".to_string(),
            });
        }
        Ok(NODE_GAS_PRICE)
    }

    async fn send_transaction(&self, transaction: &SignedTransaction) -> Result<(), RpcError> {
        if self.fail_broadcast {
            return Err(RpcError::Remote {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }
        self.next_nonce.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(())
    }
}

pub fn config() -> FaucetConfig {
    FaucetConfig {
        rpc_url: "http://127.0.0.1:8545".to_string(),
        private_key: FAUCET_KEY.to_string(),
        delay_secs: 60,
        rpc_timeout_secs: 5,
        ..Default::default()
    }
}

pub fn service_with(config: FaucetConfig, chain: Arc<FakeChain>) -> FaucetService {
    init_test_logging();
    let settings = config.resolve().expect("valid test config");
    FaucetService::new(settings, chain, CHAIN_ID).expect("service")
}

pub fn service(chain: Arc<FakeChain>) -> FaucetService {
    service_with(config(), chain)
}
