//! Builds, signs and broadcasts the transfer for one claim.

use crate::error::DispatchError;
use crate::limiter::deadline_after;
use crate::metrics::FaucetMetrics;
use crate::rpc::ChainClient;
use crate::transaction::{Eip155Signer, LegacyTransaction, Wallet};
use faucet_common::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

fn is_zero_u128(value: &u128) -> bool {
    *value == 0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

/// Outcome of one successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: TxHash,
    pub address: Address,
    /// Transferred value in base units
    #[serde(default, skip_serializing_if = "is_zero_u128")]
    pub value: u128,
    /// Unix seconds at submission
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub timestamp: i64,
}

/// Moves the configured amount from the faucet wallet to a recipient.
pub struct Dispatcher {
    client: Arc<dyn ChainClient>,
    wallet: Wallet,
    signer: Eip155Signer,
    amount: u128,
    fallback_gas_price: u128,
    rpc_timeout: Duration,
    metrics: Arc<FaucetMetrics>,
    // Held from nonce fetch to broadcast so that the pending nonce always
    // includes this process's previous transfer.
    sequencer: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn ChainClient>,
        wallet: Wallet,
        chain_id: u64,
        amount: u128,
        fallback_gas_price: u128,
        rpc_timeout: Duration,
        metrics: Arc<FaucetMetrics>,
    ) -> Self {
        Self {
            client,
            wallet,
            signer: Eip155Signer::new(chain_id),
            amount,
            fallback_gas_price,
            rpc_timeout,
            metrics,
            sequencer: Mutex::new(()),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.signer.chain_id()
    }

    /// Sends `amount` to `to`. Never retries: a retried broadcast could pay twice.
    pub async fn send(&self, to: Address) -> Result<Receipt, DispatchError> {
        // The deadline also covers waiting behind other dispatches.
        let deadline = deadline_after(self.rpc_timeout);
        let _turn = tokio::time::timeout_at(deadline, self.sequencer.lock())
            .await
            .map_err(|_| DispatchError::Timeout(self.rpc_timeout))?;
        let _timer = self.metrics.dispatch_duration.start_timer();

        let nonce = self
            .within(deadline, self.client.pending_nonce_at(&self.wallet.address()))
            .await?
            .map_err(DispatchError::Nonce)?;

        let gas_price = match self.within(deadline, self.client.suggest_gas_price()).await {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => self.fall_back(&e),
            Err(e) => self.fall_back(&e),
        };

        let transaction = LegacyTransaction::transfer(to, self.amount, gas_price, nonce);
        let signed = self.signer.sign(transaction, &self.wallet)?;
        debug!(nonce, gas_price = %gas_price, hash = %signed.hash(), "signed transfer");

        self.within(deadline, self.client.send_transaction(&signed))
            .await?
            .map_err(DispatchError::Broadcast)?;

        Ok(Receipt {
            hash: signed.hash(),
            address: to,
            value: self.amount,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    fn fall_back(&self, cause: &dyn std::error::Error) -> u128 {
        warn!(
            "Gas price suggestion failed ({}), using fallback {} wei",
            cause, self.fallback_gas_price
        );
        self.metrics.gas_price_fallback_total.inc();
        self.fallback_gas_price
    }

    async fn within<F: Future>(&self, deadline: Instant, call: F) -> Result<F::Output, DispatchError> {
        if Instant::now() >= deadline {
            return Err(DispatchError::Timeout(self.rpc_timeout));
        }
        tokio::time::timeout_at(deadline, call)
            .await
            .map_err(|_| DispatchError::Timeout(self.rpc_timeout))
    }
}
