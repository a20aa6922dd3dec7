//! Faucet service core logic

use crate::config::FaucetSettings;
use crate::dispatcher::{Dispatcher, Receipt};
use crate::error::{FaucetError, FaucetResult, LimitedKey};
use crate::limiter::ClaimLimiter;
use crate::metrics::FaucetMetrics;
use crate::rpc::{ChainClient, JsonRpcClient};
use faucet_common::utils::converter::to_display_units;
use faucet_common::Address;
use num_bigint::BigUint;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

/// Verdict of upstream gating middleware (e.g. a CAPTCHA check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimApproval {
    /// No gate ran for this request.
    #[default]
    NotChecked,
    Approved,
    Denied,
}

/// One inbound claim, independent of the HTTP framework.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    /// Raw recipient as supplied by the caller; `None` when absent.
    pub address: Option<String>,
    /// Origin identity, see [`crate::identity::origin_identity`].
    pub origin: String,
    pub approval: ClaimApproval,
}

/// Keys of claims currently being dispatched.
#[derive(Default)]
struct InFlight {
    keys: Mutex<HashSet<String>>,
}

impl InFlight {
    fn reserve(&self, address: &str, origin: &str) -> Option<Reservation<'_>> {
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if keys.contains(address) || keys.contains(origin) {
            return None;
        }
        keys.insert(address.to_string());
        keys.insert(origin.to_string());
        Some(Reservation {
            owner: self,
            keys: [address.to_string(), origin.to_string()],
        })
    }
}

/// Releases its keys when dropped, on success and failure alike.
struct Reservation<'a> {
    owner: &'a InFlight,
    keys: [String; 2],
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut keys = self.owner.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in &self.keys {
            keys.remove(key);
        }
    }
}

/// Faucet service
pub struct FaucetService {
    settings: FaucetSettings,
    dispatcher: Dispatcher,
    limiter: Arc<ClaimLimiter>,
    in_flight: InFlight,
    metrics: Arc<FaucetMetrics>,
    display_amount: String,
}

/// Uses the configured chain id, or asks the node once.
pub async fn resolve_chain_id(
    client: &dyn ChainClient,
    configured: Option<u64>,
    timeout: Duration,
) -> FaucetResult<u64> {
    if let Some(chain_id) = configured {
        return Ok(chain_id);
    }

    match tokio::time::timeout(timeout, client.chain_id()).await {
        Ok(Ok(chain_id)) => Ok(chain_id),
        Ok(Err(e)) => Err(FaucetError::ChainId(e.to_string())),
        Err(_) => Err(FaucetError::ChainId(format!("no answer within {timeout:?}"))),
    }
}

impl FaucetService {
    /// Connects to the configured RPC endpoint and resolves the chain id.
    pub async fn connect(settings: FaucetSettings) -> FaucetResult<Self> {
        let client: Arc<dyn ChainClient> = Arc::new(JsonRpcClient::new(settings.rpc_url.clone()));
        let chain_id = resolve_chain_id(client.as_ref(), settings.chain_id, settings.rpc_timeout).await?;
        Self::new(settings, client, chain_id)
    }

    /// Builds a service around an already resolved chain id.
    pub fn new(settings: FaucetSettings, client: Arc<dyn ChainClient>, chain_id: u64) -> FaucetResult<Self> {
        let metrics = Arc::new(FaucetMetrics::new().map_err(|e| FaucetError::Config(format!("metrics: {e}")))?);

        let dispatcher = Dispatcher::new(
            client,
            settings.wallet.clone(),
            chain_id,
            settings.amount,
            settings.fallback_gas_price,
            settings.rpc_timeout,
            metrics.clone(),
        );

        let display_amount = to_display_units(&BigUint::from(settings.amount), settings.decimals).to_string();

        info!("Faucet address: {}", dispatcher.address());
        info!("Chain id: {}, claim amount: {}", chain_id, display_amount);

        Ok(Self {
            settings,
            dispatcher,
            limiter: Arc::new(ClaimLimiter::new()),
            in_flight: InFlight::default(),
            metrics,
            display_amount,
        })
    }

    /// The faucet's sending address.
    pub fn address(&self) -> Address {
        self.dispatcher.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.dispatcher.chain_id()
    }

    /// Claim amount in display units, e.g. `0.01`.
    pub fn display_amount(&self) -> &str {
        &self.display_amount
    }

    pub fn settings(&self) -> &FaucetSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &Arc<ClaimLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.metrics
    }

    /// Runs one claim: validate, rate-check, dispatch, record.
    pub async fn claim(&self, request: ClaimRequest) -> FaucetResult<Receipt> {
        let result = self.process(request).await;
        match &result {
            Ok(_) => self.metrics.record_claim("success"),
            Err(e) => self.metrics.record_claim(e.outcome()),
        }
        result
    }

    async fn process(&self, request: ClaimRequest) -> FaucetResult<Receipt> {
        if self.settings.require_approval && request.approval != ClaimApproval::Approved {
            return Err(FaucetError::Unauthorized);
        }

        let raw = request.address.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(FaucetError::InvalidAddress("missing address".to_string()));
        }
        let recipient: Address = raw
            .parse()
            .map_err(|e| FaucetError::InvalidAddress(format!("{raw}: {e}")))?;

        let address_key = recipient.to_string();
        let origin = request.origin.as_str();

        // Reserve before checking: a finished claim marks the limiter before
        // releasing its reservation, so the check below always sees it.
        let _reservation = self
            .in_flight
            .reserve(&address_key, origin)
            .ok_or(FaucetError::RateLimited(LimitedKey::InFlight))?;
        self.check_eligible(&address_key, origin)?;

        let receipt = self.dispatcher.send(recipient).await.map_err(|e| {
            error!("Dispatch to {} for origin {} failed: {}", recipient, origin, e);
            FaucetError::DispatchFailed(e)
        })?;

        self.limiter.mark_all(&[address_key.as_str(), origin], self.settings.delay);

        info!(
            "Claim served: [{}] {} -> {}, tx {}",
            origin, self.display_amount, recipient, receipt.hash
        );
        Ok(receipt)
    }

    fn check_eligible(&self, address_key: &str, origin: &str) -> FaucetResult<()> {
        if let Some(left) = self.limiter.remaining(address_key) {
            debug!("{} rate limited for another {:?}", address_key, left);
            return Err(FaucetError::RateLimited(LimitedKey::Address));
        }
        if let Some(left) = self.limiter.remaining(origin) {
            debug!("origin {} rate limited for another {:?}", origin, left);
            return Err(FaucetError::RateLimited(LimitedKey::Origin));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_blocks_overlapping_keys() {
        let in_flight = InFlight::default();
        let first = in_flight.reserve("0xaaa", "1.1.1.1").unwrap();
        assert!(in_flight.reserve("0xaaa", "2.2.2.2").is_none());
        assert!(in_flight.reserve("0xbbb", "1.1.1.1").is_none());
        assert!(in_flight.reserve("0xbbb", "2.2.2.2").is_some());

        drop(first);
        assert!(in_flight.reserve("0xaaa", "1.1.1.1").is_some());
    }

    #[test]
    fn test_reservation_released_after_drop() {
        let in_flight = InFlight::default();
        {
            let _held = in_flight.reserve("0xaaa", "1.1.1.1").unwrap();
        }
        assert!(in_flight.keys.lock().unwrap().is_empty());
    }
}
