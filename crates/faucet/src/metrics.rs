//! Prometheus metrics for claim outcomes and dispatch latency

use prometheus::{
    histogram_opts, opts, Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder,
};

/// Claim outcomes as exported in the `outcome` label.
pub const OUTCOMES: [&str; 5] = [
    "success",
    "invalid_address",
    "rate_limited",
    "unauthorized",
    "dispatch_failed",
];

/// Prometheus metrics for the faucet
#[derive(Debug)]
pub struct FaucetMetrics {
    registry: Registry,

    pub claims_total: IntCounterVec,
    pub gas_price_fallback_total: IntCounter,
    pub dispatch_duration: Histogram,
}

impl FaucetMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let claims_total = IntCounterVec::new(
            opts!("faucet_claims_total", "Claim requests by outcome"),
            &["outcome"],
        )?;

        let gas_price_fallback_total = IntCounter::with_opts(opts!(
            "faucet_gas_price_fallback_total",
            "Dispatches that used the fallback gas price"
        ))?;

        let dispatch_duration = Histogram::with_opts(histogram_opts!(
            "faucet_dispatch_duration_seconds",
            "Time from nonce fetch to broadcast"
        ))?;

        registry.register(Box::new(claims_total.clone()))?;
        registry.register(Box::new(gas_price_fallback_total.clone()))?;
        registry.register(Box::new(dispatch_duration.clone()))?;

        // Export every outcome at zero so dashboards see the full series.
        for outcome in OUTCOMES {
            claims_total.with_label_values(&[outcome]);
        }

        Ok(Self {
            registry,
            claims_total,
            gas_price_fallback_total,
            dispatch_duration,
        })
    }

    pub fn record_claim(&self, outcome: &str) {
        self.claims_total.with_label_values(&[outcome]).inc();
    }

    pub fn claims(&self, outcome: &str) -> u64 {
        self.claims_total.with_label_values(&[outcome]).get()
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_lists_all_outcomes() {
        let metrics = FaucetMetrics::new().unwrap();
        metrics.record_claim("success");
        metrics.record_claim("success");
        metrics.gas_price_fallback_total.inc();

        let text = metrics.gather().unwrap();
        for outcome in OUTCOMES {
            assert!(text.contains(&format!("faucet_claims_total{{outcome=\"{outcome}\"}}")));
        }
        assert!(text.contains("faucet_claims_total{outcome=\"success\"} 2"));
        assert!(text.contains("faucet_gas_price_fallback_total 1"));
        assert_eq!(metrics.claims("success"), 2);
        assert_eq!(metrics.claims("rate_limited"), 0);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = FaucetMetrics::new().unwrap();
        let b = FaucetMetrics::new().unwrap();
        a.record_claim("rate_limited");
        assert_eq!(b.claims("rate_limited"), 0);
    }
}
