//! Prometheus metrics for the faucet

use prometheus::{histogram_opts, opts, Encoder, Histogram, IntCounterVec, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct FaucetMetrics {
    registry: Registry,

    /// Requests by outcome (`dispensed` or a [`crate::FaucetError::kind`] label)
    pub requests_total: IntCounterVec,
    pub dispense_duration: Histogram,
    pub tracked_addresses: IntGauge,
}

impl FaucetMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            opts!("faucet_requests_total", "Faucet requests by outcome"),
            &["outcome"],
        )?;

        let dispense_duration = Histogram::with_opts(histogram_opts!(
            "faucet_dispense_duration_seconds",
            "Time from admission to broadcast result",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        ))?;

        let tracked_addresses = IntGauge::with_opts(opts!(
            "faucet_rate_limit_tracked_addresses",
            "Addresses currently inside their cooldown window"
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(dispense_duration.clone()))?;
        registry.register(Box::new(tracked_addresses.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            dispense_duration,
            tracked_addresses,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
