//! Prometheus metrics for the settlement engine.
//!
//! [`MarketMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{register_int_counter_with_registry, Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counters for every engine command.
pub struct MarketMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    pub bets_placed: IntCounter,
    /// Placements refused for validation, state or not-found reasons.
    pub bets_rejected: IntCounter,
    pub chapters_opened: IntCounter,
    pub chapters_closed: IntCounter,
    /// Chapters resolved with at least one winning bet.
    pub chapters_resolved: IntCounter,
    /// Chapters whose pot rolled over because nobody backed the winner.
    pub chapters_carried_over: IntCounter,
    pub payouts_created: IntCounter,
    pub claims_completed: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    register_int_counter_with_registry!(Opts::new(name, help), registry)
        .expect("failed to register market counter")
}

impl MarketMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();
        Self {
            bets_placed: counter(
                &registry,
                "plotline_bets_placed_total",
                "Total bets booked",
            ),
            bets_rejected: counter(
                &registry,
                "plotline_bets_rejected_total",
                "Total bet placements rejected",
            ),
            chapters_opened: counter(
                &registry,
                "plotline_chapters_opened_total",
                "Total chapters opened for betting",
            ),
            chapters_closed: counter(
                &registry,
                "plotline_chapters_closed_total",
                "Total chapters whose betting was closed",
            ),
            chapters_resolved: counter(
                &registry,
                "plotline_chapters_resolved_total",
                "Total chapters resolved with winners",
            ),
            chapters_carried_over: counter(
                &registry,
                "plotline_chapters_carried_over_total",
                "Total chapters resolved without winners",
            ),
            payouts_created: counter(
                &registry,
                "plotline_payouts_created_total",
                "Total payout rows created at resolution",
            ),
            claims_completed: counter(
                &registry,
                "plotline_claims_completed_total",
                "Total successful claims",
            ),
            registry,
        }
    }

    /// Render every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for MarketMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_counters() {
        let metrics = MarketMetrics::new();
        metrics.bets_placed.inc();
        metrics.bets_placed.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("plotline_bets_placed_total 2"));
        assert!(text.contains("plotline_claims_completed_total 0"));
    }

    #[test]
    fn separate_instances_do_not_share_registries() {
        let a = MarketMetrics::new();
        let b = MarketMetrics::new();
        a.chapters_opened.inc();
        assert_eq!(b.chapters_opened.get(), 0);
    }
}
