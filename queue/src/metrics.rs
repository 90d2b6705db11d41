use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use satchel_utils::Origin;

/// Label for per-origin enqueue metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OriginLabel {
    /// The origin that enqueued the operation.
    pub origin: String,
}

impl OriginLabel {
    /// Create a new label from an origin.
    pub fn from(origin: &Origin) -> Self {
        Self {
            origin: origin.to_string(),
        }
    }
}

/// Metrics for the [`Engine`](super::Engine).
#[derive(Default)]
pub struct Metrics {
    /// Number of unsettled operations across all origins
    pub pending: Gauge,
    /// Number of enqueued operations by origin
    pub enqueued: Family<OriginLabel, Counter>,
    /// Number of settled operations
    pub settled: Counter,
    /// Number of settled operations whose caller dropped the result
    pub undelivered: Counter,
    /// Number of armed barriers
    pub waiters: Gauge,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Metrics::default();
        registry.register(
            "pending",
            "Number of unsettled operations across all origins",
            metrics.pending.clone(),
        );
        registry.register(
            "enqueued",
            "Number of enqueued operations by origin",
            metrics.enqueued.clone(),
        );
        registry.register(
            "settled",
            "Number of settled operations",
            metrics.settled.clone(),
        );
        registry.register(
            "undelivered",
            "Number of settled operations whose caller dropped the result",
            metrics.undelivered.clone(),
        );
        registry.register(
            "waiters",
            "Number of armed barriers",
            metrics.waiters.clone(),
        );
        metrics
    }
}
