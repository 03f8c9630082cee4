// Prometheus metrics definitions for the deck builder.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Deck builds, by outcome (ok, error).
    pub static ref DECK_BUILDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deckbuilder_deck_builds_total", "Deck build requests"),
        &["outcome"],
    )
    .unwrap();

    /// Model attempts, by outcome (text, empty, error).
    pub static ref MODEL_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deckbuilder_model_attempts_total", "Generative model attempts"),
        &["outcome"],
    )
    .unwrap();

    /// Normalization repairs, by kind (text, padded, truncated).
    pub static ref NORMALIZATION_FALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "deckbuilder_normalization_fallbacks_total",
            "Model responses repaired by the normalizer",
        ),
        &["kind"],
    )
    .unwrap();

    /// Vendor API requests, by endpoint and HTTP status.
    pub static ref VENDOR_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deckbuilder_vendor_requests_total", "Vendor API requests"),
        &["endpoint", "status"],
    )
    .unwrap();

    /// Players imported from the vendor API.
    pub static ref PLAYER_IMPORTS_TOTAL: IntCounter = IntCounter::new(
        "deckbuilder_player_imports_total",
        "Players imported from the vendor API",
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DECK_BUILDS_TOTAL.clone()),
        Box::new(MODEL_ATTEMPTS_TOTAL.clone()),
        Box::new(NORMALIZATION_FALLBACKS_TOTAL.clone()),
        Box::new(VENDOR_REQUESTS_TOTAL.clone()),
        Box::new(PLAYER_IMPORTS_TOTAL.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                tracing::warn!("failed to register metric: {e}");
            }
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
