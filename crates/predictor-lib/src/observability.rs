//! Observability infrastructure for the delay predictor
//!
//! Provides:
//! - Prometheus metrics (inference latency, prediction outcomes, validation
//!   failures, historical lookup misses, loaded model version)
//! - Structured logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PredictorMetricsInner> = OnceLock::new();

struct PredictorMetricsInner {
    prediction_latency_seconds: Histogram,
    explanation_latency_seconds: Histogram,
    predictions: IntCounterVec,
    explanations: IntCounter,
    validation_errors: IntCounter,
    lookup_misses: IntCounterVec,
    model_version_info: GaugeVec,
}

impl PredictorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "flight_delay_prediction_latency_seconds",
                "Time spent scoring a single request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            explanation_latency_seconds: register_histogram!(
                "flight_delay_explanation_latency_seconds",
                "Time spent computing SHAP explanations for a single request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register explanation_latency_seconds"),

            predictions: register_int_counter_vec!(
                "flight_delay_predictions_total",
                "Predictions served, by predicted label",
                &["label"]
            )
            .expect("Failed to register predictions_total"),

            explanations: register_int_counter!(
                "flight_delay_explanations_total",
                "Explanations served"
            )
            .expect("Failed to register explanations_total"),

            validation_errors: register_int_counter!(
                "flight_delay_validation_errors_total",
                "Requests rejected before scoring"
            )
            .expect("Failed to register validation_errors_total"),

            lookup_misses: register_int_counter_vec!(
                "flight_delay_lookup_misses_total",
                "Historical lookups resolved with the global delay rate",
                &["statistic"]
            )
            .expect("Failed to register lookup_misses_total"),

            model_version_info: register_gauge_vec!(
                "flight_delay_model_version_info",
                "Information about the currently loaded pipeline",
                &["version", "checksum"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Predictor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PredictorMetrics {
    _private: (),
}

impl Default for PredictorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PredictorMetricsInner {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_explanation_latency(&self, duration_secs: f64) {
        self.inner().explanation_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, label: &str) {
        self.inner().predictions.with_label_values(&[label]).inc();
    }

    pub fn predictions(&self, label: &str) -> u64 {
        self.inner().predictions.with_label_values(&[label]).get()
    }

    pub fn inc_explanations(&self) {
        self.inner().explanations.inc();
    }

    pub fn inc_validation_errors(&self) {
        self.inner().validation_errors.inc();
    }

    pub fn validation_errors(&self) -> u64 {
        self.inner().validation_errors.get()
    }

    pub fn inc_lookup_miss(&self, statistic: &str) {
        self.inner().lookup_misses.with_label_values(&[statistic]).inc();
    }

    pub fn lookup_misses(&self, statistic: &str) -> u64 {
        self.inner().lookup_misses.with_label_values(&[statistic]).get()
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str, checksum: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version, checksum])
            .set(1.0);
    }
}

/// Structured logger for predictor events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log a successful artifact bundle load
    pub fn log_artifacts_loaded(
        &self,
        model_version: &str,
        model_checksum: &str,
        classifier: &str,
        num_features: usize,
        stats_loaded: bool,
        threshold: f64,
    ) {
        info!(
            event = "artifacts_loaded",
            component = %self.component,
            model_version = %model_version,
            model_checksum = %model_checksum,
            classifier = %classifier,
            num_features = num_features,
            stats_loaded = stats_loaded,
            threshold = threshold,
            "Predictor artifacts loaded"
        );
        if !stats_loaded {
            warn!(
                event = "stats_missing",
                component = %self.component,
                "No historical statistics loaded, enrichment features will be undefined"
            );
        }
    }

    /// Log a prediction
    pub fn log_prediction(
        &self,
        departure: &str,
        prediction: u8,
        probability_delay: f64,
        threshold: f64,
        elapsed_us: u128,
    ) {
        debug!(
            event = "prediction_generated",
            component = %self.component,
            departure = %departure,
            prediction = prediction,
            probability_delay = probability_delay,
            threshold = threshold,
            elapsed_us = elapsed_us,
            "Generated delay prediction"
        );
    }

    /// Log an explanation
    pub fn log_explanation(&self, factors: usize, top_feature: Option<&str>, elapsed_us: u128) {
        debug!(
            event = "explanation_generated",
            component = %self.component,
            factors = factors,
            top_feature = ?top_feature,
            elapsed_us = elapsed_us,
            "Generated SHAP explanation"
        );
    }

    /// Log a rejected request
    pub fn log_validation_failure(&self, field: Option<&str>, reason: &str) {
        warn!(
            event = "validation_failed",
            component = %self.component,
            field = ?field,
            reason = %reason,
            "Rejected inference request"
        );
    }
}
