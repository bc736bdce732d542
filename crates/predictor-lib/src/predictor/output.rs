//! Prediction output formatting and post-processing
//!
//! Turns raw class probabilities into a labelled decision and ranks SHAP
//! contributions into human-readable factors.

use super::features::FeatureRow;
use super::preprocessor::TransformedFeature;
use crate::models::{Direction, Factor, FeatureValue, PredictionResult, LABEL_DELAYED, LABEL_ON_TIME};

/// Indicator values below this magnitude count as inactive
pub const INACTIVE_EPSILON: f64 = 1e-9;

/// Formats raw probabilities into a PredictionResult
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    threshold: f64,
}

impl OutputFormatter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify `[no_delay, delay]` probabilities against the threshold
    pub fn format(&self, probabilities: [f64; 2]) -> PredictionResult {
        let probability_no_delay = nan_to_zero(probabilities[0]);
        let probability_delay = nan_to_zero(probabilities[1]);
        let delayed = probability_delay >= self.threshold;

        PredictionResult {
            prediction: delayed as u8,
            label: if delayed { LABEL_DELAYED } else { LABEL_ON_TIME }.to_string(),
            probability_delay,
            probability_no_delay,
            threshold_used: self.threshold,
        }
    }
}

/// Controls which transformed features may appear in an explanation
#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    pub top_n: usize,
    /// Drop one-hot indicators that are off for this request
    pub skip_inactive_indicators: bool,
}

/// Rank transformed features by absolute impact and keep the top `top_n`
/// displayable ones.
///
/// Cyclic hour encodings are never shown. Values come from the derived row,
/// so categorical indicators show the original category.
pub fn rank_factors(
    features: &[TransformedFeature],
    transformed: &[f64],
    impacts: &[f64],
    row: &FeatureRow,
    options: RankOptions,
) -> Vec<Factor> {
    let impacts: Vec<f64> = impacts.iter().copied().map(nan_to_zero).collect();
    let mut order: Vec<usize> = (0..features.len().min(impacts.len())).collect();
    order.sort_by(|&a, &b| {
        impacts[b]
            .abs()
            .partial_cmp(&impacts[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut factors = Vec::with_capacity(options.top_n);
    for i in order {
        if factors.len() >= options.top_n {
            break;
        }
        let kind = features[i].kind();
        if kind.is_cyclic_hour() {
            continue;
        }
        if options.skip_inactive_indicators
            && kind.is_categorical()
            && transformed[i].abs() < INACTIVE_EPSILON
        {
            continue;
        }

        let value = row
            .get(kind.column())
            .cloned()
            .unwrap_or(FeatureValue::Float(transformed[i]));

        factors.push(Factor {
            feature: kind.display_name(),
            value,
            impact: impacts[i],
            direction: Direction::from_impact(impacts[i]),
        });
    }
    factors
}

pub(crate) fn nan_to_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
