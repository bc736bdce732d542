//! ML prediction engine

mod features;
mod inference;
mod output;
mod preprocessor;
mod shap;

pub use features::{
    encode_hour, FeatureBuilder, FeatureRow, DAY_OF_WEEK, FIRST_WAVE_LAST_HOUR, HOUR_COS,
    HOUR_SIN, IS_DAY_AFTER_HOLIDAY, IS_DAY_BEFORE_HOLIDAY, IS_FIRST_WAVE, IS_HOLIDAY,
    IS_LAST_WAVE, IS_WEEKEND, LAST_WAVE_FIRST_HOUR,
};
pub use inference::{
    Attribution, Classifier, Node, Objective, Pipeline, SplitRule, Tree, TreeEnsemble,
};
pub use output::{rank_factors, OutputFormatter, RankOptions, INACTIVE_EPSILON};
pub use preprocessor::{FeatureKind, Preprocessor, TransformedFeature};

use crate::artifact;
use crate::calendar::HolidayCalendar;
use crate::config::{validate_threshold, PredictorConfig, DEFAULT_TOP_N};
use crate::error::{LoadError, ValidationError};
use crate::models::{
    Departure, Factor, FlightRequest, PredictionResult, PredictionWithExplanation,
};
use crate::observability::{PredictorMetrics, StructuredLogger};
use crate::stats::HistoricalStats;
use inference::PipelineArtifact;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

/// Flight delay predictor
///
/// Holds the fitted pipeline, historical statistics and decision threshold.
/// Immutable after construction and safe to share across threads.
pub struct Predictor {
    pipeline: Pipeline,
    features: FeatureBuilder,
    formatter: OutputFormatter,
    top_n: usize,
    model_checksum: Option<String>,
    metrics: PredictorMetrics,
    logger: StructuredLogger,
}

impl Predictor {
    /// Load the pipeline and optional statistics from disk
    pub fn new(
        pipeline_path: impl AsRef<Path>,
        stats_path: Option<&Path>,
        threshold: f64,
    ) -> Result<Self, LoadError> {
        let mut config = PredictorConfig::new(pipeline_path.as_ref()).with_threshold(threshold);
        config.stats_path = stats_path.map(Path::to_path_buf);
        Self::from_config(&config)
    }

    pub fn from_config(config: &PredictorConfig) -> Result<Self, LoadError> {
        config.validate()?;

        let loaded = artifact::load_json::<PipelineArtifact>(
            &config.model_path,
            config.model_sha256.as_deref(),
        )?;
        let pipeline = Pipeline::from_artifact(loaded.value, &loaded.checksum)?;

        let stats = match &config.stats_path {
            Some(path) => Some(
                artifact::load_json::<HistoricalStats>(path, config.stats_sha256.as_deref())?
                    .value,
            ),
            None => None,
        };

        let mut predictor =
            Self::from_parts(pipeline, stats, config.holiday_calendar, config.threshold)?;
        predictor.top_n = config.top_n;
        predictor.model_checksum = Some(loaded.checksum);
        predictor.announce();
        Ok(predictor)
    }

    /// Assemble a predictor from already loaded parts
    pub fn from_parts(
        pipeline: Pipeline,
        stats: Option<HistoricalStats>,
        calendar: HolidayCalendar,
        threshold: f64,
    ) -> Result<Self, LoadError> {
        validate_threshold(threshold)?;
        Ok(Self {
            pipeline,
            features: FeatureBuilder::new(calendar, stats),
            formatter: OutputFormatter::new(threshold),
            top_n: DEFAULT_TOP_N,
            model_checksum: None,
            metrics: PredictorMetrics::new(),
            logger: StructuredLogger::new("predictor"),
        })
    }

    fn announce(&self) {
        let checksum = self.model_checksum.as_deref().unwrap_or("");
        self.metrics
            .set_model_version(self.pipeline.version(), checksum);
        self.logger.log_artifacts_loaded(
            self.pipeline.version(),
            checksum,
            &self.pipeline.classifier().describe(),
            self.pipeline.preprocessor().num_features(),
            self.features.stats().is_some(),
            self.threshold(),
        );
    }

    pub fn threshold(&self) -> f64 {
        self.formatter.threshold()
    }

    /// Configured number of explanation factors
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn model_version(&self) -> &str {
        self.pipeline.version()
    }

    /// SHA256 of the pipeline artifact, when loaded from disk
    pub fn model_checksum(&self) -> Option<&str> {
        self.model_checksum.as_deref()
    }

    pub fn holiday_calendar(&self) -> HolidayCalendar {
        self.features.calendar()
    }

    pub fn has_stats(&self) -> bool {
        self.features.stats().is_some()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Transformed feature names in model input order
    pub fn feature_names(&self) -> Vec<&str> {
        self.pipeline.preprocessor().feature_names()
    }

    /// Derived feature row for a request, before preprocessing
    pub fn feature_row(&self, request: &FlightRequest) -> FeatureRow {
        self.features.build(request)
    }

    /// Classify a request against the configured threshold
    pub fn predict(&self, request: &FlightRequest) -> Result<PredictionResult, ValidationError> {
        let start = Instant::now();

        let row = self.features.build(request);
        let probabilities = self
            .pipeline
            .predict_proba(&row)
            .map_err(|e| self.reject(e))?;
        let result = self.formatter.format(probabilities);

        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.metrics.inc_predictions(&result.label);
        self.logger.log_prediction(
            &departure_label(&request.departure()),
            result.prediction,
            result.probability_delay,
            result.threshold_used,
            elapsed.as_micros(),
        );

        Ok(result)
    }

    /// Rank the features that pushed this request's prediction up or down
    pub fn explain(
        &self,
        request: &FlightRequest,
        top_n: usize,
    ) -> Result<Vec<Factor>, ValidationError> {
        let start = Instant::now();

        let row = self.features.build(request);
        let x = self.pipeline.transform(&row).map_err(|e| self.reject(e))?;
        let attribution = self.pipeline.classifier().shap_values(&x);

        let options = RankOptions {
            top_n,
            skip_inactive_indicators: matches!(request, FlightRequest::Scheduled(_)),
        };
        let factors = rank_factors(
            self.pipeline.preprocessor().features(),
            &x,
            &attribution.values,
            &row,
            options,
        );

        let elapsed = start.elapsed();
        self.metrics.observe_explanation_latency(elapsed.as_secs_f64());
        self.metrics.inc_explanations();
        self.logger.log_explanation(
            factors.len(),
            factors.first().map(|f| f.feature.as_str()),
            elapsed.as_micros(),
        );

        Ok(factors)
    }

    pub fn predict_with_explanation(
        &self,
        request: &FlightRequest,
        top_n: usize,
    ) -> Result<PredictionWithExplanation, ValidationError> {
        let prediction = self.predict(request)?;
        let top_factors = self.explain(request, top_n)?;
        Ok(PredictionWithExplanation {
            prediction,
            departure: request.departure(),
            top_factors,
        })
    }

    pub fn predict_json(&self, request: &Value) -> Result<PredictionResult, ValidationError> {
        let request = self.parse(request)?;
        self.predict(&request)
    }

    pub fn explain_json(
        &self,
        request: &Value,
        top_n: usize,
    ) -> Result<Vec<Factor>, ValidationError> {
        let request = self.parse(request)?;
        self.explain(&request, top_n)
    }

    pub fn predict_with_explanation_json(
        &self,
        request: &Value,
        top_n: usize,
    ) -> Result<PredictionWithExplanation, ValidationError> {
        let request = self.parse(request)?;
        self.predict_with_explanation(&request, top_n)
    }

    fn parse(&self, request: &Value) -> Result<FlightRequest, ValidationError> {
        FlightRequest::from_json(request).map_err(|e| self.reject(e))
    }

    fn reject(&self, err: ValidationError) -> ValidationError {
        self.metrics.inc_validation_errors();
        self.logger
            .log_validation_failure(err.field(), &err.to_string());
        err
    }
}

fn departure_label(departure: &Departure) -> String {
    match departure {
        Departure::Scheduled { departure_datetime } => departure_datetime.clone(),
        Departure::Hourly { departure_hour } => format!("hour {}", departure_hour),
    }
}
