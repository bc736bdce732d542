//! Flight delay prediction library
//!
//! This crate provides the core functionality for:
//! - Feature derivation from scheduled flights (calendar, holidays, waves)
//! - Historical rate enrichment
//! - Tree-ensemble inference over a fitted preprocessing pipeline
//! - TreeSHAP explanations ranked into readable factors
//! - Configuration, artifact checksums and observability

pub mod artifact;
pub mod calendar;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod stats;

pub use calendar::HolidayCalendar;
pub use config::{ConfigOverrides, PredictorConfig};
pub use error::{LoadError, ValidationError};
pub use models::*;
pub use observability::{PredictorMetrics, StructuredLogger};
pub use predictor::Predictor;
pub use stats::{HistoricalStats, Statistic};
