//! Core data models for flight delay inference

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const AIRLINE: &str = "airline";
pub const ORIGIN_AIRPORT: &str = "origin_airport";
pub const DESTINATION_AIRPORT: &str = "destination_airport";
pub const DEPARTURE_DATETIME: &str = "departure_datetime";
pub const HOUR: &str = "hour";

pub const LABEL_DELAYED: &str = "Delayed";
pub const LABEL_ON_TIME: &str = "On Time";

/// Layouts accepted for `departure_datetime`, tried in order after RFC 3339
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A single cell of a feature row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view of the value; text has none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Integer(i) => Some(*i as f64),
            FeatureValue::Float(f) => Some(*f),
            FeatureValue::Text(_) => None,
        }
    }

    /// Category label used by one-hot encoding
    pub fn as_category(&self) -> String {
        match self {
            FeatureValue::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn from_json(field: &str, value: &Value) -> Result<Option<Self>, ValidationError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(FeatureValue::Flag(*b))),
            Value::Number(n) => Ok(n
                .as_i64()
                .map(FeatureValue::Integer)
                .or_else(|| n.as_f64().map(FeatureValue::Float))),
            Value::String(s) => Ok(Some(FeatureValue::Text(s.clone()))),
            Value::Array(_) | Value::Object(_) => Err(ValidationError::invalid(
                field,
                "expected a string, number or boolean",
            )),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Flag(b) => write!(f, "{}", b),
            FeatureValue::Integer(i) => write!(f, "{}", i),
            FeatureValue::Float(x) => write!(f, "{}", x),
            FeatureValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Integer(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Float(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Flag(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

/// Full request shape: carrier, route and a departure timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledFlight {
    airline: String,
    origin_airport: String,
    destination_airport: String,
    departure: NaiveDateTime,
    departure_raw: String,
}

impl ScheduledFlight {
    pub fn new(
        airline: impl Into<String>,
        origin_airport: impl Into<String>,
        destination_airport: impl Into<String>,
        departure_datetime: &str,
    ) -> Result<Self, ValidationError> {
        let airline = required_text(AIRLINE, airline.into())?;
        let origin_airport = required_text(ORIGIN_AIRPORT, origin_airport.into())?;
        let destination_airport = required_text(DESTINATION_AIRPORT, destination_airport.into())?;
        if departure_datetime.trim().is_empty() {
            return Err(ValidationError::missing(DEPARTURE_DATETIME));
        }
        let departure = parse_departure(departure_datetime)
            .ok_or_else(|| ValidationError::InvalidTimestamp(departure_datetime.to_string()))?;

        Ok(Self {
            airline,
            origin_airport,
            destination_airport,
            departure,
            departure_raw: departure_datetime.to_string(),
        })
    }

    pub fn airline(&self) -> &str {
        &self.airline
    }

    pub fn origin_airport(&self) -> &str {
        &self.origin_airport
    }

    pub fn destination_airport(&self) -> &str {
        &self.destination_airport
    }

    /// Local wall-clock departure time
    pub fn departure(&self) -> NaiveDateTime {
        self.departure
    }

    /// The timestamp exactly as the caller supplied it
    pub fn departure_raw(&self) -> &str {
        &self.departure_raw
    }

    /// Route key: origin and destination codes concatenated
    pub fn route(&self) -> String {
        format!("{}{}", self.origin_airport, self.destination_airport)
    }
}

/// Legacy request shape: a raw departure hour plus passthrough attributes
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFlight {
    hour: i64,
    attributes: BTreeMap<String, FeatureValue>,
}

impl HourlyFlight {
    pub fn new(hour: i64) -> Self {
        Self {
            hour,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn hour(&self) -> i64 {
        self.hour
    }

    pub fn attributes(&self) -> &BTreeMap<String, FeatureValue> {
        &self.attributes
    }
}

/// A validated inference request
#[derive(Debug, Clone, PartialEq)]
pub enum FlightRequest {
    Scheduled(ScheduledFlight),
    Hourly(HourlyFlight),
}

impl FlightRequest {
    /// Build a request from a JSON object.
    ///
    /// Objects carrying a non-null `departure_datetime` are scheduled flights;
    /// otherwise an `hour` field selects the legacy shape.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        if matches!(object.get(DEPARTURE_DATETIME), Some(v) if !v.is_null()) {
            let flight = ScheduledFlight::new(
                text_field(object, AIRLINE)?,
                text_field(object, ORIGIN_AIRPORT)?,
                text_field(object, DESTINATION_AIRPORT)?,
                &text_field(object, DEPARTURE_DATETIME)?,
            )?;
            return Ok(FlightRequest::Scheduled(flight));
        }

        let hour = match object.get(HOUR) {
            None | Some(Value::Null) => return Err(ValidationError::missing(DEPARTURE_DATETIME)),
            Some(v) => integral(v)
                .ok_or_else(|| ValidationError::invalid(HOUR, "expected an integer"))?,
        };

        let mut flight = HourlyFlight::new(hour);
        for (name, raw) in object
            .iter()
            .filter(|(name, _)| name.as_str() != HOUR && name.as_str() != DEPARTURE_DATETIME)
        {
            if let Some(value) = FeatureValue::from_json(name, raw)? {
                flight.attributes.insert(name.clone(), value);
            }
        }
        Ok(FlightRequest::Hourly(flight))
    }

    /// The departure field echoed back in combined responses
    pub fn departure(&self) -> Departure {
        match self {
            FlightRequest::Scheduled(f) => Departure::Scheduled {
                departure_datetime: f.departure_raw.clone(),
            },
            FlightRequest::Hourly(f) => Departure::Hourly {
                departure_hour: f.hour,
            },
        }
    }
}

impl From<ScheduledFlight> for FlightRequest {
    fn from(flight: ScheduledFlight) -> Self {
        FlightRequest::Scheduled(flight)
    }
}

impl From<HourlyFlight> for FlightRequest {
    fn from(flight: HourlyFlight) -> Self {
        FlightRequest::Hourly(flight)
    }
}

/// Integer view of a JSON number; floats qualify when they have no fraction
fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn required_text(field: &str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(trimmed.to_string())
}

fn text_field(object: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ValidationError::missing(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::invalid(field, "expected a string")),
    }
}

/// Parse a departure timestamp. Offsets are ignored: the local wall-clock
/// time is what the model was trained on.
pub fn parse_departure(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Outcome of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: u8,
    pub label: String,
    pub probability_delay: f64,
    pub probability_no_delay: f64,
    pub threshold_used: f64,
}

impl PredictionResult {
    pub fn is_delayed(&self) -> bool {
        self.prediction == 1
    }
}

/// Sign of a feature's contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    IncreaseDelay,
    DecreaseDelay,
}

impl Direction {
    pub fn from_impact(impact: f64) -> Self {
        if impact > 0.0 {
            Direction::IncreaseDelay
        } else {
            Direction::DecreaseDelay
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::IncreaseDelay => "increase_delay",
            Direction::DecreaseDelay => "decrease_delay",
        }
    }
}

/// One ranked explanation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub feature: String,
    pub value: FeatureValue,
    pub impact: f64,
    pub direction: Direction,
}

/// Departure field echoed in a combined response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Departure {
    Scheduled { departure_datetime: String },
    Hourly { departure_hour: i64 },
}

/// Prediction merged with its departure field and ranked factors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionWithExplanation {
    #[serde(flatten)]
    pub prediction: PredictionResult,
    #[serde(flatten)]
    pub departure: Departure,
    pub top_factors: Vec<Factor>,
}
