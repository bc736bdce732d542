//! Historical aggregate statistics used for feature enrichment
//!
//! All five maps share one policy: a key absent from its map resolves to
//! the global delay rate. Misses are never errors.

use crate::error::LoadError;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Aggregate looked up while enriching a feature row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    OriginVolume,
    DestinationVolume,
    RouteVolume,
    AirlineDelayRate,
    HourDelayRate,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::OriginVolume,
        Statistic::DestinationVolume,
        Statistic::RouteVolume,
        Statistic::AirlineDelayRate,
        Statistic::HourDelayRate,
    ];

    /// Feature row column filled by this statistic
    pub fn column(&self) -> &'static str {
        match self {
            Statistic::OriginVolume => "origin_volume",
            Statistic::DestinationVolume => "destination_volume",
            Statistic::RouteVolume => "route_volume",
            Statistic::AirlineDelayRate => "airline_delay_rate",
            Statistic::HourDelayRate => "hour_delay_rate",
        }
    }
}

/// Result of a lookup: the value and whether the key was present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    pub value: f64,
    pub hit: bool,
}

/// Serialized form of the statistics artifact
#[derive(Debug, Clone, Deserialize)]
struct StatsArtifact {
    global_delay_rate: f64,
    #[serde(default)]
    origin_volume: HashMap<String, f64>,
    #[serde(default)]
    destination_volume: HashMap<String, f64>,
    #[serde(default)]
    route_volume: HashMap<String, f64>,
    #[serde(default)]
    airline_delay_rate: HashMap<String, f64>,
    #[serde(default)]
    hour_delay_rate: HashMap<String, f64>,
}

/// Read-only lookup table over the historical aggregates
#[derive(Debug, Clone)]
pub struct HistoricalStats {
    global_delay_rate: f64,
    tables: HashMap<Statistic, HashMap<String, f64>>,
}

impl<'de> Deserialize<'de> for HistoricalStats {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = StatsArtifact::deserialize(deserializer)?;
        if !raw.global_delay_rate.is_finite() {
            return Err(serde::de::Error::custom(
                "global_delay_rate must be a finite number",
            ));
        }
        let tables = HashMap::from([
            (Statistic::OriginVolume, raw.origin_volume),
            (Statistic::DestinationVolume, raw.destination_volume),
            (Statistic::RouteVolume, raw.route_volume),
            (Statistic::AirlineDelayRate, raw.airline_delay_rate),
            (Statistic::HourDelayRate, raw.hour_delay_rate),
        ]);
        Ok(Self {
            global_delay_rate: raw.global_delay_rate,
            tables,
        })
    }
}

impl HistoricalStats {
    /// Build an empty table answering every lookup with `global_delay_rate`
    pub fn new(global_delay_rate: f64) -> Self {
        Self {
            global_delay_rate,
            tables: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, statistic: Statistic, key: impl Into<String>, value: f64) -> Self {
        self.tables
            .entry(statistic)
            .or_default()
            .insert(key.into(), value);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json).map_err(|e| LoadError::InvalidArtifact(e.to_string()))
    }

    pub fn global_delay_rate(&self) -> f64 {
        self.global_delay_rate
    }

    /// Look up `key`, falling back to the global delay rate on a miss
    pub fn lookup(&self, statistic: Statistic, key: &str) -> Lookup {
        match self.tables.get(&statistic).and_then(|t| t.get(key)) {
            Some(value) => Lookup {
                value: *value,
                hit: true,
            },
            None => Lookup {
                value: self.global_delay_rate,
                hit: false,
            },
        }
    }

    /// Number of keys held for a statistic
    pub fn len(&self, statistic: Statistic) -> usize {
        self.tables.get(&statistic).map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(HashMap::is_empty)
    }
}
