//! Feature derivation for ML inference
//!
//! Reproduces the training-time feature engineering: calendar decomposition
//! of the departure time, holiday proximity, departure waves and historical
//! rate enrichment. Legacy hour-only requests get a cyclic hour encoding.

use crate::calendar::HolidayCalendar;
use crate::models::{
    FeatureValue, FlightRequest, HourlyFlight, ScheduledFlight, AIRLINE, DESTINATION_AIRPORT,
    HOUR, ORIGIN_AIRPORT,
};
use crate::observability::PredictorMetrics;
use crate::stats::{HistoricalStats, Statistic};
use chrono::{Datelike, Timelike};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::debug;

pub const HOUR_SIN: &str = "hour_sin";
pub const HOUR_COS: &str = "hour_cos";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const IS_WEEKEND: &str = "is_weekend";
pub const IS_HOLIDAY: &str = "is_holiday";
pub const IS_DAY_BEFORE_HOLIDAY: &str = "is_day_before_holiday";
pub const IS_DAY_AFTER_HOLIDAY: &str = "is_day_after_holiday";
pub const IS_FIRST_WAVE: &str = "is_first_wave";
pub const IS_LAST_WAVE: &str = "is_last_wave";

/// Departures up to and including this hour belong to the first wave
pub const FIRST_WAVE_LAST_HOUR: u32 = 7;

/// Departures from this hour on belong to the last wave
pub const LAST_WAVE_FIRST_HOUR: u32 = 20;

/// Monday = 0, so Saturday and Sunday are 5 and 6
const FIRST_WEEKEND_DAY: u32 = 5;

/// A single named row of derived features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    columns: BTreeMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FeatureValue>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Sine/cosine encoding of an hour on a 24-hour circle
pub fn encode_hour(hour: i64) -> (f64, f64) {
    let angle = 2.0 * PI * hour as f64 / 24.0;
    (angle.sin(), angle.cos())
}

/// Builds feature rows from validated requests
pub struct FeatureBuilder {
    calendar: HolidayCalendar,
    stats: Option<HistoricalStats>,
    metrics: PredictorMetrics,
}

impl FeatureBuilder {
    pub fn new(calendar: HolidayCalendar, stats: Option<HistoricalStats>) -> Self {
        Self {
            calendar,
            stats,
            metrics: PredictorMetrics::new(),
        }
    }

    pub fn calendar(&self) -> HolidayCalendar {
        self.calendar
    }

    pub fn stats(&self) -> Option<&HistoricalStats> {
        self.stats.as_ref()
    }

    pub fn build(&self, request: &FlightRequest) -> FeatureRow {
        match request {
            FlightRequest::Scheduled(flight) => self.build_scheduled(flight),
            FlightRequest::Hourly(flight) => build_hourly(flight),
        }
    }

    fn build_scheduled(&self, flight: &ScheduledFlight) -> FeatureRow {
        let departure = flight.departure();
        let hour = departure.hour();
        let day_of_week = departure.weekday().num_days_from_monday();
        let holidays = self.calendar.flags(departure.date());

        let mut row = FeatureRow::new();
        row.insert(AIRLINE, flight.airline());
        row.insert(ORIGIN_AIRPORT, flight.origin_airport());
        row.insert(DESTINATION_AIRPORT, flight.destination_airport());
        row.insert(HOUR, hour as i64);
        row.insert(DAY_OF_WEEK, day_of_week as i64);
        row.insert(IS_WEEKEND, flag(day_of_week >= FIRST_WEEKEND_DAY));
        row.insert(IS_HOLIDAY, flag(holidays.is_holiday));
        row.insert(IS_DAY_BEFORE_HOLIDAY, flag(holidays.is_day_before_holiday));
        row.insert(IS_DAY_AFTER_HOLIDAY, flag(holidays.is_day_after_holiday));
        row.insert(IS_FIRST_WAVE, flag(hour <= FIRST_WAVE_LAST_HOUR));
        row.insert(IS_LAST_WAVE, flag(hour >= LAST_WAVE_FIRST_HOUR));

        self.enrich(&mut row, flight, hour);
        row
    }

    fn enrich(&self, row: &mut FeatureRow, flight: &ScheduledFlight, hour: u32) {
        let Some(stats) = &self.stats else {
            for statistic in Statistic::ALL {
                row.insert(statistic.column(), f64::NAN);
            }
            return;
        };

        let route = flight.route();
        let hour_key = hour.to_string();
        let keys = [
            (Statistic::OriginVolume, flight.origin_airport()),
            (Statistic::DestinationVolume, flight.destination_airport()),
            (Statistic::RouteVolume, route.as_str()),
            (Statistic::AirlineDelayRate, flight.airline()),
            (Statistic::HourDelayRate, hour_key.as_str()),
        ];

        for (statistic, key) in keys {
            let lookup = stats.lookup(statistic, key);
            if !lookup.hit {
                debug!(
                    statistic = statistic.column(),
                    key = %key,
                    fallback = lookup.value,
                    "Historical lookup miss, using global delay rate"
                );
                self.metrics.inc_lookup_miss(statistic.column());
            }
            row.insert(statistic.column(), lookup.value);
        }
    }
}

fn build_hourly(flight: &HourlyFlight) -> FeatureRow {
    let mut row = FeatureRow::new();
    for (name, value) in flight.attributes() {
        row.insert(name.clone(), value.clone());
    }
    let (hour_sin, hour_cos) = encode_hour(flight.hour());
    row.insert(HOUR_SIN, hour_sin);
    row.insert(HOUR_COS, hour_cos);
    row
}

fn flag(value: bool) -> i64 {
    value as i64
}
