//! Prediction and explanation CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use predictor_lib::models::{
    Departure, Factor, FlightRequest, PredictionResult, ScheduledFlight,
};
use predictor_lib::Predictor;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_direction, color_label, color_probability, format_impact, format_probability,
    print_info, print_json, print_table, OutputFormat,
};
use crate::RequestArgs;

/// Row for the factors table
#[derive(Tabled)]
struct FactorRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Impact")]
    impact: String,
    #[tabled(rename = "Direction")]
    direction: String,
}

/// Build a request from flags or a JSON document
pub fn build_request(args: &RequestArgs) -> Result<FlightRequest> {
    if let Some(path) = &args.request {
        let json = read_request(path)?;
        return FlightRequest::from_json(&json).context("Invalid request");
    }

    let flight = ScheduledFlight::new(
        args.airline.clone().unwrap_or_default(),
        args.origin.clone().unwrap_or_default(),
        args.destination.clone().unwrap_or_default(),
        args.departure.as_deref().unwrap_or_default(),
    )
    .context("Invalid request")?;
    Ok(flight.into())
}

fn read_request(path: &Path) -> Result<Value> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?
    };
    serde_json::from_str(&content).context("Request is not valid JSON")
}

/// Score a flight, optionally with its top factors
pub fn predict(
    predictor: &Predictor,
    args: &RequestArgs,
    explain: bool,
    top_n: usize,
    format: OutputFormat,
) -> Result<()> {
    let request = build_request(args)?;

    if explain {
        let response = predictor.predict_with_explanation(&request, top_n)?;
        match format {
            OutputFormat::Json => print_json(&response)?,
            OutputFormat::Table => {
                print_prediction(&response.prediction);
                println!("Departure:         {}", format_departure(&response.departure));
                println!();
                print_factors(&response.top_factors);
            }
        }
        return Ok(());
    }

    let result = predictor.predict(&request)?;
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_prediction(&result),
    }
    Ok(())
}

/// Show the factors behind a flight's prediction
pub fn explain(
    predictor: &Predictor,
    args: &RequestArgs,
    top_n: usize,
    format: OutputFormat,
) -> Result<()> {
    let request = build_request(args)?;
    let factors = predictor.explain(&request, top_n)?;

    match format {
        OutputFormat::Json => print_json(&factors)?,
        OutputFormat::Table => print_factors(&factors),
    }
    Ok(())
}

fn format_departure(departure: &Departure) -> String {
    match departure {
        Departure::Scheduled { departure_datetime } => departure_datetime.clone(),
        Departure::Hourly { departure_hour } => format!("{:02}:00", departure_hour),
    }
}

fn print_prediction(result: &PredictionResult) {
    println!("{}", "Delay Prediction".bold());
    println!("{}", "=".repeat(40));
    println!("Prediction:        {}", color_label(result));
    println!(
        "P(delay):          {}",
        color_probability(result.probability_delay, result.threshold_used)
    );
    println!(
        "P(on time):        {}",
        format_probability(result.probability_no_delay)
    );
    println!(
        "Threshold:         {}",
        format_probability(result.threshold_used)
    );
}

fn print_factors(factors: &[Factor]) {
    println!("{}", "Top Factors".bold());

    let rows: Vec<FactorRow> = factors
        .iter()
        .enumerate()
        .map(|(i, f)| FactorRow {
            rank: i + 1,
            feature: f.feature.clone(),
            value: f.value.to_string(),
            impact: format_impact(f.impact),
            direction: color_direction(f.direction),
        })
        .collect();

    print_table(rows, "No contributing factors");
    if !factors.is_empty() {
        print_info("Impacts are SHAP values in model output units");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args() -> RequestArgs {
        RequestArgs {
            airline: Some("GLO".to_string()),
            origin: Some("GRU".to_string()),
            destination: Some("SDU".to_string()),
            departure: Some("2024-12-24T18:00:00".to_string()),
            request: None,
        }
    }

    #[test]
    fn test_request_from_flags() {
        match build_request(&args()).unwrap() {
            FlightRequest::Scheduled(flight) => {
                assert_eq!(flight.route(), "GRUSDU");
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_format_departure() {
        let scheduled = build_request(&args()).unwrap().departure();
        assert_eq!(format_departure(&scheduled), "2024-12-24T18:00:00");
        assert_eq!(
            format_departure(&Departure::Hourly { departure_hour: 6 }),
            "06:00"
        );
    }

    #[test]
    fn test_request_from_flags_rejects_bad_timestamp() {
        let mut args = args();
        args.departure = Some("tomorrow".to_string());
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn test_request_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hour": 6, "airline": "GLO"}}"#).unwrap();

        let args = RequestArgs {
            airline: None,
            origin: None,
            destination: None,
            departure: None,
            request: Some(file.path().to_path_buf()),
        };
        assert!(matches!(
            build_request(&args).unwrap(),
            FlightRequest::Hourly(_)
        ));
    }
}
