//! Pipeline inspection command

use anyhow::Result;
use colored::Colorize;
use predictor_lib::predictor::FeatureKind;
use predictor_lib::Predictor;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_probability, print_json, print_table, print_warning, OutputFormat};

/// Row for the features table
#[derive(Tabled, Serialize)]
struct FeatureRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Source")]
    source: String,
}

#[derive(Serialize)]
struct Inspection {
    model_version: String,
    model_checksum: Option<String>,
    classifier: String,
    threshold: f64,
    top_n: usize,
    holiday_calendar: String,
    stats_loaded: bool,
    features: Vec<FeatureRow>,
}

fn kind_name(kind: &FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Continuous { .. } => "continuous",
        FeatureKind::Binary { .. } => "binary",
        FeatureKind::Categorical { .. } => "categorical",
    }
}

fn inspection(predictor: &Predictor) -> Inspection {
    let features = predictor
        .pipeline()
        .preprocessor()
        .features()
        .iter()
        .enumerate()
        .map(|(index, feature)| FeatureRow {
            index,
            name: feature.name().to_string(),
            kind: kind_name(feature.kind()),
            source: feature.kind().column().to_string(),
        })
        .collect();

    Inspection {
        model_version: predictor.model_version().to_string(),
        model_checksum: predictor.model_checksum().map(str::to_string),
        classifier: predictor.pipeline().classifier().describe(),
        threshold: predictor.threshold(),
        top_n: predictor.top_n(),
        holiday_calendar: predictor.holiday_calendar().to_string(),
        stats_loaded: predictor.has_stats(),
        features,
    }
}

/// Show what the loaded pipeline expects and produces
pub fn inspect(predictor: &Predictor, format: OutputFormat) -> Result<()> {
    let info = inspection(predictor);

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            println!("{}", "Pipeline".bold());
            println!("{}", "=".repeat(60));
            println!("Version:     {}", info.model_version.cyan());
            println!(
                "Checksum:    {}",
                info.model_checksum.as_deref().unwrap_or("-")
            );
            println!("Classifier:  {}", info.classifier);
            println!("Threshold:   {}", format_probability(info.threshold));
            println!("Top N:       {}", info.top_n);
            println!("Calendar:    {}", info.holiday_calendar);
            if !info.stats_loaded {
                print_warning("No historical statistics loaded");
            }
            println!();

            println!("{} ({})", "Features".bold(), info.features.len());
            print_table(info.features, "Pipeline has no features");
        }
    }

    Ok(())
}
