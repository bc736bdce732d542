//! Column preprocessing: the fitted stage between a feature row and the
//! classifier input
//!
//! Each transformed output column is tagged with its kind when the artifact
//! is loaded, so naming and explanation lookups never parse feature names.

use super::features::{FeatureRow, HOUR_COS, HOUR_SIN};
use crate::error::{LoadError, ValidationError};
use crate::models::FeatureValue;
use serde::Deserialize;

/// Semantic kind of a transformed feature, with its source column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    Continuous { column: String },
    Binary { column: String },
    Categorical { column: String, category: String },
}

impl FeatureKind {
    /// Column of the derived row this feature is computed from
    pub fn column(&self) -> &str {
        match self {
            FeatureKind::Continuous { column }
            | FeatureKind::Binary { column }
            | FeatureKind::Categorical { column, .. } => column,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureKind::Categorical { .. })
    }

    /// Sine/cosine hour encodings are synthetic and never shown to users
    pub fn is_cyclic_hour(&self) -> bool {
        matches!(self.column(), HOUR_SIN | HOUR_COS)
    }

    /// Name shown to users, without the transformer namespace
    pub fn display_name(&self) -> String {
        match self {
            FeatureKind::Continuous { column } | FeatureKind::Binary { column } => column.clone(),
            FeatureKind::Categorical { column, category } => format!("{}_{}", column, category),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Encoding {
    Scaled { mean: f64, scale: f64 },
    Passthrough,
    Indicator,
}

/// One column of the classifier input
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedFeature {
    name: String,
    kind: FeatureKind,
    encoding: Encoding,
}

impl TransformedFeature {
    /// Full output name, e.g. `cat__airline_GLO`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    fn encode(&self, value: &FeatureValue) -> Result<f64, ValidationError> {
        match (&self.encoding, &self.kind) {
            (Encoding::Indicator, FeatureKind::Categorical { category, .. }) => {
                Ok(if value.as_category() == *category { 1.0 } else { 0.0 })
            }
            (Encoding::Scaled { mean, scale }, kind) => {
                let x = numeric(kind.column(), value)?;
                Ok((x - mean) / scale)
            }
            (_, kind) => numeric(kind.column(), value),
        }
    }
}

fn numeric(column: &str, value: &FeatureValue) -> Result<f64, ValidationError> {
    value
        .as_f64()
        .ok_or_else(|| ValidationError::invalid(column, "expected a numeric value"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TransformerDef {
    Continuous {
        name: String,
        columns: Vec<String>,
        #[serde(default)]
        mean: Option<Vec<f64>>,
        #[serde(default)]
        scale: Option<Vec<f64>>,
    },
    Binary {
        name: String,
        columns: Vec<String>,
    },
    Categorical {
        name: String,
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PreprocessorDef {
    transformers: Vec<TransformerDef>,
}

/// Fitted column transformer producing a dense numeric vector
#[derive(Debug, Clone)]
pub struct Preprocessor {
    features: Vec<TransformedFeature>,
}

impl Preprocessor {
    pub(crate) fn from_def(def: PreprocessorDef) -> Result<Self, LoadError> {
        let mut features = Vec::new();

        for transformer in def.transformers {
            match transformer {
                TransformerDef::Continuous {
                    name,
                    columns,
                    mean,
                    scale,
                } => {
                    let scaling = match (mean, scale) {
                        (Some(mean), Some(scale)) => {
                            if mean.len() != columns.len() || scale.len() != columns.len() {
                                return Err(invalid(format!(
                                    "transformer '{}' has {} columns but {} means and {} scales",
                                    name,
                                    columns.len(),
                                    mean.len(),
                                    scale.len()
                                )));
                            }
                            Some((mean, scale))
                        }
                        (None, None) => None,
                        _ => {
                            return Err(invalid(format!(
                                "transformer '{}' must define both mean and scale or neither",
                                name
                            )))
                        }
                    };

                    for (i, column) in columns.into_iter().enumerate() {
                        let encoding = match &scaling {
                            Some((mean, scale)) => Encoding::Scaled {
                                mean: mean[i],
                                // constant columns are fitted with a zero scale
                                scale: if scale[i] == 0.0 { 1.0 } else { scale[i] },
                            },
                            None => Encoding::Passthrough,
                        };
                        features.push(TransformedFeature {
                            name: format!("{}__{}", name, column),
                            kind: FeatureKind::Continuous { column },
                            encoding,
                        });
                    }
                }
                TransformerDef::Binary { name, columns } => {
                    for column in columns {
                        features.push(TransformedFeature {
                            name: format!("{}__{}", name, column),
                            kind: FeatureKind::Binary { column },
                            encoding: Encoding::Passthrough,
                        });
                    }
                }
                TransformerDef::Categorical {
                    name,
                    columns,
                    categories,
                } => {
                    if categories.len() != columns.len() {
                        return Err(invalid(format!(
                            "transformer '{}' has {} columns but {} category lists",
                            name,
                            columns.len(),
                            categories.len()
                        )));
                    }
                    for (column, column_categories) in columns.into_iter().zip(categories) {
                        for category in column_categories {
                            features.push(TransformedFeature {
                                name: format!("{}__{}_{}", name, column, category),
                                kind: FeatureKind::Categorical {
                                    column: column.clone(),
                                    category,
                                },
                                encoding: Encoding::Indicator,
                            });
                        }
                    }
                }
            }
        }

        if features.is_empty() {
            return Err(invalid("preprocessor produces no features".to_string()));
        }

        Ok(Self { features })
    }

    pub fn features(&self) -> &[TransformedFeature] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Transform a derived row into the classifier's input vector.
    ///
    /// Columns not consumed by any transformer are ignored. Unknown
    /// categories encode as all-zero indicators.
    pub fn transform(&self, row: &FeatureRow) -> Result<Vec<f64>, ValidationError> {
        self.features
            .iter()
            .map(|feature| {
                let column = feature.kind.column();
                let value = row
                    .get(column)
                    .ok_or_else(|| ValidationError::missing(column))?;
                feature.encode(value)
            })
            .collect()
    }
}

fn invalid(message: String) -> LoadError {
    LoadError::InvalidArtifact(message)
}
