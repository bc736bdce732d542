//! Tree-ensemble inference
//!
//! Provides the fitted pipeline (preprocessor followed by a classifier) and
//! a pure-Rust gradient-boosted / averaged tree ensemble loaded from the
//! exported JSON artifact.

use super::features::FeatureRow;
use super::preprocessor::{Preprocessor, PreprocessorDef};
use super::shap;
use crate::error::{LoadError, ValidationError};
use serde::Deserialize;

/// Additive attribution of one prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// Expected model output over the training distribution
    pub base_value: f64,
    /// One contribution per transformed feature
    pub values: Vec<f64>,
}

impl Attribution {
    /// Model output reconstructed from the attribution
    pub fn output(&self) -> f64 {
        self.base_value + self.values.iter().sum::<f64>()
    }
}

/// Trait for classifier implementations
pub trait Classifier: Send + Sync {
    /// Class probabilities `[no_delay, delay]` for one transformed row
    fn predict_proba(&self, x: &[f64]) -> [f64; 2];

    /// SHAP values for one transformed row
    fn shap_values(&self, x: &[f64]) -> Attribution;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// How tree outputs combine into a probability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Leaf values are log-odds; probability is the sigmoid of their sum
    #[default]
    BinaryLogistic,
    /// Leaf values are delay probabilities, averaged over trees
    ProbabilityAverage,
}

/// Comparison used at split nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    #[default]
    LessThan,
    LessOrEqual,
}

impl SplitRule {
    pub(crate) fn goes_left(&self, x: f64, threshold: f64, default_left: bool) -> bool {
        if x.is_nan() {
            return default_left;
        }
        match self {
            SplitRule::LessThan => x < threshold,
            SplitRule::LessOrEqual => x <= threshold,
        }
    }
}

/// Tree node; `cover` is the training weight that reached the node
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single decision tree stored as a flat node array rooted at index 0
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Leaf value reached by `x`
    pub fn predict(&self, x: &[f64], rule: SplitRule) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                    ..
                } => {
                    index = if rule.goes_left(x[*feature], *threshold, *default_left) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, index: usize) -> f64 {
        match &self.nodes[index] {
            Node::Leaf { value, .. } => *value,
            Node::Split {
                left, right, cover, ..
            } => {
                let l = self.nodes[*left].cover() / cover;
                let r = self.nodes[*right].cover() / cover;
                l * self.expected_from(*left) + r * self.expected_from(*right)
            }
        }
    }

    fn validate(&self, tree_index: usize, num_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err(format!("tree {} has no nodes", tree_index));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !(cover.is_finite() && cover > 0.0) {
                return Err(format!(
                    "tree {} node {} must have a positive cover, got {}",
                    tree_index, i, cover
                ));
            }
            match node {
                Node::Leaf { value, .. } if !value.is_finite() => {
                    return Err(format!("tree {} leaf {} has a non-finite value", tree_index, i));
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= num_features {
                        return Err(format!(
                            "tree {} node {} splits on feature {} but the preprocessor yields {}",
                            tree_index, i, feature, num_features
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("tree {} node {} has a NaN threshold", tree_index, i));
                    }
                    // children after parents rules out cycles
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!(
                                "tree {} node {} has invalid child index {}",
                                tree_index, i, child
                            ));
                        }
                    }
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EnsembleDef {
    #[serde(default)]
    objective: Objective,
    #[serde(default)]
    base_score: f64,
    #[serde(default)]
    split_rule: SplitRule,
    trees: Vec<Tree>,
}

/// Binary tree-ensemble classifier
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    objective: Objective,
    base_score: f64,
    split_rule: SplitRule,
    trees: Vec<Tree>,
    num_features: usize,
}

impl TreeEnsemble {
    pub fn new(
        objective: Objective,
        base_score: f64,
        split_rule: SplitRule,
        trees: Vec<Tree>,
        num_features: usize,
    ) -> Result<Self, LoadError> {
        if trees.is_empty() {
            return Err(LoadError::InvalidArtifact("ensemble has no trees".to_string()));
        }
        if !base_score.is_finite() {
            return Err(LoadError::InvalidArtifact("base_score must be finite".to_string()));
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(i, num_features)
                .map_err(LoadError::InvalidArtifact)?;
        }
        Ok(Self {
            objective,
            base_score,
            split_rule,
            trees,
            num_features,
        })
    }

    pub(crate) fn from_def(def: EnsembleDef, num_features: usize) -> Result<Self, LoadError> {
        Self::new(
            def.objective,
            def.base_score,
            def.split_rule,
            def.trees,
            num_features,
        )
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Raw ensemble output: log-odds for logistic ensembles, the averaged
    /// probability otherwise
    pub fn raw_output(&self, x: &[f64]) -> f64 {
        let sum: f64 = self
            .trees
            .iter()
            .map(|t| t.predict(x, self.split_rule))
            .sum();
        match self.objective {
            Objective::BinaryLogistic => self.base_score + sum,
            Objective::ProbabilityAverage => sum / self.trees.len() as f64,
        }
    }
}

impl Classifier for TreeEnsemble {
    fn predict_proba(&self, x: &[f64]) -> [f64; 2] {
        let raw = self.raw_output(x);
        let p = match self.objective {
            Objective::BinaryLogistic => sigmoid(raw),
            Objective::ProbabilityAverage => raw.clamp(0.0, 1.0),
        };
        [1.0 - p, p]
    }

    fn shap_values(&self, x: &[f64]) -> Attribution {
        let mut values = vec![0.0; self.num_features];
        for tree in &self.trees {
            shap::tree_shap(tree, x, self.split_rule, &mut values);
        }
        let expected: f64 = self.trees.iter().map(Tree::expected_value).sum();

        match self.objective {
            Objective::BinaryLogistic => Attribution {
                base_value: self.base_score + expected,
                values,
            },
            Objective::ProbabilityAverage => {
                let n = self.trees.len() as f64;
                values.iter_mut().for_each(|v| *v /= n);
                Attribution {
                    base_value: expected / n,
                    values,
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("{:?} ensemble of {} trees", self.objective, self.trees.len())
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Serialized pipeline artifact
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PipelineArtifact {
    #[serde(default)]
    pub version: Option<String>,
    pub preprocessor: PreprocessorDef,
    pub model: EnsembleDef,
}

/// Fitted preprocessing stage followed by the classifier
pub struct Pipeline {
    version: String,
    preprocessor: Preprocessor,
    classifier: Box<dyn Classifier>,
}

impl Pipeline {
    pub fn new(
        version: impl Into<String>,
        preprocessor: Preprocessor,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            version: version.into(),
            preprocessor,
            classifier,
        }
    }

    pub(crate) fn from_artifact(
        artifact: PipelineArtifact,
        checksum: &str,
    ) -> Result<Self, LoadError> {
        let preprocessor = Preprocessor::from_def(artifact.preprocessor)?;
        let ensemble = TreeEnsemble::from_def(artifact.model, preprocessor.num_features())?;
        // unversioned artifacts are identified by their checksum prefix
        let version = artifact
            .version
            .unwrap_or_else(|| format!("sha256:{}", &checksum[..checksum.len().min(12)]));
        Ok(Self::new(version, preprocessor, Box::new(ensemble)))
    }

    /// Parse a pipeline from its JSON text
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let artifact: PipelineArtifact = serde_json::from_str(json)
            .map_err(|e| LoadError::InvalidArtifact(e.to_string()))?;
        let checksum = crate::artifact::compute_checksum(json.as_bytes());
        Self::from_artifact(artifact, &checksum)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn transform(&self, row: &FeatureRow) -> Result<Vec<f64>, ValidationError> {
        self.preprocessor.transform(row)
    }

    pub fn predict_proba(&self, row: &FeatureRow) -> Result<[f64; 2], ValidationError> {
        let x = self.transform(row)?;
        Ok(self.classifier.predict_proba(&x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f64, cover: f64) -> Node {
        Node::Leaf { value, cover }
    }

    fn split(feature: usize, threshold: f64, left: usize, right: usize, cover: f64) -> Node {
        Node::Split {
            feature,
            threshold,
            left,
            right,
            default_left: true,
            cover,
        }
    }

    fn stump() -> Tree {
        Tree::new(vec![split(0, 0.5, 1, 2, 10.0), leaf(-1.0, 6.0), leaf(1.0, 4.0)])
    }

    #[test]
    fn test_tree_routing() {
        let tree = stump();
        assert_eq!(tree.predict(&[0.0], SplitRule::LessThan), -1.0);
        assert_eq!(tree.predict(&[0.5], SplitRule::LessThan), 1.0);
        assert_eq!(tree.predict(&[0.5], SplitRule::LessOrEqual), -1.0);
        // missing values follow the default branch
        assert_eq!(tree.predict(&[f64::NAN], SplitRule::LessThan), -1.0);
    }

    #[test]
    fn test_expected_value() {
        let ev = stump().expected_value();
        assert!((ev - (-0.6 + 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_probabilities() {
        let ensemble =
            TreeEnsemble::new(Objective::BinaryLogistic, 0.0, SplitRule::LessThan, vec![stump()], 1)
                .unwrap();
        let [no_delay, delay] = ensemble.predict_proba(&[1.0]);
        assert!((delay - sigmoid(1.0)).abs() < 1e-12);
        assert!((no_delay + delay - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_probability_average() {
        let trees = vec![
            Tree::new(vec![leaf(0.2, 1.0)]),
            Tree::new(vec![split(0, 0.5, 1, 2, 10.0), leaf(0.4, 5.0), leaf(0.8, 5.0)]),
        ];
        let ensemble =
            TreeEnsemble::new(Objective::ProbabilityAverage, 0.0, SplitRule::LessThan, trees, 1)
                .unwrap();
        let [_, delay] = ensemble.predict_proba(&[1.0]);
        assert!((delay - 0.5).abs() < 1e-12);

        let attribution = ensemble.shap_values(&[1.0]);
        assert!((attribution.output() - 0.5).abs() < 1e-12);
        assert!((attribution.base_value - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range_feature() {
        let err = TreeEnsemble::new(
            Objective::BinaryLogistic,
            0.0,
            SplitRule::LessThan,
            vec![stump()],
            0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("feature 0"));
    }

    #[test]
    fn test_rejects_backward_child() {
        let tree = Tree::new(vec![split(0, 0.5, 0, 1, 10.0), leaf(1.0, 5.0)]);
        let err =
            TreeEnsemble::new(Objective::BinaryLogistic, 0.0, SplitRule::LessThan, vec![tree], 1)
                .unwrap_err();
        assert!(matches!(err, LoadError::InvalidArtifact(_)));
    }

    #[test]
    fn test_rejects_empty_ensemble_and_zero_cover() {
        assert!(
            TreeEnsemble::new(Objective::BinaryLogistic, 0.0, SplitRule::LessThan, vec![], 1)
                .is_err()
        );
        let tree = Tree::new(vec![split(0, 0.5, 1, 2, 10.0), leaf(1.0, 0.0), leaf(2.0, 10.0)]);
        assert!(
            TreeEnsemble::new(Objective::BinaryLogistic, 0.0, SplitRule::LessThan, vec![tree], 1)
                .is_err()
        );
    }

    #[test]
    fn test_node_json_shapes() {
        let tree: Tree = serde_json::from_str(
            r#"{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 1, "right": 2, "cover": 10.0},
                {"value": -0.2, "cover": 6.0},
                {"value": 0.4, "cover": 4.0}
            ]}"#,
        )
        .unwrap();
        assert_eq!(tree.nodes().len(), 3);
        assert!(matches!(
            tree.nodes()[0],
            Node::Split {
                default_left: false,
                ..
            }
        ));
        assert!(matches!(tree.nodes()[2], Node::Leaf { value, .. } if value == 0.4));
    }
}
