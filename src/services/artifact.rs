//! Trained model artifacts.
//!
//! Artifacts are JSON documents. Each one declares its ordered input schema
//! (`feature_names`) and a model body:
//!
//! - `tree_ensemble`: gradient-boosted trees in the XGBoost JSON dump layout
//!   (`nodeid`, `split`, `split_condition`, `yes`, `no`, `missing`,
//!   `children` for split nodes; `nodeid`, `leaf` for leaves). Splits name
//!   their feature, so the dump can be used unchanged.
//! - `linear`: an intercept plus one weight per declared feature.
//!
//! Classifier artifacts also carry `classes`, the index → label table. Tree
//! classifiers lay their trees out round-robin per class (tree `i` belongs to
//! class `i % classes.len()`); with exactly two classes a single margin is
//! used and class 1 wins when it is positive. Margins and `base_score` are
//! in raw (untransformed) space.
//!
//! Trees are compiled into flat node arrays on load so inference is a loop
//! over indices with no allocation.

use serde::Deserialize;
use thiserror::Error;

use super::features::FeatureRow;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("IO error reading artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid artifact: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Serialized layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TreeNodeDoc {
    Leaf {
        nodeid: u32,
        leaf: f64,
    },
    Split {
        nodeid: u32,
        split: String,
        split_condition: f64,
        yes: u32,
        no: u32,
        missing: u32,
        children: Vec<TreeNodeDoc>,
    },
}

impl TreeNodeDoc {
    fn nodeid(&self) -> u32 {
        match self {
            TreeNodeDoc::Leaf { nodeid, .. } | TreeNodeDoc::Split { nodeid, .. } => *nodeid,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeEnsembleDoc {
    #[serde(default)]
    base_score: f64,
    trees: Vec<TreeNodeDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RegressorModelDoc {
    TreeEnsemble(TreeEnsembleDoc),
    Linear { intercept: f64, weights: Vec<f64> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClassifierModelDoc {
    TreeEnsemble(TreeEnsembleDoc),
    Linear {
        intercepts: Vec<f64>,
        weights: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Deserialize)]
struct RegressorDoc {
    feature_names: Vec<String>,
    model: RegressorModelDoc,
}

#[derive(Debug, Deserialize)]
struct ClassifierDoc {
    feature_names: Vec<String>,
    classes: Vec<String>,
    model: ClassifierModelDoc,
}

// ---------------------------------------------------------------------------
// Compiled trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing: usize,
    },
}

/// A single regression tree. Child indices always point further into `nodes`,
/// so evaluation terminates.
#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn compile(root: &TreeNodeDoc, feature_names: &[String]) -> Result<Self, ArtifactError> {
        let mut nodes = Vec::new();
        compile_node(root, feature_names, &mut nodes)?;
        Ok(Self { nodes })
    }

    fn evaluate(&self, row: &FeatureRow) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    index = match row.get(*feature) {
                        Some(v) if v.is_nan() => *missing,
                        Some(v) if v < *threshold => *yes,
                        Some(_) => *no,
                        None => *missing,
                    };
                }
            }
        }
    }
}

/// Flatten `doc` depth-first into `nodes`, returning its index.
fn compile_node(
    doc: &TreeNodeDoc,
    feature_names: &[String],
    nodes: &mut Vec<Node>,
) -> Result<usize, ArtifactError> {
    let index = nodes.len();
    match doc {
        TreeNodeDoc::Leaf { leaf, .. } => {
            nodes.push(Node::Leaf(*leaf));
        }
        TreeNodeDoc::Split {
            nodeid,
            split,
            split_condition,
            yes,
            no,
            missing,
            children,
        } => {
            let feature = feature_names
                .iter()
                .position(|name| name == split)
                .ok_or_else(|| {
                    ArtifactError::Invalid(format!(
                        "node {nodeid} splits on undeclared feature '{split}'"
                    ))
                })?;

            // Placeholder, patched once the children have indices.
            nodes.push(Node::Leaf(0.0));

            let mut child_indices = Vec::with_capacity(children.len());
            for child in children {
                let child_index = compile_node(child, feature_names, nodes)?;
                child_indices.push((child.nodeid(), child_index));
            }

            let resolve = |target: u32| {
                child_indices
                    .iter()
                    .find(|(id, _)| *id == target)
                    .map(|(_, idx)| *idx)
                    .ok_or_else(|| {
                        ArtifactError::Invalid(format!(
                            "node {nodeid} references missing child {target}"
                        ))
                    })
            };

            nodes[index] = Node::Split {
                feature,
                threshold: *split_condition,
                yes: resolve(*yes)?,
                no: resolve(*no)?,
                missing: resolve(*missing)?,
            };
        }
    }
    Ok(index)
}

#[derive(Debug, Clone, PartialEq)]
struct TreeEnsemble {
    base_score: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    fn compile(doc: &TreeEnsembleDoc, feature_names: &[String]) -> Result<Self, ArtifactError> {
        let trees = doc
            .trees
            .iter()
            .map(|t| Tree::compile(t, feature_names))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            base_score: doc.base_score,
            trees,
        })
    }

    /// Raw margins for `groups` interleaved outputs.
    fn margins(&self, row: &FeatureRow, groups: usize) -> Vec<f64> {
        let mut margins = vec![self.base_score; groups];
        for (i, tree) in self.trees.iter().enumerate() {
            margins[i % groups] += tree.evaluate(row);
        }
        margins
    }
}

/// Dot product over the features that are present; missing ones contribute 0.
fn linear_margin(intercept: f64, weights: &[f64], row: &FeatureRow) -> f64 {
    weights
        .iter()
        .enumerate()
        .filter_map(|(i, w)| row.get(i).map(|x| w * x))
        .fold(intercept, |acc, term| acc + term)
}

fn check_weights(weights: &[f64], feature_names: &[String]) -> Result<(), ArtifactError> {
    if weights.len() != feature_names.len() {
        return Err(ArtifactError::Invalid(format!(
            "{} weights for {} features",
            weights.len(),
            feature_names.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Regressor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum RegressorModel {
    TreeEnsemble(TreeEnsemble),
    Linear { intercept: f64, weights: Vec<f64> },
}

/// A trained single-output regressor.
#[derive(Debug, Clone, PartialEq)]
pub struct Regressor {
    feature_names: Vec<String>,
    model: RegressorModel,
}

impl Regressor {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let doc: RegressorDoc = serde_json::from_slice(bytes)?;
        let model = match doc.model {
            RegressorModelDoc::TreeEnsemble(ensemble) => {
                RegressorModel::TreeEnsemble(TreeEnsemble::compile(&ensemble, &doc.feature_names)?)
            }
            RegressorModelDoc::Linear { intercept, weights } => {
                check_weights(&weights, &doc.feature_names)?;
                RegressorModel::Linear { intercept, weights }
            }
        };
        Ok(Self {
            feature_names: doc.feature_names,
            model,
        })
    }

    /// Declared input schema, in order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        match &self.model {
            RegressorModel::TreeEnsemble(ensemble) => ensemble.margins(row, 1)[0],
            RegressorModel::Linear { intercept, weights } => {
                linear_margin(*intercept, weights, row)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum ClassifierModel {
    TreeEnsemble(TreeEnsemble),
    Linear {
        intercepts: Vec<f64>,
        weights: Vec<Vec<f64>>,
    },
}

/// A trained multi-class classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    feature_names: Vec<String>,
    classes: Vec<String>,
    model: ClassifierModel,
}

impl Classifier {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let doc: ClassifierDoc = serde_json::from_slice(bytes)?;
        if doc.classes.is_empty() {
            return Err(ArtifactError::Invalid("classifier has no classes".into()));
        }

        let model = match doc.model {
            ClassifierModelDoc::TreeEnsemble(ensemble) => {
                let groups = tree_groups(doc.classes.len());
                if ensemble.trees.len() % groups != 0 {
                    return Err(ArtifactError::Invalid(format!(
                        "{} trees cannot be split across {} classes",
                        ensemble.trees.len(),
                        groups
                    )));
                }
                ClassifierModel::TreeEnsemble(TreeEnsemble::compile(
                    &ensemble,
                    &doc.feature_names,
                )?)
            }
            ClassifierModelDoc::Linear {
                intercepts,
                weights,
            } => {
                if intercepts.len() != doc.classes.len() || weights.len() != doc.classes.len() {
                    return Err(ArtifactError::Invalid(format!(
                        "linear classifier needs one intercept and weight row per class ({})",
                        doc.classes.len()
                    )));
                }
                for row in &weights {
                    check_weights(row, &doc.feature_names)?;
                }
                ClassifierModel::Linear {
                    intercepts,
                    weights,
                }
            }
        };

        Ok(Self {
            feature_names: doc.feature_names,
            classes: doc.classes,
            model,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Index of the winning class. Ties go to the lowest index.
    pub fn predict_index(&self, row: &FeatureRow) -> usize {
        match &self.model {
            ClassifierModel::TreeEnsemble(ensemble) => {
                let groups = tree_groups(self.classes.len());
                let margins = ensemble.margins(row, groups);
                if self.classes.len() == 2 {
                    usize::from(margins[0] > 0.0)
                } else {
                    argmax(&margins)
                }
            }
            ClassifierModel::Linear {
                intercepts,
                weights,
            } => {
                let margins: Vec<f64> = intercepts
                    .iter()
                    .zip(weights)
                    .map(|(b, w)| linear_margin(*b, w, row))
                    .collect();
                argmax(&margins)
            }
        }
    }

    pub fn predict_label(&self, row: &FeatureRow) -> &str {
        &self.classes[self.predict_index(row)]
    }
}

/// Binary classifiers use a single margin; multi-class use one per class.
fn tree_groups(classes: usize) -> usize {
    if classes <= 2 {
        1
    } else {
        classes
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(schema: &[&str], values: &[(&str, f64)]) -> FeatureRow {
        let schema: Vec<String> = schema.iter().map(|s| s.to_string()).collect();
        FeatureRow::project(&schema, |name| {
            values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
        })
    }

    fn stump(feature: &str, threshold: f64, left: f64, right: f64) -> serde_json::Value {
        json!({
            "nodeid": 0, "depth": 0, "split": feature, "split_condition": threshold,
            "yes": 1, "no": 2, "missing": 1,
            "children": [
                { "nodeid": 1, "leaf": left },
                { "nodeid": 2, "leaf": right }
            ]
        })
    }

    #[test]
    fn test_tree_regressor_sums_trees_and_base_score() {
        let doc = json!({
            "feature_names": ["lat", "lon", "sin_day", "cos_day"],
            "model": {
                "type": "tree_ensemble",
                "base_score": 20.0,
                "trees": [stump("lat", 30.0, 5.0, -5.0), stump("sin_day", 0.0, -1.0, 1.0)]
            }
        });
        let reg = Regressor::from_json(doc.to_string().as_bytes()).unwrap();
        let schema = ["lat", "lon", "sin_day", "cos_day"];

        let warm = row(&schema, &[("lat", 25.0), ("sin_day", 0.5)]);
        assert_eq!(reg.predict(&warm), 26.0);

        let cold = row(&schema, &[("lat", 45.0), ("sin_day", -0.5)]);
        assert_eq!(reg.predict(&cold), 14.0);
    }

    #[test]
    fn test_missing_feature_takes_missing_branch() {
        let doc = json!({
            "feature_names": ["lat"],
            "model": { "type": "tree_ensemble", "trees": [
                {
                    "nodeid": 0, "split": "lat", "split_condition": 0.0,
                    "yes": 1, "no": 2, "missing": 2,
                    "children": [ { "nodeid": 1, "leaf": 1.0 }, { "nodeid": 2, "leaf": 2.0 } ]
                }
            ]}
        });
        let reg = Regressor::from_json(doc.to_string().as_bytes()).unwrap();
        assert_eq!(reg.predict(&row(&["lat"], &[])), 2.0);
        assert_eq!(reg.predict(&row(&["lat"], &[("lat", f64::NAN)])), 2.0);
        assert_eq!(reg.predict(&row(&["lat"], &[("lat", -1.0)])), 1.0);
    }

    #[test]
    fn test_nested_tree_compiles_depth_first() {
        let doc = json!({
            "feature_names": ["lat", "lon"],
            "model": { "type": "tree_ensemble", "trees": [
                {
                    "nodeid": 0, "split": "lat", "split_condition": 0.0,
                    "yes": 1, "no": 2, "missing": 1,
                    "children": [
                        {
                            "nodeid": 1, "split": "lon", "split_condition": 0.0,
                            "yes": 3, "no": 4, "missing": 3,
                            "children": [ { "nodeid": 3, "leaf": 1.0 }, { "nodeid": 4, "leaf": 2.0 } ]
                        },
                        { "nodeid": 2, "leaf": 3.0 }
                    ]
                }
            ]}
        });
        let reg = Regressor::from_json(doc.to_string().as_bytes()).unwrap();
        let schema = ["lat", "lon"];
        assert_eq!(reg.predict(&row(&schema, &[("lat", -1.0), ("lon", -1.0)])), 1.0);
        assert_eq!(reg.predict(&row(&schema, &[("lat", -1.0), ("lon", 1.0)])), 2.0);
        assert_eq!(reg.predict(&row(&schema, &[("lat", 1.0), ("lon", -1.0)])), 3.0);
    }

    #[test]
    fn test_split_on_undeclared_feature_is_invalid() {
        let doc = json!({
            "feature_names": ["lat"],
            "model": { "type": "tree_ensemble", "trees": [stump("elevation", 1.0, 0.0, 1.0)] }
        });
        let err = Regressor::from_json(doc.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid(_)));
    }

    #[test]
    fn test_dangling_child_reference_is_invalid() {
        let doc = json!({
            "feature_names": ["lat"],
            "model": { "type": "tree_ensemble", "trees": [
                {
                    "nodeid": 0, "split": "lat", "split_condition": 0.0,
                    "yes": 1, "no": 7, "missing": 1,
                    "children": [ { "nodeid": 1, "leaf": 1.0 }, { "nodeid": 2, "leaf": 2.0 } ]
                }
            ]}
        });
        let err = Regressor::from_json(doc.to_string().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing child 7"));
    }

    #[test]
    fn test_linear_regressor() {
        let doc = json!({
            "feature_names": ["lat", "lon"],
            "model": { "type": "linear", "intercept": 1.0, "weights": [2.0, -1.0] }
        });
        let reg = Regressor::from_json(doc.to_string().as_bytes()).unwrap();
        assert_eq!(reg.feature_names(), &["lat".to_string(), "lon".to_string()]);
        assert_eq!(reg.predict(&row(&["lat", "lon"], &[("lat", 3.0), ("lon", 4.0)])), 3.0);
        // missing lon contributes nothing
        assert_eq!(reg.predict(&row(&["lat", "lon"], &[("lat", 3.0)])), 7.0);
    }

    #[test]
    fn test_linear_weight_count_must_match_schema() {
        let doc = json!({
            "feature_names": ["lat", "lon"],
            "model": { "type": "linear", "intercept": 1.0, "weights": [2.0] }
        });
        assert!(matches!(
            Regressor::from_json(doc.to_string().as_bytes()),
            Err(ArtifactError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            Regressor::from_json(b"not json"),
            Err(ArtifactError::Parse(_))
        ));
    }

    #[test]
    fn test_multiclass_trees_are_round_robin() {
        // Three classes, one round: tree i scores class i.
        let doc = json!({
            "feature_names": ["temperature_surface"],
            "classes": ["Snow", "Clear", "Heat"],
            "model": { "type": "tree_ensemble", "base_score": 0.5, "trees": [
                stump("temperature_surface", 0.0, 2.0, -2.0),
                stump("temperature_surface", 32.0, 1.0, -1.0),
                stump("temperature_surface", 32.0, -2.0, 2.0)
            ]}
        });
        let clf = Classifier::from_json(doc.to_string().as_bytes()).unwrap();
        let schema = ["temperature_surface"];
        assert_eq!(clf.predict_label(&row(&schema, &[("temperature_surface", -5.0)])), "Snow");
        assert_eq!(clf.predict_label(&row(&schema, &[("temperature_surface", 20.0)])), "Clear");
        assert_eq!(clf.predict_label(&row(&schema, &[("temperature_surface", 35.0)])), "Heat");
    }

    #[test]
    fn test_binary_classifier_uses_margin_sign() {
        let doc = json!({
            "feature_names": ["cloud_area"],
            "classes": ["Clear", "Cloudy"],
            "model": { "type": "tree_ensemble", "trees": [stump("cloud_area", 0.8, -1.0, 1.0)] }
        });
        let clf = Classifier::from_json(doc.to_string().as_bytes()).unwrap();
        assert_eq!(clf.predict_index(&row(&["cloud_area"], &[("cloud_area", 0.2)])), 0);
        assert_eq!(clf.predict_index(&row(&["cloud_area"], &[("cloud_area", 0.9)])), 1);
    }

    #[test]
    fn test_tree_count_must_divide_into_classes() {
        let doc = json!({
            "feature_names": ["lat"],
            "classes": ["A", "B", "C"],
            "model": { "type": "tree_ensemble", "trees": [stump("lat", 0.0, 1.0, 2.0)] }
        });
        assert!(matches!(
            Classifier::from_json(doc.to_string().as_bytes()),
            Err(ArtifactError::Invalid(_))
        ));
    }

    #[test]
    fn test_linear_classifier_argmax_ties_go_low() {
        let doc = json!({
            "feature_names": ["lat"],
            "classes": ["A", "B", "C"],
            "model": {
                "type": "linear",
                "intercepts": [0.0, 1.0, 1.0],
                "weights": [[1.0], [0.0], [0.0]]
            }
        });
        let clf = Classifier::from_json(doc.to_string().as_bytes()).unwrap();
        assert_eq!(clf.classes().len(), 3);
        assert_eq!(clf.predict_label(&row(&["lat"], &[("lat", 0.0)])), "B");
        assert_eq!(clf.predict_label(&row(&["lat"], &[("lat", 5.0)])), "A");
    }

    #[test]
    fn test_classifier_without_classes_is_invalid() {
        let doc = json!({
            "feature_names": ["lat"],
            "classes": [],
            "model": { "type": "linear", "intercepts": [], "weights": [] }
        });
        assert!(matches!(
            Classifier::from_json(doc.to_string().as_bytes()),
            Err(ArtifactError::Invalid(_))
        ));
    }
}
