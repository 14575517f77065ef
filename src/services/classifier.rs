//! Weather condition classification.

use super::ensemble::VariablePredictions;
use super::features::{FeatureRow, FeatureVector};
use super::model_bank::ModelBank;

/// Label used when no classifier is deployed.
pub const NOT_CLASSIFIED: &str = "Not Classified";

/// Classify the weather condition from the regressor outputs and base features.
///
/// The classifier sees the union of both, projected by name onto its declared
/// schema. Variables without a prediction are passed as missing values.
pub async fn classify(
    bank: &ModelBank,
    features: &FeatureVector,
    predictions: &VariablePredictions,
) -> String {
    let Some(classifier) = bank.classifier().await else {
        return NOT_CLASSIFIED.to_string();
    };

    let row = FeatureRow::project(classifier.feature_names(), |name| {
        features
            .get(name)
            .or_else(|| predictions.get(name).copied().flatten())
    });
    classifier.predict_label(&row).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model_bank::test_support::write_classifier;
    use serde_json::json;

    fn predictions(values: &[(&str, Option<f64>)]) -> VariablePredictions {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_classifier_is_not_classified() {
        let dir = tempfile::tempdir().unwrap();
        let bank = ModelBank::new(dir.path());
        let label = classify(&bank, &FeatureVector::new(0.0, 0.0, 1), &predictions(&[])).await;
        assert_eq!(label, NOT_CLASSIFIED);
    }

    #[tokio::test]
    async fn test_classifier_uses_regressor_outputs_and_base_features() {
        let dir = tempfile::tempdir().unwrap();
        // Declared order differs from anything the pipeline produces.
        write_classifier(
            dir.path(),
            json!({
                "feature_names": ["temperature_surface", "lat"],
                "classes": ["Clear", "Heat", "Snow"],
                "model": {
                    "type": "linear",
                    "intercepts": [0.0, -32.0, 0.0],
                    "weights": [[0.0, 0.0], [1.0, 0.0], [-1.0, 0.0]]
                }
            }),
        );
        let bank = ModelBank::new(dir.path());
        let features = FeatureVector::new(25.0, -100.0, 120);

        let hot = predictions(&[("temperature_surface", Some(40.0)), ("snowfall", Some(0.0))]);
        assert_eq!(classify(&bank, &features, &hot).await, "Heat");

        let cold = predictions(&[("temperature_surface", Some(-5.0))]);
        assert_eq!(classify(&bank, &features, &cold).await, "Snow");
    }

    #[tokio::test]
    async fn test_unavailable_variable_is_missing_not_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_classifier(
            dir.path(),
            json!({
                "feature_names": ["snowfall"],
                "classes": ["Dry", "Snow"],
                "model": { "type": "tree_ensemble", "trees": [
                    {
                        "nodeid": 0, "split": "snowfall", "split_condition": 1.0,
                        "yes": 1, "no": 2, "missing": 2,
                        "children": [ { "nodeid": 1, "leaf": -1.0 }, { "nodeid": 2, "leaf": 1.0 } ]
                    }
                ]}
            }),
        );
        let bank = ModelBank::new(dir.path());
        let features = FeatureVector::new(0.0, 0.0, 1);

        let zero = predictions(&[("snowfall", Some(0.0))]);
        assert_eq!(classify(&bank, &features, &zero).await, "Dry");

        // A missing model follows the tree's missing branch instead of reading 0.0.
        let absent = predictions(&[("snowfall", None)]);
        assert_eq!(classify(&bank, &features, &absent).await, "Snow");
    }
}
