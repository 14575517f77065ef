//! Per-variable regressor ensemble.

use std::collections::BTreeMap;

use super::features::{FeatureRow, FeatureVector};
use super::model_bank::ModelBank;

/// Variable name → predicted value. `None` means no model was available.
pub type VariablePredictions = BTreeMap<String, Option<f64>>;

/// Run every requested variable's regressor against `features`.
///
/// The result always has exactly one entry per requested variable. A variable
/// whose artifact is missing or unreadable, or whose model produces a
/// non-finite value, gets `None` rather than a number, since 0.0 is a
/// legitimate value for several variables (snowfall, UV).
pub async fn predict_variables(
    bank: &ModelBank,
    features: &FeatureVector,
    variables: &[&str],
) -> VariablePredictions {
    let models = futures::future::join_all(variables.iter().map(|v| bank.regressor(v))).await;

    variables
        .iter()
        .zip(models)
        .map(|(variable, model)| {
            let value = model
                .map(|regressor| {
                    let row =
                        FeatureRow::project(regressor.feature_names(), |name| features.get(name));
                    regressor.predict(&row)
                })
                .filter(|v| {
                    if !v.is_finite() {
                        tracing::warn!("Regressor for {} produced non-finite value {}", variable, v);
                    }
                    v.is_finite()
                });
            (variable.to_string(), value)
        })
        .collect()
}
