//! Model input encoding.
//!
//! Every artifact was trained on the same base inputs: coordinates plus the
//! day of year encoded on the unit circle so that Dec 31 and Jan 1 are close.

use std::f64::consts::PI;

/// Period used for the cyclic day encoding. Day 366 wraps to just past day 0.
const DAYS_PER_YEAR: f64 = 365.0;

pub const FEATURE_LAT: &str = "lat";
pub const FEATURE_LON: &str = "lon";
pub const FEATURE_SIN_DAY: &str = "sin_day";
pub const FEATURE_COS_DAY: &str = "cos_day";

/// Base model inputs for one (lat, lon, day-of-year) query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub lat: f64,
    pub lon: f64,
    pub sin_day: f64,
    pub cos_day: f64,
}

impl FeatureVector {
    /// `day_of_year` is 1-based.
    pub fn new(lat: f64, lon: f64, day_of_year: u32) -> Self {
        let angle = 2.0 * PI * f64::from(day_of_year) / DAYS_PER_YEAR;
        Self {
            lat,
            lon,
            sin_day: angle.sin(),
            cos_day: angle.cos(),
        }
    }

    /// Look up a base feature by its schema name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            FEATURE_LAT => Some(self.lat),
            FEATURE_LON => Some(self.lon),
            FEATURE_SIN_DAY => Some(self.sin_day),
            FEATURE_COS_DAY => Some(self.cos_day),
            _ => None,
        }
    }
}

/// Feature values projected onto one artifact's declared input schema.
///
/// `values[i]` belongs to the artifact's `feature_names[i]`; `None` marks a
/// feature the caller could not supply.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<Option<f64>>,
}

impl FeatureRow {
    /// Project named values onto `schema`, in schema order.
    ///
    /// Names the lookup cannot resolve become missing values; anything the
    /// lookup knows but the schema does not mention is dropped.
    pub fn project<F>(schema: &[String], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<f64>,
    {
        let values: Vec<Option<f64>> = schema.iter().map(|name| lookup(name.as_str())).collect();
        let missing: Vec<&str> = schema
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            tracing::debug!("Features unavailable for projection: {:?}", missing);
        }
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_encoding_quarter_year() {
        let fv = FeatureVector::new(0.0, 0.0, 0);
        assert_eq!(fv.sin_day, 0.0);
        assert_eq!(fv.cos_day, 1.0);

        // Day 91 sits just short of a quarter turn
        let quarter = FeatureVector::new(0.0, 0.0, 91);
        assert!(quarter.sin_day > 0.9999);
        assert!(quarter.cos_day > 0.0 && quarter.cos_day < 0.01);
    }

    #[test]
    fn test_day_encoding_is_unit_circle() {
        for day in [1, 120, 200, 365, 366] {
            let fv = FeatureVector::new(25.6866, -100.3161, day);
            let norm = fv.sin_day.powi(2) + fv.cos_day.powi(2);
            assert!((norm - 1.0).abs() < 1e-12, "day {day}: norm {norm}");
        }
    }

    #[test]
    fn test_day_365_wraps_to_start() {
        let fv = FeatureVector::new(0.0, 0.0, 365);
        assert!(fv.sin_day.abs() < 1e-12);
        assert!((fv.cos_day - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_get_by_name() {
        let fv = FeatureVector::new(25.6866, -100.3161, 120);
        assert_eq!(fv.get("lat"), Some(25.6866));
        assert_eq!(fv.get("lon"), Some(-100.3161));
        assert_eq!(fv.get("sin_day"), Some(fv.sin_day));
        assert_eq!(fv.get("elevation"), None);
    }

    #[test]
    fn test_project_follows_schema_order() {
        let fv = FeatureVector::new(10.0, 20.0, 120);
        let schema = vec!["lon".to_string(), "lat".to_string()];
        let row = FeatureRow::project(&schema, |name| fv.get(name));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(20.0));
        assert_eq!(row.get(1), Some(10.0));
    }

    #[test]
    fn test_project_marks_unknown_features_missing() {
        let fv = FeatureVector::new(10.0, 20.0, 120);
        let schema = vec!["lat".to_string(), "elevation".to_string()];
        let row = FeatureRow::project(&schema, |name| fv.get(name));
        assert_eq!(row.get(0), Some(10.0));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(7), None);
    }
}
