//! Registry of the physical variables the regressors predict, and where each
//! one lands in the stored forecast.

use crate::db::models::Field;

/// Variable whose prediction seeds the derived temperature columns.
pub const BASE_TEMPERATURE_VARIABLE: &str = "temperature_surface";

/// Artifact name of the condition classifier.
pub const CONDITION_CLASSIFIER: &str = "condition_classifier";

/// One regressor output and its destination column, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalVariable {
    pub name: &'static str,
    pub destination: Option<Field>,
}

const fn var(name: &'static str, destination: Field) -> PhysicalVariable {
    PhysicalVariable {
        name,
        destination: Some(destination),
    }
}

/// All predicted variables, in training order.
pub const PHYSICAL_VARIABLES: [PhysicalVariable; 18] = [
    var("CO_surface_conc", Field::CoSurfaceConc),
    var("precipitation", Field::PrecipitationProb),
    var("total_precip_rate", Field::TotalPrecipRate),
    var("specific_humidity", Field::SpecificHumidityPred),
    var(BASE_TEMPERATURE_VARIABLE, Field::CurrentTemp),
    var("skin_temperature", Field::SkinTemperature),
    var("wind_speed_10m", Field::WindSpeed),
    var("avg_wind_speed_10m", Field::AvgWindSpeed10m),
    var("surface_pressure", Field::SurfacePressurePred),
    var("cloud_area", Field::CloudAreaPred),
    var("frozen_precip", Field::FrozenPrecip),
    var("snowfall", Field::SnowfallPred),
    var("uv_index", Field::UvIndex),
    var("dust_concentration", Field::DustConcentration),
    var("SO2_concentration", Field::So2Concentration),
    var("NO2_concentration", Field::No2Concentration),
    var("O3_concentration", Field::O3Concentration),
    var("potential_vorticity", Field::PotentialVorticity),
];

pub fn variable_names() -> Vec<&'static str> {
    PHYSICAL_VARIABLES.iter().map(|v| v.name).collect()
}

/// File name of a variable's regressor artifact.
pub fn regressor_file_name(variable: &str) -> String {
    format!("{variable}_regressor.json")
}

/// File name of the classifier artifact.
pub fn classifier_file_name() -> String {
    format!("{CONDITION_CLASSIFIER}.json")
}
