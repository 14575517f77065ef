pub mod artifact;
pub mod classifier;
pub mod ensemble;
pub mod features;
pub mod forecast;
pub mod locations;
pub mod model_bank;
pub mod prediction;
pub mod reconcile;
pub mod refresher;
pub mod seed;
pub mod variables;
