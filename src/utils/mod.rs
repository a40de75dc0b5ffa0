// Utils

pub mod prometheus_metrics;
pub mod utils;

pub use utils::setup_prometheus_metrics;
