pub mod allocations_handler;
pub mod health;
pub mod metrics;
pub mod projects_handler;
pub mod query;
pub mod utilization_handler;

pub use health::health_check;
pub use metrics::{metrics_handler, setup_metrics_recorder, MetricsState};
