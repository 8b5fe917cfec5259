pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod openapi;
pub mod repository;
pub mod startup;

use std::sync::Arc;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use handlers::MetricsState;

use engine::{AllocationManager, UtilizationAggregator};
use repository::AllocationRepository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn AllocationRepository>,
    pub manager: Arc<AllocationManager>,
    pub aggregator: UtilizationAggregator,
    pub config: AppConfig,
    pub metrics: Arc<MetricsState>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn AllocationRepository>,
        config: AppConfig,
        metrics: Arc<MetricsState>,
    ) -> Self {
        Self {
            manager: Arc::new(AllocationManager::new(repo.clone())),
            aggregator: UtilizationAggregator::new(repo.clone()),
            repo,
            config,
            metrics,
        }
    }
}
