pub mod algorithms;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

use services::dataset::{source_from_config, DatasetService, RatingSource};
use services::recommendation::RecommendationService;
use services::training::Predictor;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dataset: Arc<DatasetService>,
    pub predictor: Arc<Predictor>,
    pub recommendation_service: Arc<RecommendationService>,
}

impl AppState {
    /// Builds the state on the data source named in `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let source = source_from_config(&config.data).await?;
        Self::with_source(config, source).await
    }

    /// Loads the first snapshot from `source`, and trains once if configured to.
    pub async fn with_source(config: Config, source: Arc<dyn RatingSource>) -> Result<Self> {
        let config = Arc::new(config);

        let dataset = Arc::new(DatasetService::new(source));
        dataset.reload().await?;

        let predictor = Arc::new(Predictor::new(dataset.clone(), &config));

        let recommendation_service = Arc::new(RecommendationService::new(
            predictor.clone(),
            config.recommendation.clone(),
        ));

        if config.training.train_on_startup {
            info!("Training model on startup");
            predictor.train().await?;
        }

        Ok(Self {
            config,
            dataset,
            predictor,
            recommendation_service,
        })
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
