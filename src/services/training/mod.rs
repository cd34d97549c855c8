use crate::algorithms::{FunkSvd, RatingPredictor, SvdParams, TrainedModel};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::*;
use crate::services::dataset::{DatasetService, Snapshot};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// A fitted model as published to readers.
#[derive(Debug)]
pub struct PublishedModel {
    pub model: TrainedModel,
    pub version: Uuid,
    pub generation: u64,
    pub trained_at: DateTime<Utc>,
}

impl RatingPredictor for PublishedModel {
    fn predict(&self, user_id: UserId, item_id: ItemId) -> f64 {
        self.model.predict(user_id, item_id)
    }
}

/// Owns the process-wide model.
///
/// Readers take the current `Arc` under a short read lock and score against
/// that one snapshot. Trainers are serialized by `train_lock`; each fits
/// outside the model lock and publishes with a single pointer swap.
pub struct Predictor {
    dataset: Arc<DatasetService>,
    svd: FunkSvd,
    current: RwLock<Option<Arc<PublishedModel>>>,
    train_lock: Mutex<()>,
}

impl Predictor {
    pub fn new(dataset: Arc<DatasetService>, config: &Config) -> Self {
        Self::with_params(dataset, SvdParams::from(&config.training))
    }

    pub fn with_params(dataset: Arc<DatasetService>, params: SvdParams) -> Self {
        Self {
            dataset,
            svd: FunkSvd::new(params),
            current: RwLock::new(None),
            train_lock: Mutex::new(()),
        }
    }

    /// Loads a fresh snapshot, fits a new model on all of it and publishes both.
    ///
    /// On failure the current model and snapshot stay as they were.
    pub async fn train(&self) -> Result<TrainSummary> {
        let _guard = self.train_lock.lock().await;
        let started = Instant::now();

        let snapshot = self.dataset.load().await?;
        let svd = self.svd.clone();
        let fit_snapshot = snapshot.clone();
        let (model, train_rmse) = tokio::task::spawn_blocking(move || -> Result<(TrainedModel, f64)> {
            let model = svd.fit(fit_snapshot.ratings())?;
            let rmse = model.rmse(fit_snapshot.ratings());
            Ok((model, rmse))
        })
        .await??;

        let num_users = model.num_users();
        let num_items = model.num_items();
        let published = self.publish(model, snapshot.clone());

        info!(
            model_version = %published.version,
            generation = published.generation,
            num_users,
            num_items,
            num_ratings = snapshot.ratings().len(),
            train_rmse,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model trained and published"
        );

        Ok(TrainSummary {
            message: "Model trained successfully".to_string(),
            model_version: published.version,
            generation: published.generation,
            trained_at: published.trained_at,
            num_users,
            num_items,
            num_ratings: snapshot.ratings().len(),
            train_rmse,
        })
    }

    /// Swaps in the model together with the snapshot it was fitted on.
    fn publish(&self, model: TrainedModel, snapshot: Arc<Snapshot>) -> Arc<PublishedModel> {
        let mut current = self.current.write();
        self.dataset.publish(snapshot);
        let generation = current.as_ref().map_or(1, |m| m.generation + 1);
        let published = Arc::new(PublishedModel {
            model,
            version: Uuid::new_v4(),
            generation,
            trained_at: Utc::now(),
        });
        *current = Some(published.clone());
        published
    }

    /// The model every prediction in one request should use.
    pub fn snapshot(&self) -> Result<Arc<PublishedModel>> {
        self.current.read().clone().ok_or(Error::ModelNotTrained)
    }

    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> Result<f64> {
        Ok(self.snapshot()?.predict(user_id, item_id))
    }

    pub fn is_trained(&self) -> bool {
        self.current.read().is_some()
    }

    /// Generation of the current model, 0 before the first train.
    pub fn generation(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |m| m.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::StaticSource;

    fn predictor(ratings: Vec<Rating>) -> (StaticSource, Predictor) {
        let source = StaticSource::new(ratings, vec![]);
        let dataset = Arc::new(DatasetService::new(Arc::new(source.clone())));
        let predictor = Predictor::with_params(
            dataset,
            SvdParams {
                n_factors: 8,
                ..SvdParams::default()
            },
        );
        (source, predictor)
    }

    #[tokio::test]
    async fn test_predict_before_train_fails() {
        let (_, predictor) = predictor(vec![Rating::new(1, 1, 4.0, 0)]);
        assert!(!predictor.is_trained());
        assert_eq!(predictor.generation(), 0);
        assert!(matches!(predictor.predict(1, 1), Err(Error::ModelNotTrained)));
        assert!(matches!(predictor.snapshot(), Err(Error::ModelNotTrained)));
    }

    #[tokio::test]
    async fn test_train_publishes_new_generation() {
        let (_, predictor) = predictor(vec![Rating::new(1, 1, 4.0, 0), Rating::new(2, 1, 2.0, 0)]);
        let first = predictor.train().await.unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.num_ratings, 2);
        assert_eq!(first.num_users, 2);
        assert_eq!(predictor.dataset.current().info().num_ratings, 2);

        let second = predictor.train().await.unwrap();
        assert_eq!(second.generation, 2);
        assert_ne!(first.model_version, second.model_version);
        assert_eq!(predictor.generation(), 2);
    }

    #[tokio::test]
    async fn test_train_on_empty_snapshot_keeps_state() {
        let (_, predictor) = predictor(vec![]);
        assert!(matches!(predictor.train().await, Err(Error::InvalidInput(_))));
        assert!(!predictor.is_trained());
    }

    #[tokio::test]
    async fn test_failed_train_keeps_previous_snapshot() {
        let (source, predictor) = predictor(vec![
            Rating::new(1, 10, 5.0, 0),
            Rating::new(1, 20, 1.0, 0),
            Rating::new(2, 10, 3.0, 0),
        ]);
        predictor.train().await.unwrap();
        let before = predictor.dataset.current();

        source.replace_ratings(vec![]);
        assert!(matches!(predictor.train().await, Err(Error::InvalidInput(_))));

        assert!(Arc::ptr_eq(&before, &predictor.dataset.current()));
        assert_eq!(predictor.dataset.current().info().num_ratings, 3);
        assert_eq!(predictor.generation(), 1);
    }
}
