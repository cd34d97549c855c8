//! Biased matrix factorization fitted with stochastic gradient descent.
//!
//! A rating is estimated as `mu + b_u + b_i + q_i . p_u`, where `mu` is the
//! global mean, `b_u`/`b_i` are user and item biases and `p_u`/`q_i` are the
//! latent factor vectors.

use super::{initializer, RatingPredictor};
use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::models::{ItemId, Rating, UserId};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SvdParams {
    pub n_factors: usize,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub init_mean: f64,
    pub init_std_dev: f64,
    pub seed: u64,
    pub rating_min: f64,
    pub rating_max: f64,
}

impl Default for SvdParams {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for SvdParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_factors: config.n_factors,
            n_epochs: config.n_epochs,
            learning_rate: config.learning_rate,
            regularization: config.regularization,
            init_mean: config.init_mean,
            init_std_dev: config.init_std_dev,
            seed: config.seed,
            rating_min: config.rating_min,
            rating_max: config.rating_max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunkSvd {
    params: SvdParams,
}

impl FunkSvd {
    pub fn new(params: SvdParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SvdParams {
        &self.params
    }

    /// Fits a fresh model on every rating in the snapshot.
    ///
    /// Samples are visited user by user, users in order of first appearance,
    /// each user's ratings in snapshot order. Fitting the same snapshot with the
    /// same params always yields the same model.
    pub fn fit(&self, ratings: &[Rating]) -> Result<TrainedModel> {
        if ratings.is_empty() {
            return Err(Error::InvalidInput("cannot train on an empty rating snapshot".to_string()));
        }

        let p = &self.params;
        let mut user_index: HashMap<UserId, usize> = HashMap::new();
        let mut item_index: HashMap<ItemId, usize> = HashMap::new();
        let mut by_user: Vec<Vec<(usize, f64)>> = Vec::new();

        for r in ratings {
            let next_user = user_index.len();
            let u = *user_index.entry(r.user_id).or_insert(next_user);
            if u == by_user.len() {
                by_user.push(Vec::new());
            }
            let next_item = item_index.len();
            let i = *item_index.entry(r.item_id).or_insert(next_item);
            by_user[u].push((i, r.rating));
        }

        let global_mean = ratings.iter().map(|r| r.rating).sum::<f64>() / ratings.len() as f64;

        let mut rng = StdRng::seed_from_u64(p.seed);
        let mut user_factors =
            initializer::normal_factors(&mut rng, user_index.len(), p.n_factors, p.init_mean, p.init_std_dev);
        let mut item_factors =
            initializer::normal_factors(&mut rng, item_index.len(), p.n_factors, p.init_mean, p.init_std_dev);
        let mut user_bias = vec![0.0; user_index.len()];
        let mut item_bias = vec![0.0; item_index.len()];

        let (lr, reg) = (p.learning_rate, p.regularization);
        for epoch in 0..p.n_epochs {
            for (u, user_ratings) in by_user.iter().enumerate() {
                for &(i, r) in user_ratings {
                    let pu = &mut user_factors[u];
                    let qi = &mut item_factors[i];

                    let err = r - (global_mean + user_bias[u] + item_bias[i] + pu.dot(&*qi));

                    user_bias[u] += lr * (err - reg * user_bias[u]);
                    item_bias[i] += lr * (err - reg * item_bias[i]);

                    for (pf, qf) in pu.iter_mut().zip(qi.iter_mut()) {
                        let (p_old, q_old) = (*pf, *qf);
                        *pf += lr * (err * q_old - reg * p_old);
                        *qf += lr * (err * p_old - reg * q_old);
                    }
                }
            }
            debug!(epoch = epoch + 1, n_epochs = p.n_epochs, "SVD epoch finished");
        }

        Ok(TrainedModel {
            global_mean,
            user_index,
            item_index,
            user_bias,
            item_bias,
            user_factors,
            item_factors,
            rating_min: p.rating_min,
            rating_max: p.rating_max,
        })
    }
}

/// Immutable result of one fit.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    global_mean: f64,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    user_bias: Vec<f64>,
    item_bias: Vec<f64>,
    user_factors: Vec<DVector<f64>>,
    item_factors: Vec<DVector<f64>>,
    rating_min: f64,
    rating_max: f64,
}

impl TrainedModel {
    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn num_users(&self) -> usize {
        self.user_index.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_index.len()
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    pub fn knows_item(&self, item_id: ItemId) -> bool {
        self.item_index.contains_key(&item_id)
    }

    /// Unclipped estimate; `None` when either side is unknown.
    pub fn raw_estimate(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let u = *self.user_index.get(&user_id)?;
        let i = *self.item_index.get(&item_id)?;
        Some(
            self.global_mean
                + self.user_bias[u]
                + self.item_bias[i]
                + self.user_factors[u].dot(&self.item_factors[i]),
        )
    }

    /// Root mean squared error of the clipped estimates over `ratings`.
    pub fn rmse(&self, ratings: &[Rating]) -> f64 {
        if ratings.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = ratings
            .iter()
            .map(|r| (r.rating - self.predict(r.user_id, r.item_id)).powi(2))
            .sum();
        (sum_sq / ratings.len() as f64).sqrt()
    }
}

impl RatingPredictor for TrainedModel {
    fn predict(&self, user_id: UserId, item_id: ItemId) -> f64 {
        self.raw_estimate(user_id, item_id)
            .unwrap_or(self.global_mean)
            .clamp(self.rating_min, self.rating_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<Rating> {
        vec![
            Rating::new(1, 10, 5.0, 0),
            Rating::new(1, 20, 1.0, 0),
            Rating::new(2, 10, 3.0, 0),
        ]
    }

    fn small_params() -> SvdParams {
        SvdParams {
            n_factors: 8,
            ..SvdParams::default()
        }
    }

    #[test]
    fn test_fit_indexes_every_user_and_item() {
        let model = FunkSvd::new(small_params()).fit(&scenario()).unwrap();
        assert_eq!(model.num_users(), 2);
        assert_eq!(model.num_items(), 2);
        assert!((model.global_mean() - 3.0).abs() < 1e-12);
        assert!(model.knows_user(1) && model.knows_item(20));
        assert!(!model.knows_user(3));
    }

    #[test]
    fn test_fit_learns_item_preference() {
        let model = FunkSvd::new(small_params()).fit(&scenario()).unwrap();
        assert!(model.predict(1, 10) > model.predict(1, 20));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let svd = FunkSvd::new(small_params());
        let a = svd.fit(&scenario()).unwrap();
        let b = svd.fit(&scenario()).unwrap();
        assert_eq!(a.predict(2, 20), b.predict(2, 20));
        assert_eq!(a.predict(1, 10), a.predict(1, 10));
    }

    #[test]
    fn test_unknown_pairs_fall_back_to_global_mean() {
        let model = FunkSvd::new(small_params()).fit(&scenario()).unwrap();
        assert_eq!(model.predict(99, 10), model.global_mean());
        assert_eq!(model.predict(1, 999), model.global_mean());
        assert!(model.raw_estimate(99, 10).is_none());
    }

    #[test]
    fn test_predictions_are_clipped() {
        let ratings: Vec<Rating> = (0..50).map(|u| Rating::new(u, 1, 5.0, 0)).collect();
        let params = SvdParams {
            n_factors: 4,
            n_epochs: 200,
            learning_rate: 0.05,
            ..SvdParams::default()
        };
        let model = FunkSvd::new(params).fit(&ratings).unwrap();
        for u in 0..50 {
            let p = model.predict(u, 1);
            assert!((1.0..=5.0).contains(&p));
        }
    }

    #[test]
    fn test_training_reduces_error() {
        let ratings = scenario();
        let untrained = FunkSvd::new(SvdParams {
            n_epochs: 0,
            ..small_params()
        })
        .fit(&ratings)
        .unwrap();
        let trained = FunkSvd::new(SvdParams {
            n_epochs: 100,
            ..small_params()
        })
        .fit(&ratings)
        .unwrap();
        assert!(trained.rmse(&ratings) < untrained.rmse(&ratings));
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        let err = FunkSvd::new(small_params()).fit(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
