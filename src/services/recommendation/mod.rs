use crate::algorithms::RatingPredictor;
use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::*;
use crate::services::training::Predictor;
use crate::utils::top_k_by_score;
use dashmap::DashMap;
use rayon::prelude::*;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info};

/// Scores every item of `universe` for `user_id` and keeps the best `count`.
///
/// Items are scored in parallel; the collected order is still ascending
/// `item_id`, so the stable sort breaks score ties by item id.
pub fn rank_items<P>(predictor: &P, user_id: UserId, universe: RangeInclusive<ItemId>, count: usize) -> Vec<Recommendation>
where
    P: RatingPredictor + ?Sized,
{
    let scored: Vec<Recommendation> = universe
        .into_par_iter()
        .map(|item_id| Recommendation {
            item_id,
            predicted_rating: predictor.predict(user_id, item_id),
        })
        .collect();

    top_k_by_score(scored, count, |r| r.predicted_rating)
}

struct CachedRanking {
    generation: u64,
    /// Longest ranking computed for the user so far, best first.
    recommendations: Vec<Recommendation>,
}

/// Top-N recommendations over the configured item universe.
pub struct RecommendationService {
    predictor: Arc<Predictor>,
    config: RecommendationConfig,
    cache: DashMap<UserId, CachedRanking>,
    cached_generation: parking_lot::Mutex<u64>,
}

impl RecommendationService {
    pub fn new(predictor: Arc<Predictor>, config: RecommendationConfig) -> Self {
        Self {
            predictor,
            config,
            cache: DashMap::new(),
            cached_generation: parking_lot::Mutex::new(0),
        }
    }

    pub fn default_count(&self) -> usize {
        self.config.default_count
    }

    pub async fn recommend(&self, user_id: UserId, count: usize) -> Result<RecommendationResponse> {
        let model = self.predictor.snapshot()?;

        if self.config.cache_enabled {
            self.evict_stale(model.generation);
            if let Some(recommendations) = self.cached_prefix(user_id, count, model.generation) {
                debug!(user_id, count, generation = model.generation, "Recommendation cache hit");
                return Ok(RecommendationResponse {
                    user_id,
                    recommendations,
                });
            }
        }

        let universe = self.config.item_universe();
        let sweep_model = model.clone();
        let recommendations =
            tokio::task::spawn_blocking(move || rank_items(sweep_model.as_ref(), user_id, universe, count)).await?;

        if self.config.cache_enabled {
            self.store(user_id, model.generation, &recommendations);
        }

        info!(
            user_id,
            count,
            returned = recommendations.len(),
            generation = model.generation,
            "Served recommendations"
        );

        Ok(RecommendationResponse {
            user_id,
            recommendations,
        })
    }

    /// The first `count` cached items, if the cached ranking is current and long enough.
    fn cached_prefix(&self, user_id: UserId, count: usize, generation: u64) -> Option<Vec<Recommendation>> {
        let hit = self.cache.get(&user_id)?;
        let ranking = &hit.recommendations;
        let complete = ranking.len() >= self.config.universe_size();
        if hit.generation != generation || (ranking.len() < count && !complete) {
            return None;
        }
        Some(ranking[..count.min(ranking.len())].to_vec())
    }

    fn store(&self, user_id: UserId, generation: u64, recommendations: &[Recommendation]) {
        if let Some(mut entry) = self.cache.get_mut(&user_id) {
            if entry.generation != generation || entry.recommendations.len() < recommendations.len() {
                entry.generation = generation;
                entry.recommendations = recommendations.to_vec();
            }
            return;
        }

        if self.cache.len() >= self.config.cache_capacity {
            debug!(user_id, capacity = self.config.cache_capacity, "Recommendation cache full");
            return;
        }

        self.cache.insert(
            user_id,
            CachedRanking {
                generation,
                recommendations: recommendations.to_vec(),
            },
        );
    }

    /// Drops every cached ranking once a newer model generation shows up.
    fn evict_stale(&self, generation: u64) {
        let mut seen = self.cached_generation.lock();
        if *seen != generation {
            self.cache.clear();
            *seen = generation;
        }
    }

    /// Number of users with a cached ranking.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
