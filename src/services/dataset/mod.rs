pub mod files;
pub mod postgres;

use crate::config::{DataConfig, SourceKind};
use crate::error::Result;
use crate::models::*;
use crate::utils::top_k_by_score;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

pub use files::FileSource;
pub use postgres::{create_pool, PostgresSource};

/// Where rating tuples and title metadata come from.
#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn load_ratings(&self) -> Result<Vec<Rating>>;
    async fn load_movies(&self) -> Result<Vec<Movie>>;
    fn describe(&self) -> String;
}

/// Fixed in-memory data, for tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    ratings: Arc<RwLock<Vec<Rating>>>,
    movies: Arc<RwLock<Vec<Movie>>>,
}

impl StaticSource {
    pub fn new(ratings: Vec<Rating>, movies: Vec<Movie>) -> Self {
        Self {
            ratings: Arc::new(RwLock::new(ratings)),
            movies: Arc::new(RwLock::new(movies)),
        }
    }

    /// Swaps the ratings served by the next load.
    pub fn replace_ratings(&self, ratings: Vec<Rating>) {
        *self.ratings.write() = ratings;
    }
}

#[async_trait]
impl RatingSource for StaticSource {
    async fn load_ratings(&self) -> Result<Vec<Rating>> {
        Ok(self.ratings.read().clone())
    }

    async fn load_movies(&self) -> Result<Vec<Movie>> {
        Ok(self.movies.read().clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

pub async fn source_from_config(config: &DataConfig) -> Result<Arc<dyn RatingSource>> {
    let source: Arc<dyn RatingSource> = match config.source {
        SourceKind::Files => Arc::new(FileSource::from_config(config)),
        SourceKind::Postgres => {
            let pool = create_pool(&config.database_url, config.max_connections).await?;
            Arc::new(PostgresSource::new(pool))
        }
    };
    Ok(source)
}

/// One loaded copy of the rating tuples and title metadata.
#[derive(Debug, Clone)]
pub struct Snapshot {
    ratings: Vec<Rating>,
    movies: Vec<Movie>,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(ratings: Vec<Rating>, movies: Vec<Movie>) -> Self {
        Self {
            ratings,
            movies,
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn info(&self) -> DatasetInfo {
        let users: HashSet<UserId> = self.ratings.iter().map(|r| r.user_id).collect();
        let items: HashSet<ItemId> = self.ratings.iter().map(|r| r.item_id).collect();
        DatasetInfo {
            num_users: users.len(),
            num_items: items.len(),
            num_ratings: self.ratings.len(),
        }
    }

    pub fn user_ratings(&self, user_id: UserId) -> Vec<RatedItem> {
        self.ratings
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| RatedItem {
                item_id: r.item_id,
                rating: r.rating,
            })
            .collect()
    }

    pub fn item_stats(&self, item_id: ItemId) -> ItemStats {
        let (sum, count) = self
            .ratings
            .iter()
            .filter(|r| r.item_id == item_id)
            .fold((0.0, 0usize), |(sum, count), r| (sum + r.rating, count + 1));

        ItemStats {
            item_id,
            avg_rating: (count > 0).then(|| sum / count as f64),
            num_ratings: count,
        }
    }

    /// (sum, count) per item, keyed in ascending item order.
    fn item_aggregates(&self) -> BTreeMap<ItemId, (f64, usize)> {
        let mut aggregates = BTreeMap::new();
        for r in &self.ratings {
            let entry = aggregates.entry(r.item_id).or_insert((0.0, 0usize));
            entry.0 += r.rating;
            entry.1 += 1;
        }
        aggregates
    }

    pub fn top_rated(&self, n: usize) -> Vec<TopRatedItem> {
        let items = self
            .item_aggregates()
            .into_iter()
            .map(|(item_id, (sum, count))| TopRatedItem {
                item_id,
                avg_rating: sum / count as f64,
            })
            .collect();
        top_k_by_score(items, n, |item| item.avg_rating)
    }

    pub fn popular(&self, n: usize) -> Vec<PopularItem> {
        let items = self
            .item_aggregates()
            .into_iter()
            .map(|(item_id, (_, count))| PopularItem {
                item_id,
                num_ratings: count,
            })
            .collect();
        top_k_by_score(items, n, |item| item.num_ratings as f64)
    }

    /// Case-insensitive substring match over titles, in item order.
    pub fn search_titles(&self, query: &str) -> Vec<Movie> {
        let needle = query.to_lowercase();
        let mut results: Vec<Movie> = self
            .movies
            .iter()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        results.sort_by_key(|m| m.item_id);
        results
    }
}

/// Holds the current snapshot and refreshes it from the configured source.
pub struct DatasetService {
    source: Arc<dyn RatingSource>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl DatasetService {
    pub fn new(source: Arc<dyn RatingSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Reads a fresh snapshot from the source without making it current.
    pub async fn load(&self) -> Result<Arc<Snapshot>> {
        let ratings = self.source.load_ratings().await?;
        let movies = self.source.load_movies().await?;
        Ok(Arc::new(Snapshot::new(ratings, movies)))
    }

    /// Makes `snapshot` the one every query reads.
    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.snapshot.write() = snapshot;
    }

    /// Loads a fresh snapshot and makes it current.
    pub async fn reload(&self) -> Result<Arc<Snapshot>> {
        let snapshot = self.load().await?;
        self.publish(snapshot.clone());

        let info = snapshot.info();
        info!(
            source = %self.source.describe(),
            num_users = info.num_users,
            num_items = info.num_items,
            num_ratings = info.num_ratings,
            num_movies = snapshot.movies().len(),
            "Loaded rating snapshot"
        );
        Ok(snapshot)
    }
}
