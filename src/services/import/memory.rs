use super::ImportSink;
use crate::error::{Error, Result};
use crate::models::{ItemId, Movie, Rating, UserId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process stand-in for the relational store with the same key rules:
/// primary-key conflicts are skipped, ratings must reference a known movie.
#[derive(Debug, Default)]
pub struct MemorySink {
    movies: Mutex<BTreeMap<ItemId, Movie>>,
    ratings: Mutex<BTreeMap<(UserId, ItemId), Rating>>,
    failing_pings: AtomicUsize,
    pings: AtomicUsize,
    schema_created: Mutex<bool>,
    indexes_created: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` pings report the store as unreachable.
    pub fn unreachable_for(n: usize) -> Self {
        let sink = Self::default();
        sink.failing_pings.store(n, Ordering::SeqCst);
        sink
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn movie_count(&self) -> usize {
        self.movies.lock().len()
    }

    pub fn rating_count(&self) -> usize {
        self.ratings.lock().len()
    }

    pub fn rating(&self, user_id: UserId, item_id: ItemId) -> Option<Rating> {
        self.ratings.lock().get(&(user_id, item_id)).copied()
    }

    pub fn schema_created(&self) -> bool {
        *self.schema_created.lock()
    }

    pub fn indexes_created(&self) -> bool {
        *self.indexes_created.lock()
    }
}

#[async_trait]
impl ImportSink for MemorySink {
    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_pings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_pings.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }

    async fn create_schema(&self) -> Result<()> {
        *self.schema_created.lock() = true;
        Ok(())
    }

    async fn insert_movies(&self, batch: &[Movie]) -> Result<u64> {
        let mut movies = self.movies.lock();
        let mut inserted = 0;
        for movie in batch {
            if !movies.contains_key(&movie.item_id) {
                movies.insert(movie.item_id, movie.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_ratings(&self, batch: &[Rating]) -> Result<u64> {
        let movies = self.movies.lock();
        if let Some(orphan) = batch.iter().find(|r| !movies.contains_key(&r.item_id)) {
            return Err(Error::InvalidInput(format!(
                "rating ({}, {}) references unknown movie",
                orphan.user_id, orphan.item_id
            )));
        }

        let mut ratings = self.ratings.lock();
        let mut inserted = 0;
        for rating in batch {
            let key = (rating.user_id, rating.item_id);
            if !ratings.contains_key(&key) {
                ratings.insert(key, *rating);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn create_indexes(&self) -> Result<()> {
        *self.indexes_created.lock() = true;
        Ok(())
    }
}
