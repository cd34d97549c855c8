use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = i32;
pub type ItemId = i32;
pub type Timestamp = i64;

/// One observed (user, item) rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f64,
    pub timestamp: Timestamp,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            item_id,
            rating,
            timestamp,
        }
    }
}

/// Title metadata for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub item_id: ItemId,
    pub title: String,
    pub genres: String,
}

impl Movie {
    pub fn new(item_id: ItemId, title: impl Into<String>, genres: impl Into<String>) -> Self {
        Self {
            item_id,
            title: title.into(),
            genres: genres.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub predicted_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSummary {
    pub message: String,
    pub model_version: Uuid,
    pub generation: u64,
    pub trained_at: DateTime<Utc>,
    pub num_users: usize,
    pub num_items: usize,
    pub num_ratings: usize,
    pub train_rmse: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub num_users: usize,
    pub num_items: usize,
    pub num_ratings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatedItem {
    pub item_id: ItemId,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    pub user_id: UserId,
    pub rated_items: Vec<RatedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub item_id: ItemId,
    /// `None` when nobody rated the item.
    pub avg_rating: Option<f64>,
    pub num_ratings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopRatedItem {
    pub item_id: ItemId,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularItem {
    pub item_id: ItemId,
    pub num_ratings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopRatedResponse {
    pub top_items: Vec<TopRatedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularResponse {
    pub popular_items: Vec<PopularItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Movie>,
}
