pub mod initializer;
pub mod svd;

use crate::models::{ItemId, UserId};

pub use svd::{FunkSvd, SvdParams, TrainedModel};

/// Point predictions from a fitted rating model.
pub trait RatingPredictor: Send + Sync {
    /// Estimated rating for the pair, already clipped to the rating scale.
    ///
    /// Pairs the model never saw get a deterministic fallback instead of an error.
    fn predict(&self, user_id: UserId, item_id: ItemId) -> f64;
}
