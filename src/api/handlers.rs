use crate::error::Result;
use crate::models::*;
use crate::utils::validation::{validate_count, validate_search_query};
use crate::AppState;
use super::extract::{ApiPath, ApiQuery};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_ITEM_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub num_recommendations: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ItemCountQuery {
    pub num_items: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_trained: bool,
    pub model_generation: u64,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the movie recommendation API" }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_trained: state.predictor.is_trained(),
        model_generation: state.predictor.generation(),
    })
}

/// Full retrain on a freshly loaded snapshot.
pub async fn train(State(state): State<AppState>) -> Result<Json<TrainSummary>> {
    let summary = state.predictor.train().await?;
    Ok(Json(summary))
}

pub async fn recommend(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<UserId>,
    ApiQuery(params): ApiQuery<RecommendQuery>,
) -> Result<Json<RecommendationResponse>> {
    let count = validate_count(
        "num_recommendations",
        params.num_recommendations,
        state.recommendation_service.default_count(),
    )?;
    let response = state.recommendation_service.recommend(user_id, count).await?;
    Ok(Json(response))
}

pub async fn dataset_info(State(state): State<AppState>) -> Json<DatasetInfo> {
    Json(state.dataset.current().info())
}

pub async fn reload_dataset(State(state): State<AppState>) -> Result<Json<DatasetInfo>> {
    let snapshot = state.dataset.reload().await?;
    Ok(Json(snapshot.info()))
}

pub async fn user_details(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<UserId>,
) -> Json<UserDetails> {
    Json(UserDetails {
        user_id,
        rated_items: state.dataset.current().user_ratings(user_id),
    })
}

pub async fn item_details(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<ItemId>,
) -> Json<ItemStats> {
    Json(state.dataset.current().item_stats(item_id))
}

pub async fn top_rated(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ItemCountQuery>,
) -> Result<Json<TopRatedResponse>> {
    let n = validate_count("num_items", params.num_items, DEFAULT_ITEM_COUNT)?;
    Ok(Json(TopRatedResponse {
        top_items: state.dataset.current().top_rated(n),
    }))
}

pub async fn popular_items(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ItemCountQuery>,
) -> Result<Json<PopularResponse>> {
    let n = validate_count("num_items", params.num_items, DEFAULT_ITEM_COUNT)?;
    Ok(Json(PopularResponse {
        popular_items: state.dataset.current().popular(n),
    }))
}

pub async fn search_items(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let query = validate_search_query(&params.query)?;
    Ok(Json(SearchResponse {
        results: state.dataset.current().search_titles(query),
    }))
}
