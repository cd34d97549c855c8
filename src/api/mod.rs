pub mod extract;
pub mod handlers;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Routes served under `/api`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/train", post(handlers::train))
        .route("/recommend/:user_id", get(handlers::recommend))
        .route("/dataset/info", get(handlers::dataset_info))
        .route("/dataset/reload", post(handlers::reload_dataset))
        .route("/user/:user_id/details", get(handlers::user_details))
        .route("/item/:item_id/details", get(handlers::item_details))
        .route("/items/top_rated", get(handlers::top_rated))
        .route("/items/search", get(handlers::search_items))
        .route("/items/popular", get(handlers::popular_items))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
