use super::RatingSource;
use crate::error::Result;
use crate::models::{Movie, Rating};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Creates a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Rating store reading the `ratings` and `movies` tables written by the import job.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RatingSource for PostgresSource {
    async fn load_ratings(&self) -> Result<Vec<Rating>> {
        let ratings: Vec<Rating> = sqlx::query_as::<_, (i32, i32, f64, i64)>(
            r#"SELECT user_id, movie_id, rating, "timestamp" FROM ratings ORDER BY user_id, movie_id"#,
        )
        .fetch(&self.pool)
        .map_ok(|(user_id, item_id, rating, timestamp)| Rating::new(user_id, item_id, rating, timestamp))
        .try_collect::<Vec<_>>()
        .await?;

        Ok(ratings)
    }

    async fn load_movies(&self) -> Result<Vec<Movie>> {
        let movies: Vec<Movie> = sqlx::query_as::<_, (i32, String, String)>(
            "SELECT movie_id, title, genres FROM movies ORDER BY movie_id",
        )
        .fetch(&self.pool)
        .map_ok(|(item_id, title, genres)| Movie::new(item_id, title, genres))
        .try_collect::<Vec<_>>()
        .await?;

        Ok(movies)
    }

    fn describe(&self) -> String {
        "postgres(ratings, movies)".to_string()
    }
}
