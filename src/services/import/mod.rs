//! Loads MovieLens files into the `movies` and `ratings` tables.

pub mod memory;

use crate::config::FileFormat;
use crate::error::{Error, Result};
use crate::models::{Movie, Rating};
use crate::services::dataset::files::{read_movies_file, read_ratings_file};
use crate::utils::retry_fixed;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub use memory::MemorySink;

/// Connection settings read from `POSTGRES_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub db: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            host: "postgres".to_string(),
            port: 5432,
            db: "movies".to_string(),
        }
    }
}

impl DbSettings {
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&DbSettings::default())?)
            .add_source(config::Environment::with_prefix("POSTGRES").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.db)
    }
}

/// Destination of an import run.
#[async_trait]
pub trait ImportSink: Send + Sync {
    /// Cheap round trip proving the store accepts queries.
    async fn ping(&self) -> Result<()>;
    async fn create_schema(&self) -> Result<()>;
    /// Inserts a batch, skipping primary-key conflicts. Returns rows actually written.
    async fn insert_movies(&self, batch: &[Movie]) -> Result<u64>;
    /// Inserts a batch, skipping primary-key conflicts. Returns rows actually written.
    async fn insert_ratings(&self, batch: &[Rating]) -> Result<u64>;
    async fn create_indexes(&self) -> Result<()>;
}

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool without connecting; the first query opens the connection.
    pub fn connect_lazy(settings: &DbSettings) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(settings.connect_options());
        Self::new(pool)
    }
}

#[async_trait]
impl ImportSink for PostgresSink {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS movies (
                movie_id INTEGER PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                genres VARCHAR(255) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ratings (
                user_id INTEGER NOT NULL,
                movie_id INTEGER NOT NULL REFERENCES movies(movie_id),
                rating DOUBLE PRECISION NOT NULL,
                "timestamp" BIGINT NOT NULL,
                PRIMARY KEY (user_id, movie_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_movies(&self, batch: &[Movie]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO movies (movie_id, title, genres) ");
        builder.push_values(batch, |mut row, movie| {
            row.push_bind(movie.item_id)
                .push_bind(movie.title.as_str())
                .push_bind(movie.genres.as_str());
        });
        builder.push(" ON CONFLICT DO NOTHING");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_ratings(&self, batch: &[Rating]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(r#"INSERT INTO ratings (user_id, movie_id, rating, "timestamp") "#);
        builder.push_values(batch, |mut row, rating| {
            row.push_bind(rating.user_id)
                .push_bind(rating.item_id)
                .push_bind(rating.rating)
                .push_bind(rating.timestamp);
        });
        builder.push(" ON CONFLICT DO NOTHING");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn create_indexes(&self) -> Result<()> {
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ratings_user ON ratings(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ratings_movie ON ratings(movie_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub movies_path: PathBuf,
    pub movies_format: FileFormat,
    pub ratings_path: PathBuf,
    pub ratings_format: FileFormat,
    pub movies_batch_size: usize,
    pub ratings_batch_size: usize,
    pub max_attempts: usize,
    pub retry_interval: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            movies_path: PathBuf::from("/data/movies_metadata.csv"),
            movies_format: FileFormat::Csv,
            ratings_path: PathBuf::from("/data/ratings.csv"),
            ratings_format: FileFormat::Csv,
            movies_batch_size: 1000,
            ratings_batch_size: 5000,
            max_attempts: 30,
            retry_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: &'static str,
    /// Rows read from the file, duplicates included.
    pub total_rows: usize,
    /// Rows the store actually accepted.
    pub inserted_rows: u64,
    pub batches: usize,
}

impl TableReport {
    pub fn skipped_rows(&self) -> u64 {
        (self.total_rows as u64).saturating_sub(self.inserted_rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub movies: TableReport,
    pub ratings: TableReport,
}

/// Polls the store until `ping` succeeds, sleeping a fixed interval between attempts.
pub async fn wait_for_store(sink: &dyn ImportSink, max_attempts: usize, interval: Duration) -> Result<()> {
    info!(max_attempts, interval = ?interval, "Waiting for database");
    retry_fixed(|| sink.ping(), max_attempts, interval)
        .await
        .map_err(|e| {
            warn!(error = %e, "Database never became reachable");
            Error::StoreUnavailable {
                attempts: max_attempts.max(1),
            }
        })?;
    info!("Database is reachable");
    Ok(())
}

async fn load_in_batches<'a, T, F, Fut>(
    table: &'static str,
    rows: &'a [T],
    batch_size: usize,
    mut insert: F,
) -> Result<TableReport>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: std::future::Future<Output = Result<u64>>,
{
    let batch_size = batch_size.max(1);
    let mut inserted_rows = 0;
    let mut batches = 0;

    for batch in rows.chunks(batch_size) {
        inserted_rows += insert(batch).await?;
        batches += 1;
    }

    let report = TableReport {
        table,
        total_rows: rows.len(),
        inserted_rows,
        batches,
    };
    info!(
        table,
        total_rows = report.total_rows,
        inserted_rows = report.inserted_rows,
        skipped_rows = report.skipped_rows(),
        batches,
        "Imported table"
    );
    Ok(report)
}

pub async fn import_movies(sink: &dyn ImportSink, movies: &[Movie], batch_size: usize) -> Result<TableReport> {
    load_in_batches("movies", movies, batch_size, |batch| sink.insert_movies(batch)).await
}

pub async fn import_ratings(sink: &dyn ImportSink, ratings: &[Rating], batch_size: usize) -> Result<TableReport> {
    load_in_batches("ratings", ratings, batch_size, |batch| sink.insert_ratings(batch)).await
}

/// Wait for the store, create the schema, load both files, then index.
pub async fn run_import(sink: &dyn ImportSink, options: &ImportOptions) -> Result<ImportSummary> {
    wait_for_store(sink, options.max_attempts, options.retry_interval).await?;

    info!("Creating database schema");
    sink.create_schema().await?;

    let movies = read_movies_file(&options.movies_path, options.movies_format).await?;
    let movies = import_movies(sink, &movies, options.movies_batch_size).await?;

    let ratings = read_ratings_file(&options.ratings_path, options.ratings_format).await?;
    let ratings = import_ratings(sink, &ratings, options.ratings_batch_size).await?;

    info!("Creating database indexes");
    sink.create_indexes().await?;

    Ok(ImportSummary { movies, ratings })
}
