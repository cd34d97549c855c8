use anyhow::Result;
use clap::Parser;
use movierec::config::FileFormat;
use movierec::init_tracing;
use movierec::services::import::{run_import, DbSettings, ImportOptions, PostgresSink};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Load MovieLens CSV files into PostgreSQL", long_about = None)]
struct Args {
    #[arg(long, default_value = "/data/movies_metadata.csv")]
    movies: PathBuf,

    #[arg(long, value_enum, default_value = "csv")]
    movies_format: FileFormat,

    #[arg(long, default_value = "/data/ratings.csv")]
    ratings: PathBuf,

    #[arg(long, value_enum, default_value = "csv")]
    ratings_format: FileFormat,

    #[arg(long, default_value_t = 1000)]
    movies_batch_size: usize,

    #[arg(long, default_value_t = 5000)]
    ratings_batch_size: usize,

    /// Connection attempts before giving up
    #[arg(long, default_value_t = 30)]
    max_retries: usize,

    #[arg(long, default_value_t = 2)]
    retry_interval_secs: u64,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if let Err(e) = run(args).await {
        error!(error = %e, "Data import failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = DbSettings::from_env()?;
    info!(
        host = %settings.host,
        port = settings.port,
        db = %settings.db,
        user = %settings.user,
        "Starting MovieLens import"
    );

    let options = ImportOptions {
        movies_path: args.movies,
        movies_format: args.movies_format,
        ratings_path: args.ratings,
        ratings_format: args.ratings_format,
        movies_batch_size: args.movies_batch_size,
        ratings_batch_size: args.ratings_batch_size,
        max_attempts: args.max_retries,
        retry_interval: Duration::from_secs(args.retry_interval_secs),
    };

    let sink = PostgresSink::connect_lazy(&settings);
    let summary = run_import(&sink, &options).await?;

    info!(
        movies = summary.movies.total_rows,
        movies_inserted = summary.movies.inserted_rows,
        ratings = summary.ratings.total_rows,
        ratings_inserted = summary.ratings.inserted_rows,
        "Data import completed successfully"
    );
    Ok(())
}
