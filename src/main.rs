use anyhow::Context;
use clap::Parser;
use movierec::{api::create_router, init_tracing, AppState, Config};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Movie recommendation HTTP server", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = Config::load(Some(args.config.as_str())).context("loading configuration")?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        server = ?config.server,
        source = ?config.data.source,
        items = ?config.recommendation.item_universe(),
        "Starting movie recommendation server"
    );

    let addr = config.server.socket_addr()?;
    let state = AppState::new(config).await.context("initializing application state")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
