use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quaestor::config::Config;
use quaestor::extract::{FetchSettings, PageFetcher};
use quaestor::http::{router, AppState};
use quaestor::llm::OpenAiClient;
use quaestor::router::StageContext;
use quaestor::search::TavilyClient;
use quaestor::stages::build_router;
use quaestor::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(
    name = "quaestor",
    version,
    about = "Research question pipeline: seeds a topic, searches the web, and ranks brainstormed research questions"
)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Enable verbose/debug logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::from_env()?;
    config.validate()?;

    info!(
        model = %config.llm_model,
        search = %config.search_base_url,
        "configuration loaded"
    );

    let config = Arc::new(config);
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(OpenAiClient::new(&config));
    let search = Arc::new(TavilyClient::new(&config));
    let fetcher = Arc::new(PageFetcher::new(FetchSettings::from(config.as_ref())));

    let ctx = StageContext {
        store: store.clone(),
        config: config.clone(),
    };
    let pipeline = Arc::new(build_router(ctx, llm, search, fetcher));

    let state = AppState { store, pipeline };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
