mod error;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use codex_core::{Catalog, Config};
use state::{AppState, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "codex-service")]
#[command(about = "HTTP service for codex indexing and reconciliation", long_about = None)]
struct Args {
    #[arg(long, env = "CODEX_PORT", default_value_t = 3000)]
    port: u16,

    #[arg(long, env = "CODEX_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Catalog database (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Config file (default: ./codex.toml when present)
    #[arg(long, env = "CODEX_CONFIG")]
    config: Option<PathBuf>,
}

fn app(state: SharedState) -> Router {
    Router::new()
        .route("/index", post(routes::index))
        .route("/reindex/smart", post(routes::smart_reindex))
        .route("/reconcile/analyze", post(routes::analyze))
        .route("/reconcile/fix", post(routes::fix))
        .route("/stats", get(routes::stats))
        .route("/search", get(routes::search))
        .route("/projects", get(routes::projects))
        .route("/tags", get(routes::tags))
        .route("/status", get(routes::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let catalog = match open_catalog(&args) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, "failed to open catalog");
            std::process::exit(1);
        }
    };
    let state: SharedState = Arc::new(AppState::new(catalog));

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!("codex-service listening on {}", addr);

    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

fn open_catalog(args: &Args) -> codex_core::Result<Catalog> {
    let config = Config::resolve(args.config.as_deref())?;
    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.catalog.database.clone());
    Catalog::open(&db_path, config)
}
