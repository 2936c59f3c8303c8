use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use retrieval_core::SearchConfig;
use retrieval_server::build_app;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./cache/index")]
    index: String,
    /// Optional JSON file overriding search tunables
    #[arg(long)]
    config: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SearchConfig::from_json_file(path).with_context(|| format!("reading config {path}"))?,
        None => SearchConfig::default(),
    };
    let (alpha, rrf_k) = (config.alpha, config.rrf_k);
    let app: Router = build_app(args.index.clone(), config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %args.index, alpha, rrf_k, "retrieval server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
