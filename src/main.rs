use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use wp_search_proxy::api::{AppState, create_router};
use wp_search_proxy::{Config, HttpTransport, SearchAggregator};

/// CORS search proxy for the WordPress REST API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on (overrides PROXY_BIND_ADDR)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Fixed WordPress origin, e.g. https://example.com (overrides PROXY_UPSTREAM_BASE)
    #[arg(short, long, value_name = "URL")]
    upstream: Option<String>,

    /// Path of the WordPress install when the origin is derived from the request host
    #[arg(long, value_name = "PATH")]
    base_path: Option<String>,

    /// Per-call upstream timeout in seconds
    #[arg(short, long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Do not verify upstream TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn merge_into(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(upstream) = self.upstream {
            config.upstream_base = Some(upstream);
        }
        if let Some(path) = self.base_path {
            config.site_base_path = path;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if self.insecure {
            config.insecure_tls = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(true)
        .init();

    let mut config = Config::from_env()?;
    args.merge_into(&mut config);
    config.validate()?;

    let transport = HttpTransport::new(&config)?;
    let state = AppState {
        aggregator: Arc::new(SearchAggregator::new(Arc::new(transport))),
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    match &config.upstream_base {
        Some(base) => log::info!("proxying to {base}"),
        None => log::info!("proxying to the requesting host"),
    }
    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
