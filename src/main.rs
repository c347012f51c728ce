// Slurm Exporter - Prometheus metrics for a Slurm cluster
//
// A Rust-based exporter that reads jobs, nodes, partitions and scheduler
// statistics from slurmrestd and serves them as point-in-time gauges on a
// Prometheus /metrics endpoint.
//
// # Usage
// slurm-exporter --slurmrestd <url> [--listen <addr>] [--token-file <path>]
//
// Example:
// slurm-exporter --slurmrestd "http://localhost:6820" --listen "0.0.0.0:9122"

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod client;
mod collector;
mod server;

use client::RestClient;
use collector::create_all_collectors;
use server::AppState;

/// Application entry point
///
/// This function:
/// 1. Initializes logging
/// 2. Parses command-line arguments
/// 3. Builds the slurmrestd client and the per-kind collectors
/// 4. Serves /metrics until the process is terminated
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("=== Slurm Exporter Starting ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = parse_arguments()?;

    info!("slurmrestd URL: {}", args.slurmrestd_url);
    match &args.token {
        Some(token) => info!("Auth token: {}", mask_token(token)),
        None => info!("Auth token: none"),
    }

    let client = RestClient::new(
        &args.slurmrestd_url,
        args.token.clone(),
        Duration::from_secs(args.request_timeout_secs),
    )
    .context("Failed to build slurmrestd client")?;

    let collectors = create_all_collectors(Arc::new(client));
    info!("Created {} metric collector(s)", collectors.len());

    let app = server::router(AppState::new(collectors));
    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen_addr))?;

    info!("=== Slurm Exporter Started Successfully ===");
    info!("Serving metrics on http://{}/metrics", args.listen_addr);

    axum::serve(listener, app)
        .await
        .context("Metrics server stopped unexpectedly")?;
    Ok(())
}

/// Application configuration parsed from command-line arguments
struct AppConfig {
    /// slurmrestd base URL
    slurmrestd_url: String,

    /// Address the /metrics endpoint listens on
    listen_addr: String,

    /// Optional JWT for slurmrestd authentication
    token: Option<String>,

    /// Per-read deadline in seconds
    request_timeout_secs: u64,
}

/// Parses command-line arguments
///
/// # Arguments
/// 1. --slurmrestd <url> - slurmrestd base URL (required)
/// 2. --listen <addr> - listen address (optional, defaults to 0.0.0.0:9122)
/// 3. --token-file <path> - file containing a slurmrestd JWT (optional;
///    the SLURM_JWT environment variable is used as a fallback)
/// 4. --request-timeout <secs> - per-read deadline (optional, default 10)
fn parse_arguments() -> Result<AppConfig> {
    let args: Vec<String> = env::args().collect();

    let find_arg = |flag: &str| -> Option<String> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|pos| args.get(pos + 1))
            .map(|s| s.to_string())
    };

    let slurmrestd_url =
        find_arg("--slurmrestd").context("Missing required argument: --slurmrestd <url>")?;

    let listen_addr = find_arg("--listen").unwrap_or_else(|| "0.0.0.0:9122".to_string());

    let token = match find_arg("--token-file") {
        Some(path) => {
            let token = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read token file {path}"))?;
            Some(token.trim().to_string())
        }
        None => env::var("SLURM_JWT").ok().filter(|t| !t.is_empty()),
    };

    let request_timeout_secs = match find_arg("--request-timeout") {
        Some(secs) => secs
            .parse()
            .context("Invalid --request-timeout, expected seconds")?,
        None => 10,
    };

    Ok(AppConfig {
        slurmrestd_url,
        listen_addr,
        token,
        request_timeout_secs,
    })
}

/// Initializes the logging subsystem
///
/// Default level is INFO, overridable via RUST_LOG. Under systemd
/// (INVOCATION_ID set) logs are emitted as JSON for structured capture;
/// in a terminal they are human-readable with colors.
fn init_logging() {
    let is_systemd = env::var("INVOCATION_ID").is_ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if is_systemd {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Masks an auth token for logging, keeping only a short prefix.
fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}****")
}
