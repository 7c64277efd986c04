//! Taliesin - streaming document-generation server.
//!
//! Main entry point: wires a generation backend into the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use taliesin_llm::EchoBackend;
use taliesin_server::{Server, ServerConfig};

/// Taliesin - streaming document-generation server
#[derive(Parser)]
#[command(name = "taliesin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind the server to
    #[arg(long, env = "TALIESIN_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Cap on concurrent chunk generations per session
    #[arg(long, env = "TALIESIN_MAX_CONCURRENCY", default_value_t = 5)]
    max_concurrency: usize,

    /// Minimum milliseconds between emitted frames
    #[arg(long, env = "TALIESIN_EMIT_INTERVAL_MS", default_value_t = 200)]
    emit_interval_ms: u64,

    /// Characters per delta for the built-in echo backend
    #[arg(long, default_value_t = 16)]
    echo_piece_chars: usize,

    /// CORS allowed origins (repeatable; none = allow any)
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "taliesin=debug,taliesin_core=debug,taliesin_llm=debug,taliesin_engine=debug,taliesin_server=debug,info"
    } else {
        "taliesin=info,taliesin_engine=info,taliesin_server=info,warn"
    };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let backend = Arc::new(EchoBackend::new(cli.echo_piece_chars));
    let config = ServerConfig::default()
        .with_bind_address(cli.bind)
        .with_default_model("echo")
        .with_max_concurrency(cli.max_concurrency)
        .with_min_emit_interval(Duration::from_millis(cli.emit_interval_ms))
        .with_cors_origins(cli.cors_origins);

    tracing::info!(bind = %config.bind_address, "Taliesin starting");

    Server::new(backend, config).run().await?;
    Ok(())
}
