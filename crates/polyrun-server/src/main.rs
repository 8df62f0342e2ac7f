//! polyrun-server binary
//!
//! Serves batch runs over HTTP and interactive runs over WebSocket.

use anyhow::Context;
use clap::Parser;
use polyrun_core::config::{ConfigLoader, EngineConfig};
use polyrun_core::ExecutionEngine;
use polyrun_server::{shutdown_signal, PolyrunServer, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command line arguments for the polyrun server.
#[derive(Parser, Debug)]
#[command(name = "polyrun-server")]
#[command(about = "Run user-submitted programs in six languages, in batch or interactively")]
#[command(version)]
struct Args {
    /// Server bind address
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    bind: String,

    /// Engine configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable CORS
    #[arg(long, default_value = "true")]
    cors: bool,

    /// CORS allowed origins (comma-separated)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "1048576")] // 1MB
    max_body_size: usize,

    /// Enable request logging
    #[arg(long, default_value = "true")]
    logging: bool,

    /// Log level (defaults to the config file's logging.level)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let engine_config = match &args.config {
        Some(path) => ConfigLoader::from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| engine_config.logging.level.clone());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&log_level)).init();

    let bind_addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", args.bind))?;

    let cors_origins = args
        .cors_origins
        .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let config = ServerConfig::new()
        .with_bind_addr(bind_addr)
        .with_cors(args.cors)
        .with_cors_origins(cors_origins)
        .with_max_body_size(args.max_body_size)
        .with_logging(args.logging);

    let engine = ExecutionEngine::new(&engine_config).context("building execution engine")?;

    log::info!("Starting polyrun server...");
    log::info!("Configuration:");
    log::info!("  Bind address: {}", bind_addr);
    log::info!("  CORS enabled: {}", args.cors);
    log::info!("  Max body size: {} bytes", args.max_body_size);
    log::info!(
        "  Timeouts: compile {}s, batch {}s, session {}s",
        engine_config.execution.compile_timeout_secs,
        engine_config.execution.batch_timeout_secs,
        engine_config.execution.session_time_limit_secs
    );
    for status in engine.availability() {
        if status.available {
            log::info!("  {}: {}", status.language, status.program);
        } else {
            log::warn!("  {}: '{}' not found on PATH", status.language, status.program);
        }
    }

    PolyrunServer::with_config(engine, config)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
