//! Room-based Chat Server - Entry Point
//!
//! Parses arguments, binds the listener and serves clients until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use salon_chat::{serve, ServerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to listen on
    port: u16,

    /// Address to bind to (all interfaces by default)
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the default room
    #[arg(long)]
    default_room: Option<String>,

    /// Maximum number of rooms, default room included
    #[arg(long)]
    max_rooms: Option<usize>,

    /// Longest accepted input line in bytes
    #[arg(long)]
    max_line_length: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, salon_chat::AppError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(default_room) = self.default_room {
            config.default_room = default_room;
        }
        if let Some(max_rooms) = self.max_rooms {
            config.max_rooms = Some(max_rooms);
        }
        if let Some(max_line_length) = self.max_line_length {
            config.max_line_length = max_line_length;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=salon_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("salon_chat=info")),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let config = Arc::new(args.into_config()?);

    // Start TCP listener
    let listener = TcpListener::bind(&addr).await?;
    info!("Chat server listening on {}", addr);

    serve(listener, config, shutdown_signal()).await?;
    info!("Chat server stopped");
    Ok(())
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
}
