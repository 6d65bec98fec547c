//! Parley relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! parley-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate, handing orphaned rooms to the oldest member
//! parley-server --cert cert.pem --key key.pem --ownership-policy transfer
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};
use parley_core::{CoordinatorConfig, OwnershipPolicy};
use parley_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// What happens to a room when its owner disconnects
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Ownership {
    /// Room stays ownerless and can no longer be closed
    Orphan,
    /// Longest-standing remaining member becomes owner
    Transfer,
}

impl From<Ownership> for OwnershipPolicy {
    fn from(value: Ownership) -> Self {
        match value {
            Ownership::Orphan => Self::Orphan,
            Ownership::Transfer => Self::TransferToOldestMember,
        }
    }
}

/// Parley messaging relay
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Parley room and private messaging relay")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Largest accepted frame payload in bytes
    #[arg(long, default_value = "1048576")]
    max_frame_bytes: usize,

    /// Ownership handling when a room owner leaves for good
    #[arg(long, value_enum, default_value = "orphan")]
    ownership_policy: Ownership,

    /// Seconds a dropped session can be resumed
    #[arg(long, default_value = "120")]
    resume_ttl_secs: u64,

    /// Recent messages replayed to each new room member (0 disables)
    #[arg(long, default_value = "500")]
    history_len: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Parley server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        max_frame_bytes: args.max_frame_bytes,
        coordinator: CoordinatorConfig {
            max_connections: args.max_connections,
            ownership_policy: args.ownership_policy.into(),
            resume_ttl: Duration::from_secs(args.resume_ttl_secs),
            history_len: args.history_len,
            ..Default::default()
        },
        ..Default::default()
    };

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
