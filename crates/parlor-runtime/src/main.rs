//! Parlor trace replay binary.
//!
//! # Usage
//!
//! ```bash
//! # Replay roster and chat callbacks
//! parlor-replay session.cbor
//!
//! # Also drive the login state machine
//! parlor-replay session.cbor --username alice --password hunter2
//! ```

use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use parlor_core::{ClientConfig, Credentials, RetryPolicy};
use parlor_runtime::replay;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parlor callback trace replay
#[derive(Parser, Debug)]
#[command(name = "parlor-replay")]
#[command(about = "Replay a recorded callback trace through the Parlor engine")]
#[command(version)]
struct Args {
    /// Path to the CBOR trace
    trace: PathBuf,

    /// Username for the replayed login
    #[arg(short, long)]
    username: Option<String>,

    /// Password for the replayed login
    #[arg(short, long)]
    password: Option<String>,

    /// Give up after this many connection retries
    #[arg(long)]
    max_retries: Option<u32>,

    /// Name attributed to outgoing messages
    #[arg(long, default_value = parlor_core::config::DEFAULT_SELF_NAME)]
    self_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Replaying {}", args.trace.display());

    let events = replay::read_trace(BufReader::new(File::open(&args.trace)?))?;

    let credentials = match (args.username, args.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        (None, None) => None,
        _ => {
            tracing::warn!("Both --username and --password are needed to replay a login");
            None
        },
    };

    let config = ClientConfig {
        self_name: args.self_name,
        retry: args.max_retries.map_or_else(RetryPolicy::unbounded, RetryPolicy::bounded),
        ..ClientConfig::default()
    };

    let summary = replay::replay(config, credentials, events)?;

    tracing::info!(
        events = summary.events,
        requests = summary.requests,
        avatar_fetches = summary.avatar_fetches,
        messages = summary.messages,
        "Replay finished, session {}",
        summary.state
    );

    for (position, peer) in summary.roster.iter().enumerate() {
        tracing::info!(
            position,
            id = %peer.id,
            presence = ?peer.presence,
            activity = peer.activity.as_deref().unwrap_or("-"),
            "{}",
            peer.display_name
        );
    }

    Ok(())
}
