//! Party Room Server - authoritative match lifecycle host
//!
//! Entry point. It handles:
//! - Configuration from the environment (and `.env`)
//! - Room tasks, one deterministic simulation each
//! - A JSON-lines session driver on stdin/stdout
//!
//! Logs go to stderr; stdout carries protocol lines only.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use party_room_server::config::Config;
use party_room_server::game::RoomRegistry;
use party_room_server::session::run_stdio;
use party_room_server::util::time::{init_server_time, uptime_secs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Party Room Server");
    info!(
        tick_rate = config.tick_rate,
        max_players = config.max_players,
        team_count = config.team_count,
        real_game = config.real_game,
        "Simulation settings"
    );

    let registry = Arc::new(RoomRegistry::new());
    let config = Arc::new(config);

    tokio::select! {
        result = run_stdio(registry.clone(), config) => {
            result?;
            info!("Session input finished");
        }
        _ = shutdown_signal() => {}
    }

    info!(
        open_rooms = registry.active_rooms(),
        players = registry.total_players(),
        uptime_secs = uptime_secs(),
        "Server shutdown complete"
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
