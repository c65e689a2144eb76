//! Websocket server for Fives rooms.
//!
//! One actor per room, a shared registry keyed by join code, and a
//! single `/ws` endpoint that binds each socket to a room on its first
//! message.

mod config;
mod logging;
mod ws;

use anyhow::Error;
use axum::{routing::get, Router};
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use tower_http::cors::CorsLayer;

use fives::room::RoomRegistry;

use config::ServerConfig;

const HELP: &str = "\
Run a Fives game server

USAGE:
  fives_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:7400]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  RUST_LOG                 Log filter (e.g., debug, fives=debug)
";

#[derive(Clone)]
pub struct AppState {
    pub registry: RoomRegistry,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let cli_bind: Option<String> = pargs.opt_value_from_str("--bind")?;
    let config = ServerConfig::resolve(cli_bind)?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();

    let registry = RoomRegistry::new();
    registry.spawn_sweeper();

    let state = AppState { registry };

    let app = Router::new()
        .route("/ws", get(ws::websocket_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind to {}: {e}", config.bind))?;

    info!(
        "server running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    info!("shutting down");
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to install CTRL+C handler: {err}");
    }
}
