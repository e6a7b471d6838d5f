use std::path::PathBuf;
use std::sync::Arc;

use adcast_hub::{AdHub, HubConfig, StaticCatalog};
use adcast_server::{AppState, ServerConfig};
use adcast_settings::{AdcastSettings, Loaded};
use adcast_store::{ClickRepo, Database};
use adcast_telemetry::{init_telemetry, parse_level, TelemetryConfig};
use anyhow::Context;
use clap::Parser;

/// Real-time ad broadcast server.
#[derive(Debug, Parser)]
#[command(name = "adcast", version)]
struct Args {
    /// Settings file (defaults to ~/.adcast/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port, overriding settings and APP_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path, overriding settings and DB_PATH.
    #[arg(long)]
    db: Option<PathBuf>,
}

fn load(args: &Args) -> anyhow::Result<Loaded> {
    let mut loaded = match &args.config {
        Some(path) => adcast_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => adcast_settings::load_settings().context("loading settings")?,
    };
    if let Some(port) = args.port {
        loaded.settings.server.port = port;
    }
    if let Some(db) = &args.db {
        loaded.settings.store.path = db.display().to_string();
    }
    Ok(loaded)
}

fn telemetry_config(settings: &AdcastSettings) -> TelemetryConfig {
    let log_level = parse_level(&settings.logging.level).unwrap_or_else(|| {
        eprintln!("unknown log level {:?}, using info", settings.logging.level);
        tracing::Level::INFO
    });
    TelemetryConfig {
        log_level,
        json: settings.logging.json,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let loaded = load(&args)?;
    init_telemetry(&telemetry_config(&loaded.settings))?;
    loaded.warn_rejected();
    let settings = loaded.settings;

    tracing::info!("starting adcast");

    let db_path = settings.store.resolved_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let clicks = ClickRepo::new(db, &settings.store.clicks_table)
        .context("preparing clicks table")?;

    let catalog = StaticCatalog::from_configured(settings.catalog.clone());
    tracing::info!(ads = catalog.as_slice().len(), "ad catalog loaded");

    let hub = AdHub::start(
        HubConfig {
            broadcast_interval: settings.hub.broadcast_interval(),
            mailbox_capacity: settings.hub.mailbox_capacity,
            command_queue: settings.hub.command_queue,
        },
        Arc::new(catalog.clone()),
    );

    let state = AppState {
        hub: hub.handle(),
        catalog,
        clicks,
    };
    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
    };
    let server = adcast_server::start(config, state)
        .await
        .with_context(|| format!("binding {}:{}", settings.server.host, settings.server.port))?;

    tracing::info!(port = server.port(), "adcast ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;

    tracing::info!("shutting down");
    // Hub first, so open sockets are closed before the listener drains
    hub.shutdown().await;
    server.shutdown().await;
    Ok(())
}
