use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use longpoll_core::EventHub;
use longpoll_settings::{LoadedSettings, LongpollSettings};
use longpoll_telemetry::TelemetryConfig;
use tracing::Level;

/// Per-client long-polling event server.
#[derive(Parser, Debug)]
#[command(name = "longpoll", version, about)]
struct Cli {
    /// Path to a JSON settings file (default: ~/.longpoll/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, settings: &mut LongpollSettings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => longpoll_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => longpoll_settings::load_settings().with_context(|| {
            format!(
                "loading settings from {}",
                longpoll_settings::settings_path().display()
            )
        })?,
    };
    let LoadedSettings {
        mut settings,
        rejected,
    } = loaded;
    cli.apply(&mut settings);

    longpoll_telemetry::init_telemetry(&TelemetryConfig {
        log_level: settings.logging.level.parse().unwrap_or(Level::INFO),
        // Keep connection-level chatter out of debug output.
        module_levels: vec![("hyper".into(), Level::INFO), ("hyper_util".into(), Level::INFO)],
        json: settings.logging.json,
    });

    for entry in &rejected {
        tracing::warn!(key = %entry.key, value = %entry.value, "invalid env var, ignoring");
    }

    tracing::info!("Starting longpoll server v{}", env!("CARGO_PKG_VERSION"));

    let hub = Arc::new(EventHub::new(settings.hub.to_hub_config()));
    let config = longpoll_server::ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        ..Default::default()
    };

    let handle = longpoll_server::start(config.clone(), hub)
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;

    tracing::info!(port = handle.port, "Longpoll server ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl+c")?;

    handle.shutdown().await;
    Ok(())
}
