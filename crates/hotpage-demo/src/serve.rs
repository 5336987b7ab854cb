//! Serve command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use hotpage::{FsTree, Reloader};
use hotpage_config::{CliSettings, Config};

use crate::app;
use crate::error::CliError;
use crate::output::Output;
use crate::state::AppState;
use crate::templates::Templates;

/// Arguments for the demo server.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover hotpage.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long, env = "HOTPAGE_HOST")]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "HOTPAGE_PORT")]
    port: Option<u16>,

    /// Directory to watch for changes (overrides config).
    #[arg(short, long)]
    watch_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Run the demo server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let live_reload_enabled = self.resolve_live_reload_enabled();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            watch_dir: self.watch_dir,
            live_reload_enabled,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let reloader = Reloader::new(config.reload_config(tracing::info_span!("live_reload")));
        let templates = if config.live_reload.enabled {
            output.info(&format!(
                "Live reload: watching {}",
                config.dirs.watch_dir.display()
            ));
            reloader.start(FsTree::new(config.dirs.watch_dir.clone()));
            Templates::from_disk(config.dirs.watch_dir.join("templates"), reloader.clone())
        } else {
            output.info("Live reload: disabled");
            Templates::embedded(&reloader)?
        };

        let state = Arc::new(AppState {
            templates,
            title: "hotpage".to_owned(),
        });
        let app = app::create_router(state, &reloader, &config.dirs.static_dir);

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
        tracing::info!(address = %addr, "Server started");
        output.highlight(&format!("Listening on http://{addr}"));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(reloader))
            .await?;

        Ok(())
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}

/// Wait for Ctrl-C, then close the reloader so open streams end and the
/// graceful shutdown can complete.
async fn shutdown_signal(reloader: Reloader) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
    reloader.close();
}
