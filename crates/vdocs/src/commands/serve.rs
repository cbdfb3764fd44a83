//! `vdocs serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use vdocs_config::{CliSettings, Config};
use vdocs_server::{ServerConfig, run_server};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover vdocs.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry descriptor (overrides config).
    #[arg(short, long, env = "VDOCS_REGISTRY")]
    registry: Option<PathBuf>,

    /// Content store root directory (overrides config).
    #[arg(short, long, env = "VDOCS_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (request and cache logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Watch registry and content for changes (default: enabled).
    #[arg(long)]
    watch: Option<bool>,

    /// Disable watching.
    #[arg(long, conflicts_with = "watch")]
    no_watch: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let watch = self.resolve_watch();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            registry_path: self.registry,
            storage_root: self.storage_root,
            watch,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!(
            "Registry: {}",
            config.registry_resolved.path.display()
        ));
        output.info(&format!(
            "Content root: {}",
            config.storage_resolved.root.display()
        ));
        if config.registry_resolved.watch {
            output.info("Watching: enabled");
        } else {
            output.info("Watching: disabled");
        }

        run_server(ServerConfig::from_config(&config))
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }

    /// Resolve `watch` from --watch/--no-watch flags.
    fn resolve_watch(&self) -> Option<bool> {
        self.no_watch.then_some(false).or(self.watch)
    }
}
