mod install_cmd;
mod list_cmd;
mod remove_cmd;
mod resolve_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use kadende_config::{config_dir, config_file_path, load_and_prepare, validate, ManagerSettings};
use kadende_core::PluginType;
use kadende_plugins::{PluginManager, PluginRequest};

#[derive(Parser)]
#[command(name = "kadende")]
#[command(about = "Kadende plugin manager")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.kadende/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and load a plugin
    Install(PluginArgs),
    /// Show where a plugin would be downloaded from and installed to
    Resolve(PluginArgs),
    /// List installed plugins
    List {
        /// Only list plugins of this type
        #[arg(long = "type")]
        plugin_type: Option<PluginType>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete an installed plugin
    Remove(PluginArgs),
}

#[derive(Args)]
struct PluginArgs {
    /// Plugin type: provider or flavour
    #[arg(long = "type")]
    plugin_type: String,
    #[arg(long)]
    name: Option<String>,
    /// Defaults to "latest"
    #[arg(long)]
    version: Option<String>,
    /// Explicit source: http(s):// or file:// URL, or an absolute path
    #[arg(long)]
    url: Option<String>,
}

impl PluginArgs {
    fn into_request(self) -> PluginRequest {
        PluginRequest {
            plugin_type: self.plugin_type,
            name: self.name,
            version: self.version,
            url: self.url,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            terminal_output::note_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&path).await?;

    let log_config = config.logging.clone().unwrap_or_default();
    logging::init_logger(
        log_config.level.as_deref().unwrap_or("info"),
        log_config.directory.as_deref(),
    );
    validate(&config).log();

    // Invalid configuration stops the process before any plugin work.
    let settings = ManagerSettings::from_config(&config)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    debug!(root = %settings.install_root.display(), host = %settings.release_host, "Settings ready");

    let manager = PluginManager::new(settings)?;

    match cli.command {
        Commands::Install(args) => install_cmd::run(&manager, args.into_request()).await,
        Commands::Resolve(args) => resolve_cmd::run(&manager, args.into_request()).await,
        Commands::List { plugin_type, json } => list_cmd::run(&manager, plugin_type, json).await,
        Commands::Remove(args) => remove_cmd::run(&manager, args.into_request()).await,
    }
}
