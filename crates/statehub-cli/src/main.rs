//! Statehub command-line tool
//!
//! Manages repository sources, server modules and user settings under the
//! Statehub state directory (`~/.config/statehub` by default).

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use output::{resolve_color_choice, ColorMode, StyledOutput};
use statehub_pm::{ModuleManager, PmConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statehub")]
#[command(about = "Statehub CLI management program", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the state directory
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Set log level
    #[arg(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// When to use colors
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage module repositories
    Sources {
        #[command(subcommand)]
        action: commands::sources::SourcesAction,
    },

    /// Install a module (e.g., "@statehub/pingpong")
    Install {
        /// Module name
        name: String,
    },

    /// Remove an installed module
    Uninstall {
        /// Module name
        name: String,
    },

    /// Update one module, or every installed module
    Update {
        /// Module to update (if not specified, updates all)
        name: Option<String>,
    },

    /// List installed modules
    Modlist {
        /// Show extended information about modules
        #[arg(short, long)]
        extended: bool,
    },

    /// Read and write user settings
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides `--log-level`
fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(home: Option<PathBuf>) -> Result<PmConfig> {
    let config = match home {
        Some(home) => PmConfig::with_home(home),
        None => PmConfig::from_home_dir()?,
    };
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli, out: &mut StyledOutput) -> Result<()> {
    let config = build_config(cli.home)?;
    tracing::debug!(home = %config.home.display(), "Using state directory");

    let connect = |config: PmConfig| -> Result<ModuleManager> { Ok(ModuleManager::from_config(config)?) };

    match cli.command {
        Commands::Settings { action } => commands::settings::execute(&config, action, out),
        Commands::Sources { action } => commands::sources::execute(&connect(config)?, action, out),
        Commands::Install { name } => commands::modules::install(&connect(config)?, &name, out),
        Commands::Uninstall { name } => {
            commands::modules::uninstall(&connect(config)?, &name, out)
        }
        Commands::Update { name: Some(name) } => {
            commands::modules::update(&connect(config)?, &name, out)
        }
        Commands::Update { name: None } => commands::modules::update_all(&connect(config)?, out),
        Commands::Modlist { extended } => {
            commands::modules::modlist(&connect(config)?, extended, out)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    let mut out = StyledOutput::new(resolve_color_choice(cli.color));

    if let Err(e) = run(cli, &mut out) {
        out.error_line(&format!("{:#}", e));
        std::process::exit(1);
    }
}
