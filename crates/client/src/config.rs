use clap::{Parser, Subcommand, ValueEnum};
use engine::{DeleteMode, Money};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;

pub const DEFAULT_CONFIG_PATH: &str = "config/ledger.toml";

const ENV_PREFIX: &str = "LEDGER_CLIENT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub username: String,
    /// Only ever filled from `LEDGER_CLIENT_PASSWORD`.
    pub password: String,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            username: String::new(),
            password: String::new(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ledger", disable_version_flag = true)]
pub struct Cli {
    /// Optional config file path (TOML).
    #[arg(long)]
    pub config: Option<String>,
    /// Override base URL (e.g. http://127.0.0.1:3000).
    #[arg(long)]
    pub base_url: Option<String>,
    /// Override username (password is never read from CLI).
    #[arg(long)]
    pub username: Option<String>,
    /// Override log level.
    #[arg(long)]
    pub level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print balances, goal progress and budget compliance.
    Summary {
        /// Print as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Move money from the balance into a savings goal.
    Contribute {
        #[arg(long)]
        goal: Uuid,
        #[arg(long)]
        amount: Money,
    },
    /// Move money from a savings goal back to the balance.
    Withdraw {
        #[arg(long)]
        goal: Uuid,
        #[arg(long)]
        amount: Money,
    },
    DeleteTransaction {
        #[arg(long)]
        id: Uuid,
    },
    DeleteGoal {
        #[arg(long)]
        id: Uuid,
        #[arg(long, value_enum, default_value_t = ModeArg::Detach)]
        mode: ModeArg,
    },
    DeleteBudget {
        #[arg(long)]
        id: Uuid,
        #[arg(long, value_enum, default_value_t = ModeArg::Detach)]
        mode: ModeArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Keep linked transactions, unlinked.
    Detach,
    /// Delete linked transactions too.
    Cascade,
}

impl From<ModeArg> for DeleteMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Detach => DeleteMode::Detach,
            ModeArg::Cascade => DeleteMode::CascadeRefund,
        }
    }
}

pub fn load() -> Result<(AppConfig, Command)> {
    let cli = Cli::parse();
    let settings = settings(&cli)?;
    Ok((settings, cli.command))
}

/// Layers file, environment and command line, later ones winning.
pub fn settings(cli: &Cli) -> Result<AppConfig> {
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = &cli.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(username) = &cli.username {
        settings.username = username.clone();
    }
    if let Some(level) = &cli.level {
        settings.level = level.clone();
    }

    Ok(settings)
}
