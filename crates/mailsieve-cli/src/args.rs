use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "mailsieve")]
#[command(about = "Fetch Gmail messages into a local store and apply label rules to them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Path to the TOML configuration file
    #[arg(long = "config", env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub path: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local email table if it does not exist
    InitDb {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Download messages from the configured label into the local store
    Fetch {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Apply the rule file to every stored message
    Process {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Validate a rule file and print what it contains
    CheckRules {
        #[command(flatten)]
        config: ConfigArg,

        /// Rules file to check instead of the configured one
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

impl Commands {
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Commands::InitDb { config }
            | Commands::Fetch { config }
            | Commands::Process { config }
            | Commands::CheckRules { config, .. } => &config.path,
        }
    }
}
