//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Sync disease-level ICD entities (leaf nodes) from the WHO API into a local database
#[derive(Parser, Debug)]
#[command(name = "icdsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log verbosity: -d info, -dd debug, -ddd trace
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub debug: u8,

    /// Config file (layered over the global config)
    #[arg(
        short,
        long,
        global = true,
        env = "ICDSYNC_CONFIG",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync disease leaves from the root entity into the database
    Sync,

    /// Test API connection: get a token, fetch the root entity
    Test,

    /// Show a stored entity with its stored parent and children
    Show {
        /// WHO entity id
        who_id: u64,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create global config template
    Init,

    /// Show config paths
    Path,
}
