use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a subtitle file
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Target language name used in the prompt
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Source language name used in the prompt
        #[arg(short, long)]
        source_lang: Option<String>,

        /// Entries per request
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Completion model identifier
        #[arg(short, long)]
        model: Option<String>,

        /// Rewrite input ids to 1..n before translating
        #[arg(long)]
        renumber: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Destination path
        #[arg(short, long, default_value = "subtran.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}
