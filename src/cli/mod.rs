pub mod onboard;

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "MoodMirror",
    about = "Weekly Mood Insight & Caregiver Report System"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive first-time setup
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Store daily logs from a JSON file
    Import {
        #[arg(long)]
        file: PathBuf,
        /// User id for entries that do not carry one
        #[arg(long)]
        user: Option<String>,
    },
    /// Run the weekly analysis on a JSON file and print the summary
    Analyze {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        user: String,
        /// Last day of the window (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,
    },
    /// Generate weekly reports from stored logs
    #[command(group(
        ArgGroup::new("scope")
            .args(["user", "all_users"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = false)]
        all_users: bool,
        #[arg(long)]
        end: Option<String>,
    },
    Status,
    Doctor,
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}
