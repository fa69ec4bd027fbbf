//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Cohort using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Cohort - clinical MRI dataset preparation
#[derive(Parser, Debug)]
#[command(name = "cohort")]
#[command(version, about, long_about = None)]
#[command(author = "Cohort Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cohort.toml", env = "COHORT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "COHORT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full dataset preparation pipeline
    Prepare(commands::prepare::PrepareArgs),

    /// Survey (and optionally repair) the directory structure
    Check(commands::check::CheckArgs),

    /// Rename patient directories to their aliases
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Convert patient directories of DICOM images to PNG
    Convert(commands::convert::ConvertArgs),

    /// Print the persisted alias dictionary
    Dictionary(commands::dictionary::DictionaryArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
