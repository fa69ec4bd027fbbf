//! Init command implementation
//!
//! Generates a commented default configuration file.

use super::{EXIT_CONFIG, EXIT_FATAL};
use crate::config::default_config_template;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "cohort.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("Use --force to overwrite.");
            return Ok(EXIT_CONFIG);
        }

        match fs::write(&self.output, default_config_template()) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Survey a dataset: cohort check <root>");
                println!("  3. Run the full preparation: cohort prepare <root>");
                Ok(0)
            }
            Err(e) => {
                eprintln!("Failed to write configuration file: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }
}
