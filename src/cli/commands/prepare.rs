//! Prepare command implementation
//!
//! The full dataset preparation run: structure check, anonymization,
//! conversion, restructuring, and selection gathering.

use super::{
    load_config_or_default, pipeline_options, selector_for, EXIT_ABORTED, EXIT_CONFIG,
    EXIT_PARTIAL,
};
use crate::core::pipeline::Pipeline;
use crate::core::scan::Scanner;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the prepare command
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Dataset roots (root/<class>/<patient>)
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Override the sequence-selection marker from the configuration
    #[arg(short, long)]
    pub marker: Option<String>,

    /// Keep the DICOM originals after conversion
    #[arg(long)]
    pub keep: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl PrepareArgs {
    /// Execute the prepare command
    pub fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(roots = self.roots.len(), "Preparing dataset");

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let mut selector = selector_for(&config, self.yes);

        let mut options = pipeline_options(&config);
        if let Some(marker) = &self.marker {
            options.selection_marker = marker.clone();
        }
        if self.keep {
            options.cleanup = false;
        }
        std::fs::create_dir_all(&options.log_dir)?;

        let mut pipeline = Pipeline::new(Scanner::new(), options, selector.as_mut());
        let report = pipeline.run(&self.roots)?;
        println!("{}", report.render());

        if report.aborted {
            Ok(EXIT_ABORTED)
        } else if report.is_complete_success() {
            Ok(0)
        } else {
            Ok(EXIT_PARTIAL)
        }
    }
}
