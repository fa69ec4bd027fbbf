//! Check command implementation
//!
//! Surveys a dataset root for structure violations and optionally repairs
//! the mechanical ones.

use super::{
    load_config_or_default, pipeline_options, selector_for, EXIT_CONFIG, EXIT_STRUCTURE,
};
use crate::core::pipeline::Pipeline;
use crate::core::scan::Scanner;
use crate::core::validate::DirectoryValidator;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Dataset root to survey (root/<class>/<patient>)
    pub root: PathBuf,

    /// Repair mechanical violations: strip class prefixes from patient
    /// names, relocate misplaced markers, remove imageless ones, and
    /// convert auxiliary directories
    #[arg(long)]
    pub repair: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(root = %self.root.display(), repair = self.repair, "Checking structure");

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let scanner = Scanner::new();
        let validator = DirectoryValidator::new(scanner.clone());
        let survey = validator.survey(&self.root)?;
        println!("{}", survey.render());

        if survey.is_clean() {
            println!("Directory structure is clean.");
            return Ok(0);
        }
        if !self.repair {
            return Ok(EXIT_STRUCTURE);
        }

        let mut selector = selector_for(&config, self.yes);
        let mut pipeline = Pipeline::new(scanner, pipeline_options(&config), selector.as_mut());
        let (summary, after) = pipeline.repair_structure(&self.root)?;

        println!(
            "Repaired: {} renames, {} markers relocated, {} markers removed.",
            summary.renamed.len(),
            summary.relocated_markers.len(),
            summary.removed_markers.len()
        );
        println!("{}", after.render());
        if after.is_clean() {
            println!("Directory structure is clean.");
            Ok(0)
        } else {
            println!("Violations remain that need manual attention.");
            Ok(EXIT_STRUCTURE)
        }
    }
}
