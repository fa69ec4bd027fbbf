//! Anonymize command implementation
//!
//! Runs the alias-based anonymization pass on its own: resolve the
//! dictionary, reconcile it with the patient directories, rename.

use super::{
    load_config_or_default, selector_for, EXIT_ABORTED, EXIT_CONFIG, EXIT_PARTIAL,
};
use crate::core::anonymize::{Anonymizer, AnonymizerOptions};
use crate::core::scan::Scanner;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Class directories whose subdirectories are patients
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Explicit alias dictionary path
    #[arg(short, long)]
    pub dictionary: Option<PathBuf>,

    /// Also rewrite the Patient's Name element of every image into an
    /// _anon side file
    #[arg(long)]
    pub images: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl AnonymizeArgs {
    /// Execute the anonymize command
    pub fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(roots = self.roots.len(), "Anonymizing patient directories");

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let mut selector = selector_for(&config, self.yes);

        let log_dir = PathBuf::from(&config.paths.log_dir);
        let dictionary = self
            .dictionary
            .clone()
            .or_else(|| config.paths.dictionary.as_ref().map(PathBuf::from));

        let store = Anonymizer::resolve_store(
            dictionary.as_deref(),
            &self.roots,
            &log_dir,
            selector.as_mut(),
        )?;
        let mut anonymizer = Anonymizer::new(
            store,
            Scanner::new(),
            AnonymizerOptions {
                only_dirs: !self.images && config.anonymization.only_dirs,
                similarity_check: config.anonymization.similarity_check,
                similarity_threshold: config.anonymization.similarity_threshold,
                log_dir,
            },
        );

        anonymizer.prepare(&self.roots, selector.as_mut())?;
        let outcome = anonymizer.run(&self.roots, selector.as_mut())?;
        if outcome.aborted {
            println!("Aborted, nothing was changed.");
            return Ok(EXIT_ABORTED);
        }

        println!("{}", anonymizer.store().render_table());
        println!(
            "{:<40} {}",
            "Patients anonymized:", outcome.renamed
        );
        println!(
            "{:<40} {}",
            "Dictionary's total entries:", outcome.current_entries
        );
        if !outcome.stats.failed.is_empty() {
            println!(
                "{:<40} {}",
                "Images that failed:", outcome.stats.failed.len()
            );
            return Ok(EXIT_PARTIAL);
        }
        Ok(0)
    }
}
