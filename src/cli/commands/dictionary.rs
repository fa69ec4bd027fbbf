//! Dictionary command implementation
//!
//! Prints the persisted alias dictionary as a table.

use super::{load_config_or_default, EXIT_CONFIG};
use crate::core::alias::store::{AliasStore, DICTIONARY_FILE_NAME};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the dictionary command
#[derive(Args, Debug)]
pub struct DictionaryArgs {
    /// Dictionary file to print; defaults to the configured path, then the
    /// log directory, then the working directory
    pub path: Option<PathBuf>,
}

impl DictionaryArgs {
    /// Execute the dictionary command
    pub fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let mut candidates = Vec::new();
        if let Some(path) = &self.path {
            candidates.push(path.clone());
        } else {
            if let Some(path) = &config.paths.dictionary {
                candidates.push(PathBuf::from(path));
            }
            candidates.push(PathBuf::from(&config.paths.log_dir).join(DICTIONARY_FILE_NAME));
            candidates.push(PathBuf::from(DICTIONARY_FILE_NAME));
        }

        let Some(found) = candidates.iter().find(|p| p.is_file()) else {
            eprintln!("No dictionary found. Looked at:");
            for candidate in &candidates {
                eprintln!("  {}", candidate.display());
            }
            return Ok(EXIT_CONFIG);
        };

        let store = AliasStore::load(found)?;
        tracing::info!(path = %found.display(), entries = store.len(), "Dictionary loaded");
        println!("{}", store.render_table());
        Ok(0)
    }
}
