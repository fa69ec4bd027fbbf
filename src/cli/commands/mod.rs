//! CLI command implementations

pub mod anonymize;
pub mod check;
pub mod convert;
pub mod dictionary;
pub mod init;
pub mod prepare;

use crate::config::{load_config, CohortConfig};
use crate::core::pipeline::PipelineOptions;
use crate::interact::{AcceptAll, Console, Selector};
use std::path::{Path, PathBuf};

/// Exit code for runs with per-item failures.
pub const EXIT_PARTIAL: i32 = 1;
/// Exit code for configuration errors.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for unresolved structure violations.
pub const EXIT_STRUCTURE: i32 = 3;
/// Exit code for runs the user aborted at a checkpoint.
pub const EXIT_ABORTED: i32 = 4;
/// Exit code for fatal errors.
pub const EXIT_FATAL: i32 = 5;

/// Load the configuration file, falling back to defaults when it does not
/// exist. An absent file is normal; a broken one is a hard error.
pub(crate) fn load_config_or_default(path: &str) -> crate::domain::Result<CohortConfig> {
    if Path::new(path).exists() {
        load_config(path)
    } else {
        tracing::debug!(path, "No configuration file, using defaults");
        Ok(CohortConfig::default())
    }
}

/// The selector the commands run with: non-interactive when the user opted
/// out of confirmations, the console menu otherwise.
pub(crate) fn selector_for(config: &CohortConfig, assume_yes: bool) -> Box<dyn Selector> {
    if assume_yes || config.application.yes_to_all {
        Box::new(AcceptAll)
    } else {
        Box::new(Console::new())
    }
}

/// Map the relevant configuration sections onto pipeline options.
pub(crate) fn pipeline_options(config: &CohortConfig) -> PipelineOptions {
    PipelineOptions {
        log_dir: PathBuf::from(&config.paths.log_dir),
        dictionary: config.paths.dictionary.as_ref().map(PathBuf::from),
        selection_marker: config.selection.marker.clone(),
        selection_dir: PathBuf::from(&config.paths.selection_dir),
        cleanup: config.conversion.cleanup,
        only_dirs: config.anonymization.only_dirs,
        similarity_check: config.anonymization.similarity_check,
        similarity_threshold: config.anonymization.similarity_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let config = load_config_or_default("does-not-exist.toml").unwrap();
        assert_eq!(config.selection.marker, "T1");
    }

    #[test]
    fn test_pipeline_options_from_config() {
        let mut config = CohortConfig::default();
        config.selection.marker = "FLAIR".to_string();
        config.conversion.cleanup = false;
        config.paths.dictionary = Some("dict.json".to_string());
        config.anonymization.similarity_threshold = 0.85;

        let options = pipeline_options(&config);
        assert_eq!(options.selection_marker, "FLAIR");
        assert!(!options.cleanup);
        assert_eq!(options.dictionary, Some(PathBuf::from("dict.json")));
        assert_eq!(options.similarity_threshold, 0.85);
    }
}
