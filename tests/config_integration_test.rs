//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use cohort::config::{default_config_template, load_config, CohortConfig};
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("COHORT_APPLICATION_LOG_LEVEL");
    std::env::remove_var("COHORT_APPLICATION_YES_TO_ALL");
    std::env::remove_var("COHORT_SELECTION_MARKER");
    std::env::remove_var("COHORT_PATHS_LOG_DIR");
    std::env::remove_var("COHORT_ANONYMIZATION_SIMILARITY_THRESHOLD");
    std::env::remove_var("TEST_COHORT_MARKER");
}

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = r#"
[application]
log_level = "debug"
yes_to_all = true

[paths]
log_dir = "run-logs"
selection_dir = "picked"
dictionary = "run-logs/dict.json"

[anonymization]
only_dirs = false
similarity_check = true
similarity_threshold = 0.8

[conversion]
cleanup = false

[selection]
marker = "FLAIR"

[logging]
local_enabled = false
local_path = "run-logs"
local_rotation = "never"
"#;
    let temp_file = write_temp_config(toml_content);

    let config = load_config(temp_file.path()).unwrap();
    assert_eq!(config.application.log_level, "debug");
    assert!(config.application.yes_to_all);
    assert_eq!(config.paths.log_dir, "run-logs");
    assert_eq!(config.paths.dictionary.as_deref(), Some("run-logs/dict.json"));
    assert!(!config.anonymization.only_dirs);
    assert_eq!(config.anonymization.similarity_threshold, 0.8);
    assert!(!config.conversion.cleanup);
    assert_eq!(config.selection.marker, "FLAIR");
    assert!(!config.logging.local_enabled);
}

#[test]
fn test_partial_config_gets_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_temp_config("[selection]\nmarker = \"T2\"\n");
    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.selection.marker, "T2");
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.paths.log_dir, "logs");
    assert!(config.anonymization.only_dirs);
    assert_eq!(config.anonymization.similarity_threshold, 0.7);
    assert!(config.conversion.cleanup);
}

#[test]
fn test_env_overrides_take_precedence() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    std::env::set_var("COHORT_SELECTION_MARKER", "T2");
    std::env::set_var("COHORT_PATHS_LOG_DIR", "/tmp/cohort-logs");
    std::env::set_var("COHORT_ANONYMIZATION_SIMILARITY_THRESHOLD", "0.9");

    let temp_file = write_temp_config("[selection]\nmarker = \"T1\"\n");
    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.selection.marker, "T2");
    assert_eq!(config.paths.log_dir, "/tmp/cohort-logs");
    assert_eq!(config.anonymization.similarity_threshold, 0.9);

    cleanup_env_vars();
}

#[test]
fn test_env_var_substitution() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    std::env::set_var("TEST_COHORT_MARKER", "DTI");
    let temp_file = write_temp_config("[selection]\nmarker = \"${TEST_COHORT_MARKER}\"\n");

    let config = load_config(temp_file.path()).unwrap();
    assert_eq!(config.selection.marker, "DTI");

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable_fails() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_temp_config("[selection]\nmarker = \"${COHORT_NOT_SET_ANYWHERE}\"\n");
    let result = load_config(temp_file.path());
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("COHORT_NOT_SET_ANYWHERE"));
}

#[test]
fn test_invalid_values_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_temp_config("[application]\nlog_level = \"shout\"\n");
    assert!(load_config(temp_file.path()).is_err());

    let temp_file = write_temp_config("[anonymization]\nsimilarity_threshold = -0.1\n");
    assert!(load_config(temp_file.path()).is_err());

    let temp_file = write_temp_config("[selection]\nmarker = \"\"\n");
    assert!(load_config(temp_file.path()).is_err());
}

#[test]
fn test_malformed_toml_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_temp_config("selection = marker = nonsense");
    let result = load_config(temp_file.path());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("parse"));
}

#[test]
fn test_default_template_round_trips() {
    let _guard = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_temp_config(&default_config_template());
    let config = load_config(temp_file.path()).unwrap();

    let defaults = CohortConfig::default();
    assert_eq!(config.selection.marker, defaults.selection.marker);
    assert_eq!(config.paths.log_dir, defaults.paths.log_dir);
    assert_eq!(
        config.anonymization.similarity_threshold,
        defaults.anonymization.similarity_threshold
    );
}
