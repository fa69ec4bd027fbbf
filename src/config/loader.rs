//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CohortConfig;
use crate::domain::errors::CohortError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CohortConfig
/// 4. Applies environment variable overrides (COHORT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use cohort::config::loader::load_config;
///
/// let config = load_config("cohort.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CohortConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CohortError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CohortError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    // Perform environment variable substitution
    let contents = substitute_env_vars(&contents)?;

    // Parse TOML
    let mut config: CohortConfig = toml::from_str(&contents)
        .map_err(|e| CohortError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    // Apply environment variable overrides
    apply_env_overrides(&mut config);

    // Validate configuration
    config.validate().map_err(|e| {
        CohortError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    // Process line by line to skip comments
    for line in input.lines() {
        let trimmed = line.trim_start();

        // Skip comment lines - don't process env vars in comments
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CohortError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using COHORT_* prefix
///
/// Environment variables follow the pattern: COHORT_<SECTION>_<KEY>
/// For example: COHORT_SELECTION_MARKER, COHORT_PATHS_LOG_DIR
fn apply_env_overrides(config: &mut CohortConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("COHORT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("COHORT_APPLICATION_YES_TO_ALL") {
        config.application.yes_to_all = val.parse().unwrap_or(false);
    }

    // Paths overrides
    if let Ok(val) = std::env::var("COHORT_PATHS_LOG_DIR") {
        config.paths.log_dir = val;
    }
    if let Ok(val) = std::env::var("COHORT_PATHS_SELECTION_DIR") {
        config.paths.selection_dir = val;
    }
    if let Ok(val) = std::env::var("COHORT_PATHS_DICTIONARY") {
        config.paths.dictionary = Some(val);
    }

    // Anonymization overrides
    if let Ok(val) = std::env::var("COHORT_ANONYMIZATION_ONLY_DIRS") {
        config.anonymization.only_dirs = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("COHORT_ANONYMIZATION_SIMILARITY_CHECK") {
        config.anonymization.similarity_check = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("COHORT_ANONYMIZATION_SIMILARITY_THRESHOLD") {
        if let Ok(threshold) = val.parse() {
            config.anonymization.similarity_threshold = threshold;
        }
    }

    // Conversion overrides
    if let Ok(val) = std::env::var("COHORT_CONVERSION_CLEANUP") {
        config.conversion.cleanup = val.parse().unwrap_or(true);
    }

    // Selection overrides
    if let Ok(val) = std::env::var("COHORT_SELECTION_MARKER") {
        config.selection.marker = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("COHORT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("COHORT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("COHORT_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}

/// Renders the commented default configuration written by `cohort init`.
pub fn default_config_template() -> String {
    r#"# Cohort configuration
#
# Every value below shows its default. Any key may also be overridden
# with a COHORT_<SECTION>_<KEY> environment variable, and values may
# reference environment variables with ${VAR} syntax.

[application]
# Log level: trace, debug, info, warn, error
log_level = "info"
# Skip every interactive confirmation
yes_to_all = false

[paths]
# Directory for logs and run artifacts
log_dir = "logs"
# Destination for the gathered sequence selection
selection_dir = "selection"
# Explicit alias dictionary path; well-known locations are probed when unset
# dictionary = "logs/patient_dictionary.json"

[anonymization]
# Rename directories only, leave image contents alone
only_dirs = true
# Verify embedded patient names against directory names
similarity_check = true
# Similarity floor in [0, 1] for the embedded-name check
similarity_threshold = 0.7

[conversion]
# Delete DICOM originals after successful conversion
cleanup = true

[selection]
# Case-insensitive substring that selects sequences
marker = "T1"

[logging]
local_enabled = true
local_path = "logs"
# Rotation: daily, hourly, never
local_rotation = "daily"
"#
    .to_string()
}
