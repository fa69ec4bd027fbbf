//! Configuration schema definitions
//!
//! Serde-backed structs for the `cohort.toml` configuration file. Every
//! section validates itself; [`CohortConfig::validate`] walks them all.

use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CohortConfig {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub anonymization: AnonymizationConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CohortConfig {
    /// Validates the entire configuration
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field found.
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.anonymization.validate()?;
        self.selection.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// General application behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level filter: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Skip every interactive confirmation
    #[serde(default)]
    pub yes_to_all: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid application.log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            yes_to_all: false,
        }
    }
}

/// Where run artifacts live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for logs and run artifacts
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Destination for the gathered sequence selection
    #[serde(default = "default_selection_dir")]
    pub selection_dir: String,

    /// Explicit alias dictionary path; well-known locations are probed
    /// when unset
    #[serde(default)]
    pub dictionary: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            selection_dir: default_selection_dir(),
            dictionary: None,
        }
    }
}

/// Anonymization behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Rename directories only, leave image contents alone
    #[serde(default = "default_true")]
    pub only_dirs: bool,

    /// Verify embedded patient names against directory names
    #[serde(default = "default_true")]
    pub similarity_check: bool,

    /// Similarity floor in [0, 1] for the embedded-name check
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl AnonymizationConfig {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "anonymization.similarity_threshold must be within [0.0, 1.0], got {}",
                self.similarity_threshold
            ));
        }
        Ok(())
    }
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            only_dirs: true,
            similarity_check: true,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Conversion behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Delete DICOM originals after successful conversion
    #[serde(default = "default_true")]
    pub cleanup: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self { cleanup: true }
    }
}

/// Sequence selection behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Case-insensitive substring that selects sequences, e.g. "T1"
    #[serde(default = "default_selection_marker")]
    pub marker: String,
}

impl SelectionConfig {
    fn validate(&self) -> Result<(), String> {
        if self.marker.trim().is_empty() {
            return Err("selection.marker must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            marker: default_selection_marker(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Directory that receives the rotated log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_selection_dir() -> String {
    "selection".to_string()
}

fn default_similarity_threshold() -> f64 {
    0.7
}

fn default_selection_marker() -> String {
    "T1".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_true() -> bool {
    true
}
