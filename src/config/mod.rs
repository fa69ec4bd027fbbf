//! Configuration management for Cohort.
//!
//! TOML-based configuration loading, parsing, and validation with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `COHORT_<SECTION>_<KEY>` environment overrides
//! - Default values for every optional setting
//! - Per-section validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cohort::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cohort.toml")?;
//! println!("Selection marker: {}", config.selection.marker);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [paths]
//! log_dir = "logs"
//! selection_dir = "selection"
//!
//! [anonymization]
//! only_dirs = true
//! similarity_threshold = 0.7
//!
//! [selection]
//! marker = "T1"
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{default_config_template, load_config};
pub use schema::{
    AnonymizationConfig, ApplicationConfig, CohortConfig, ConversionConfig, LoggingConfig,
    PathsConfig, SelectionConfig,
};
