//! Domain error types
//!
//! This module defines the error hierarchy for Cohort. All errors are
//! domain-specific and don't expose third-party types.

use std::path::PathBuf;
use thiserror::Error;

/// Main Cohort error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CohortError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Argument refers to a nonexistent filesystem entry
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// Persisted alias dictionary is unreadable or malformed
    #[error("Corrupt alias dictionary: {0}")]
    CorruptStore(String),

    /// Alias lookup miss for a patient name
    #[error("Unknown patient: {0}")]
    UnknownPatient(String),

    /// Anonymization safety check tripped for a single image
    #[error(
        "Similarity check failed: \"{embedded}\" vs \"{expected}\" scored {score:.2}, below {threshold:.2}"
    )]
    SimilarityMismatch {
        embedded: String,
        expected: String,
        score: f64,
        threshold: f64,
    },

    /// Rename target already exists; the alias mapping is unsafe to trust
    #[error("Rename target already exists: {}", .0.display())]
    NameCollision(PathBuf),

    /// DICOM read/write errors
    #[error("DICOM error: {0}")]
    Dicom(String),

    /// Pixel data decoding errors
    #[error("Decode error: {0}")]
    Decode(String),

    /// External decompression tool errors
    #[error("Decompression error: {0}")]
    Decompress(String),

    /// Directory structure validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// The user declined a confirmation checkpoint
    #[error("Aborted by user: {0}")]
    Aborted(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl CohortError {
    /// Whether this error aborts the whole run, as opposed to a single item.
    ///
    /// Per-item errors are caught, counted, and logged by batch loops;
    /// structural and safety errors propagate and stop the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CohortError::UnknownPatient(_)
                | CohortError::SimilarityMismatch { .. }
                | CohortError::Decode(_)
                | CohortError::Decompress(_)
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CohortError {
    fn from(err: std::io::Error) -> Self {
        CohortError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CohortError {
    fn from(err: serde_json::Error) -> Self {
        CohortError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CohortError {
    fn from(err: toml::de::Error) -> Self {
        CohortError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from DICOM object read errors
impl From<dicom_object::ReadError> for CohortError {
    fn from(err: dicom_object::ReadError) -> Self {
        CohortError::Dicom(err.to_string())
    }
}

// Conversion from DICOM object write errors
impl From<dicom_object::WriteError> for CohortError {
    fn from(err: dicom_object::WriteError) -> Self {
        CohortError::Dicom(err.to_string())
    }
}
