//! Domain models and types for Cohort.
//!
//! This module contains the core domain models, types, and business rules.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Error types** ([`CohortError`])
//! - **Result type alias** ([`Result`])
//! - **Patient directory model** ([`PatientDirectory`], [`MarkerKind`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CohortError>`]:
//!
//! ```rust
//! use cohort::domain::{CohortError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(CohortError::UnknownPatient("Doe J".to_string()))
//! }
//! ```
//!
//! Per-item failures (one image, one patient) are caught and counted by the
//! batch loops; structural and safety failures ([`CohortError::CorruptStore`],
//! [`CohortError::NameCollision`]) propagate and stop the run. See
//! [`CohortError::is_fatal`].

pub mod errors;
pub mod patient;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::CohortError;
pub use patient::{MarkerKind, PatientDirectory};
pub use result::Result;
