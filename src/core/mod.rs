//! Core business logic for Cohort.
//!
//! The stages of dataset preparation, in the order the pipeline runs them:
//!
//! - [`scan`] — filesystem discovery and DICOM content sniffing
//! - [`validate`] — structure validation and repair
//! - [`alias`] — the persistent name-to-alias dictionary
//! - [`anonymize`] — directory/image anonymization and its artifacts
//! - [`convert`] — DICOM-to-PNG conversion and the conversion log
//! - [`pipeline`] — the end-to-end orchestrator

pub mod alias;
pub mod anonymize;
pub mod convert;
pub mod pipeline;
pub mod scan;
pub mod validate;
