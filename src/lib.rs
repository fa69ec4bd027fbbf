//! # Cohort - clinical MRI dataset preparation
//!
//! Cohort is a batch pipeline that turns raw per-patient DICOM exports into
//! an anonymized, PNG-based dataset ready for machine learning.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Discovering** DICOM files by content sniffing, not extension
//! - **Validating** and repairing the `root/<class>/<patient>` layout
//! - **Anonymizing** patient directories against a persistent alias dictionary
//! - **Converting** DICOM images to PNG, decompressing when needed
//! - **Gathering** a sequence selection into a training tree
//!
//! ## Architecture
//!
//! Cohort follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (scan, validate, alias, anonymize, convert, pipeline)
//! - [`domain`] - Core domain types and errors
//! - [`interact`] - Human-in-the-loop confirmation checkpoints
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cohort::core::pipeline::{Pipeline, PipelineOptions};
//! use cohort::core::scan::Scanner;
//! use cohort::interact::AcceptAll;
//! use std::path::PathBuf;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut selector = AcceptAll;
//!     let mut pipeline = Pipeline::new(
//!         Scanner::new(),
//!         PipelineOptions::default(),
//!         &mut selector,
//!     );
//!     let report = pipeline.run(&[PathBuf::from("/data/mri")])?;
//!     println!("{}", report.render());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Cohort uses the [`domain::CohortError`] type for all errors. Batch loops
//! catch non-fatal, per-item errors ([`domain::CohortError::is_fatal`]) and
//! keep going; structural and safety errors propagate with `?`.
//!
//! ## Logging
//!
//! Cohort uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!("Starting preparation");
//! warn!(patient = "Subject3", "No matching sequences");
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod interact;
pub mod logging;
