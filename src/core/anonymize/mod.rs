//! Patient anonymization
//!
//! [`engine`] drives the run state machine; [`artifacts`] owns the text
//! artifacts a finished run leaves behind, including the conversion-log
//! anonymization pass.

pub mod artifacts;
pub mod engine;

pub use artifacts::{
    anonymize_conversion_log, FAILED_FILE_NAME, PATIENT_ALIASES_FILE_NAME, PATIENT_LOG_FILE_NAME,
};
pub use engine::{Anonymizer, AnonymizerOptions, RunOutcome, RunState, SIMILARITY_THRESHOLD};
