//! Convert command implementation
//!
//! Converts patient directories of DICOM images to PNG without running the
//! rest of the pipeline.

use super::{load_config_or_default, selector_for, EXIT_CONFIG, EXIT_PARTIAL};
use crate::core::convert::{Converter, Decompressor};
use crate::core::scan::Scanner;
use crate::domain::CohortError;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Patient directories to convert
    #[arg(required = true)]
    pub patients: Vec<PathBuf>,

    /// Keep the DICOM originals after conversion
    #[arg(long)]
    pub keep: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl ConvertArgs {
    /// Execute the convert command
    pub fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(patients = self.patients.len(), "Converting to PNG");

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let mut selector = selector_for(&config, self.yes);

        let cleanup = !self.keep && config.conversion.cleanup;
        let log_dir = PathBuf::from(&config.paths.log_dir);
        std::fs::create_dir_all(&log_dir)?;

        let mut converter = Converter::new(Scanner::new(), Decompressor::probe(), cleanup);
        for patient_dir in &self.patients {
            match converter.convert_patient(patient_dir, &log_dir, selector.as_mut()) {
                Ok(()) => {}
                Err(CohortError::Validation(msg)) => {
                    tracing::warn!(patient = %patient_dir.display(), "{msg}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(path) = converter.write_compressed_report(&log_dir)? {
            println!("Compressed images listed in {}", path.display());
        }
        println!("{}", converter.render_report());

        if converter.stats().failed > 0 {
            Ok(EXIT_PARTIAL)
        } else {
            Ok(0)
        }
    }
}
