//! Conversion log generated from marker files
//!
//! PNG names carry no patient identity, so the link between subjects and
//! their studies survives only here: one text block per patient, built from
//! the patient's `DICOMDIR` records. The block layout (sentinel rows of
//! dashes around `PATIENT INFO` / `STUDY INFO` / `SERIES` headings) is relied
//! on by the anonymization pass, which rewrites names block by block.

use crate::domain::{CohortError, Result};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{open_file, InMemDicomObject};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONVERSION_LOG_FILE_NAME: &str = "conversion_log.txt";

/// The sentinel unit: nine dashes.
pub const DOTS: &str = "---------";

const SPACE: &str = "          ";

const PATIENT_FIELDS: [(&str, Tag); 4] = [
    ("Patient's Name", tags::PATIENT_NAME),
    ("Patient ID", tags::PATIENT_ID),
    ("Patient's Birth Date", tags::PATIENT_BIRTH_DATE),
    ("Patient's Sex", tags::PATIENT_SEX),
];

const STUDY_FIELDS: [(&str, Tag); 4] = [
    ("Study Date", tags::STUDY_DATE),
    ("Study Time", tags::STUDY_TIME),
    ("Study Description", tags::STUDY_DESCRIPTION),
    ("Accession Number", tags::ACCESSION_NUMBER),
];

const SERIES_FIELDS: [(&str, Tag); 6] = [
    ("Modality", tags::MODALITY),
    ("Series Number", tags::SERIES_NUMBER),
    ("Series Description", tags::SERIES_DESCRIPTION),
    ("Series Date", tags::SERIES_DATE),
    ("Series Time", tags::SERIES_TIME),
    ("Protocol Name", tags::PROTOCOL_NAME),
];

/// Accumulates one log block per patient.
#[derive(Debug, Default)]
pub struct ConversionLog {
    entries: Vec<String>,
}

impl ConversionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Read a marker file and append its patient block.
    pub fn add_patient(&mut self, marker: &Path) -> Result<()> {
        if !marker.is_file() {
            return Err(CohortError::InvalidPath(marker.to_path_buf()));
        }
        let obj = open_file(marker)?;
        let records = obj
            .element(tags::DIRECTORY_RECORD_SEQUENCE)
            .map_err(|e| CohortError::Dicom(format!("no directory record sequence: {e}")))?;
        let items = records.items().ok_or_else(|| {
            CohortError::Dicom("directory record sequence holds no items".to_string())
        })?;

        let mut patient_lines = Vec::new();
        let mut study_lines = Vec::new();
        let mut series = Vec::new();
        for item in items {
            match record_type(item).as_deref() {
                Some("PATIENT") => patient_lines = field_lines(item, &PATIENT_FIELDS),
                Some("STUDY") => study_lines = field_lines(item, &STUDY_FIELDS),
                Some("SERIES") => series.push(field_lines(item, &SERIES_FIELDS)),
                _ => {}
            }
        }

        let block = render_block(&patient_lines, &study_lines, &series);
        debug!(marker = %marker.display(), series = series.len(), "Built log block");
        self.entries.push(block);
        Ok(())
    }

    /// Append the most recent block to `conversion_log.txt` under `log_dir`.
    pub fn append_last(&self, log_dir: &Path) -> Result<PathBuf> {
        let entry = self
            .entries
            .last()
            .ok_or_else(|| CohortError::Validation("conversion log is empty".to_string()))?;
        let path = log_dir.join(CONVERSION_LOG_FILE_NAME);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file)?;
        file.write_all(entry.as_bytes())?;
        Ok(path)
    }

    /// Write every block to `conversion_log.txt` under `log_dir`,
    /// replacing any previous file.
    pub fn write_all(&self, log_dir: &Path) -> Result<PathBuf> {
        let path = log_dir.join(CONVERSION_LOG_FILE_NAME);
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(entry);
            out.push_str("\n\n");
        }
        std::fs::write(&path, out)?;
        info!(path = %path.display(), patients = self.entries.len(), "Wrote conversion log");
        Ok(path)
    }
}

fn record_type(item: &InMemDicomObject) -> Option<String> {
    item.element(tags::DIRECTORY_RECORD_TYPE)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim().to_string())
}

fn field_lines(item: &InMemDicomObject, fields: &[(&str, Tag)]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|(label, tag)| {
            item.element(*tag)
                .ok()
                .and_then(|e| e.to_str().ok())
                .map(|v| format!("{label}: {}", v.trim()))
        })
        .collect()
}

/// Assemble the patient block with its sentinel headings.
fn render_block(patient: &[String], study: &[String], series: &[Vec<String>]) -> String {
    let mut parts = Vec::new();

    let mut patient_part = vec![format!("{} PATIENT INFO {}", DOTS.repeat(4), DOTS.repeat(4))];
    patient_part.extend(patient.iter().cloned());
    parts.push(patient_part.join("\n"));

    let mut study_part = vec![format!("{} STUDY INFO {}", DOTS.repeat(4), DOTS.repeat(4))];
    study_part.extend(study.iter().cloned());
    parts.push(study_part.join("\n"));

    for (i, lines) in series.iter().enumerate() {
        let mut series_part = vec![
            format!("{} SERIES INFO {}", DOTS.repeat(4), DOTS.repeat(4)),
            format!(
                "{}{} SERIES {} {}",
                SPACE.repeat(2),
                DOTS.repeat(2),
                i + 1,
                DOTS.repeat(2)
            ),
        ];
        series_part.extend(lines.iter().cloned());
        parts.push(series_part.join("\n"));
    }

    let mut block = parts.join("\n");
    block.push('\n');
    block
}
