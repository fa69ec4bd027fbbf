//! Run artifacts: alias tables, failure lists, and the conversion-log pass
//!
//! The alias table format is load-bearing: names occupy a fixed 40-column
//! field with the alias after it, and the conversion-log anonymization pass
//! reads the mapping back by splitting each line at column 40.

use crate::domain::{CohortError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PATIENT_ALIASES_FILE_NAME: &str = "patient_aliases.txt";
pub const PATIENT_LOG_FILE_NAME: &str = "patient_log.txt";
pub const FAILED_FILE_NAME: &str = "failed_dicom.txt";

const NAME_COLUMN_WIDTH: usize = 40;

/// Write a name-to-alias table in the fixed-width format.
pub fn write_alias_table(path: &Path, pairs: &[(String, String)]) -> Result<()> {
    let mut out = format!("{:<NAME_COLUMN_WIDTH$}{}\n", "Patient Name", "Patient Alias");
    for (name, alias) in pairs {
        out.push_str(&format!("{name:<NAME_COLUMN_WIDTH$}{alias}\n"));
    }
    fs::write(path, out)?;
    info!(path = %path.display(), entries = pairs.len(), "Wrote alias table");
    Ok(())
}

/// Read a fixed-width alias table back, skipping the header line.
pub fn read_alias_table(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.is_file() {
        return Err(CohortError::InvalidPath(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    let mut pairs = Vec::new();
    for line in contents.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let (name, alias) = if line.chars().count() > NAME_COLUMN_WIDTH {
            let split: String = line.chars().take(NAME_COLUMN_WIDTH).collect();
            let rest: String = line.chars().skip(NAME_COLUMN_WIDTH).collect();
            (split.trim_end().to_string(), rest.trim().to_string())
        } else {
            (line.trim_end().to_string(), String::new())
        };
        if !name.is_empty() && !alias.is_empty() {
            pairs.push((name, alias));
        }
    }
    Ok(pairs)
}

/// Write the list of images that failed anonymization. No file when empty.
pub fn write_failed(path: &Path, failed: &[PathBuf]) -> Result<bool> {
    if failed.is_empty() {
        return Ok(false);
    }
    let mut out = String::new();
    for p in failed {
        out.push_str(&format!("{}\n", p.display()));
    }
    fs::write(path, out)?;
    info!(path = %path.display(), entries = failed.len(), "Wrote failure list");
    Ok(true)
}

/// Rewrite a conversion log with aliases in place of real names.
///
/// The log is scanned line by line; after a `PATIENT INFO` heading the first
/// line containing a known name gets it replaced, then matching pauses until
/// the next heading. One replacement per patient block keeps incidental
/// matches in series descriptions intact.
///
/// The output lands next to the input as `<stem>_anon.txt`; the original is
/// left untouched.
pub fn anonymize_conversion_log(conv_log: &Path, alias_log: &Path) -> Result<PathBuf> {
    if !conv_log.is_file() {
        return Err(CohortError::InvalidPath(conv_log.to_path_buf()));
    }
    let pairs = read_alias_table(alias_log)?;

    let contents = fs::read_to_string(conv_log)?;
    let mut out = String::with_capacity(contents.len());
    let mut expect_patient = false;
    for line in contents.lines() {
        if line.contains("PATIENT INFO") {
            expect_patient = true;
        }
        let mut line = line.to_string();
        if expect_patient {
            for (name, alias) in &pairs {
                if line.contains(name.as_str()) {
                    line = line.replace(name.as_str(), alias);
                    debug!(alias = %alias, "Replaced patient name in log block");
                    expect_patient = false;
                    break;
                }
            }
        }
        out.push_str(&line);
        out.push('\n');
    }

    let stem = conv_log
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "conversion_log".to_string());
    let target = conv_log.with_file_name(format!("{stem}_anon.txt"));
    fs::write(&target, out)?;
    info!(path = %target.display(), "Wrote anonymized conversion log");
    Ok(target)
}
