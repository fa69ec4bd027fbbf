//! Patient directory model
//!
//! A patient directory is one filesystem directory representing a single
//! patient. It is discovered by the scanner, judged by the validator, renamed
//! by the anonymizer, and finally restructured by the pipeline.

use std::path::{Path, PathBuf};

/// One patient's directory, as observed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientDirectory {
    /// Absolute path of the directory
    pub path: PathBuf,

    /// Directory name before anonymization
    pub raw_name: String,

    /// Depth of the directory relative to the scan root
    pub depth: usize,

    /// Non-auxiliary marker files found under this directory
    pub markers: Vec<PathBuf>,

    /// Auxiliary-scan markers (segregated handling)
    pub aux_markers: Vec<PathBuf>,

    /// Whether any DICOM image was found under this directory
    pub has_images: bool,
}

impl PatientDirectory {
    /// Create a patient directory record from an absolute path.
    ///
    /// `depth` is the number of path components between the scan root and
    /// this directory.
    pub fn new(path: impl Into<PathBuf>, depth: usize) -> Self {
        let path = path.into();
        let raw_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            raw_name,
            depth,
            markers: Vec::new(),
            aux_markers: Vec::new(),
            has_images: false,
        }
    }

    /// Number of markers after auxiliary ones are filtered out.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// The single marker file, when exactly one non-auxiliary marker exists.
    pub fn sole_marker(&self) -> Option<&Path> {
        if self.markers.len() == 1 {
            self.markers.first().map(|p| p.as_path())
        } else {
            None
        }
    }
}

/// Kind of marker file found under a patient directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Primary imaging manifest (MRI)
    Primary,
    /// Auxiliary-scan manifest, distinguished by naming convention
    Auxiliary,
}

impl MarkerKind {
    /// Classify a marker by the name of the directory that holds it.
    ///
    /// Auxiliary scans live in directories carrying a "dat" token, per the
    /// dataset's naming convention.
    pub fn of(marker_path: &Path) -> Self {
        let parent_name = marker_path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if parent_name.contains("dat") {
            MarkerKind::Auxiliary
        } else {
            MarkerKind::Primary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_directory_name() {
        let patient = PatientDirectory::new("/data/PD/D1. Doe John", 2);
        assert_eq!(patient.raw_name, "D1. Doe John");
        assert_eq!(patient.depth, 2);
        assert_eq!(patient.marker_count(), 0);
        assert!(!patient.has_images);
    }

    #[test]
    fn test_sole_marker() {
        let mut patient = PatientDirectory::new("/data/PD/Doe John", 2);
        assert!(patient.sole_marker().is_none());

        patient.markers.push(PathBuf::from("/data/PD/Doe John/DICOMDIR"));
        assert!(patient.sole_marker().is_some());

        patient
            .markers
            .push(PathBuf::from("/data/PD/Doe John/MRI/DICOMDIR"));
        assert!(patient.sole_marker().is_none());
    }

    #[test]
    fn test_marker_kind_primary() {
        let kind = MarkerKind::of(Path::new("/data/PD/Doe John/DICOMDIR"));
        assert_eq!(kind, MarkerKind::Primary);
    }

    #[test]
    fn test_marker_kind_auxiliary() {
        let kind = MarkerKind::of(Path::new("/data/PD/Doe John/DaT Scan/DICOMDIR"));
        assert_eq!(kind, MarkerKind::Auxiliary);
    }
}
