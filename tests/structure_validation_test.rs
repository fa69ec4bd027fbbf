//! Integration tests for directory structure validation and repair

use cohort::core::scan::{Scanner, MARKER_FILE_NAME};
use cohort::core::validate::DirectoryValidator;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_dicom(path: &Path) {
    let mut bytes = vec![0u8; 128];
    bytes.extend_from_slice(b"DICM");
    bytes.extend_from_slice(&[0u8; 16]);
    fs::write(path, bytes).unwrap();
}

fn make_patient(root: &Path, class: &str, name: &str) -> PathBuf {
    let dir = root.join(class).join(name);
    fs::create_dir_all(&dir).unwrap();
    write_dicom(&dir.join(MARKER_FILE_NAME));
    write_dicom(&dir.join("IM0001"));
    dir
}

fn validator() -> DirectoryValidator {
    DirectoryValidator::new(Scanner::new())
}

#[test]
fn test_clean_tree_is_clean() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    make_patient(root.path(), "NPD", "D2. Smith Jane");

    let report = validator().survey(root.path()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.ok.len(), 2);
    assert_eq!(report.expected_depth, Some(2));
}

#[test]
fn test_depth_outlier_is_flagged_not_the_majority() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    make_patient(root.path(), "PD", "D1. Smith Jane");
    make_patient(root.path(), "PD", "D1. Lee Kim");
    // one patient nests the marker a level deeper
    let deep = root.path().join("PD/D1. Park Min/scans");
    fs::create_dir_all(&deep).unwrap();
    write_dicom(&deep.join(MARKER_FILE_NAME));
    write_dicom(&deep.join("IM0001"));

    let report = validator().survey(root.path()).unwrap();
    assert_eq!(report.expected_depth, Some(2));
    assert_eq!(report.wrong_depth, vec![deep]);
    assert_eq!(report.ok.len(), 3);
}

#[test]
fn test_categories_are_exclusive() {
    let root = TempDir::new().unwrap();

    // images but no marker
    let no_marker = root.path().join("PD/D1. Doe John");
    fs::create_dir_all(&no_marker).unwrap();
    write_dicom(&no_marker.join("IM0001"));

    // no DICOM content at all
    let empty = root.path().join("PD/D1. Smith Jane");
    fs::create_dir_all(&empty).unwrap();
    fs::write(empty.join("notes.txt"), "not dicom").unwrap();

    // two markers
    let doubled = make_patient(root.path(), "PD", "D1. Lee Kim");
    let nested = doubled.join("extra");
    fs::create_dir_all(&nested).unwrap();
    write_dicom(&nested.join(MARKER_FILE_NAME));
    write_dicom(&nested.join("IM0002"));

    let report = validator().survey(root.path()).unwrap();
    assert_eq!(report.images_without_marker, vec![no_marker]);
    assert_eq!(report.missing_marker, vec![empty]);
    assert_eq!(report.multiple_markers, vec![doubled]);
    assert!(report.ok.is_empty());
}

#[test]
fn test_marker_without_images_detected() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    let bare = root.path().join("PD/D1. Smith Jane");
    fs::create_dir_all(&bare).unwrap();
    write_dicom(&bare.join(MARKER_FILE_NAME));

    let report = validator().survey(root.path()).unwrap();
    assert_eq!(report.marker_without_images, vec![bare.join(MARKER_FILE_NAME)]);
}

#[test]
fn test_aux_markers_are_segregated() {
    let root = TempDir::new().unwrap();
    let patient = make_patient(root.path(), "PD", "D1. Doe John");
    let aux = patient.join("0. DaT Scan");
    fs::create_dir_all(&aux).unwrap();
    write_dicom(&aux.join(MARKER_FILE_NAME));
    write_dicom(&aux.join("IM0001"));

    let report = validator().survey(root.path()).unwrap();
    assert_eq!(report.aux_markers, vec![aux.join(MARKER_FILE_NAME)]);
    // the auxiliary marker does not count against the patient
    assert_eq!(report.ok.len(), 1);
    assert!(report.multiple_markers.is_empty());
}

#[test]
fn test_unconventional_name_is_flagged() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    let odd = make_patient(root.path(), "PD", "Doe Jane");

    let report = validator().survey(root.path()).unwrap();
    assert_eq!(report.bad_name, vec![odd]);
}

#[test]
fn test_repair_strips_class_prefixes() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    make_patient(root.path(), "NPD", "D2.Smith Jane");

    let summary = validator().repair(root.path()).unwrap();
    assert_eq!(summary.renamed.len(), 2);
    assert!(root.path().join("PD/Doe John").is_dir());
    assert!(root.path().join("NPD/Smith Jane").is_dir());
    assert!(!root.path().join("PD/D1. Doe John").exists());
}

#[test]
fn test_repair_leaves_clean_names_alone() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "Doe John");

    let summary = validator().repair(root.path()).unwrap();
    assert!(summary.renamed.is_empty());
    assert!(root.path().join("PD/Doe John").is_dir());
}

#[test]
fn test_repair_removes_imageless_markers() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    let bare = root.path().join("PD/D1. Smith Jane");
    fs::create_dir_all(&bare).unwrap();
    write_dicom(&bare.join(MARKER_FILE_NAME));

    let summary = validator().repair(root.path()).unwrap();
    assert_eq!(summary.removed_markers, vec![bare.join(MARKER_FILE_NAME)]);
    assert!(!bare.join(MARKER_FILE_NAME).exists());
}

#[test]
fn test_repair_relocates_deep_marker() {
    let root = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "D1. Doe John");
    make_patient(root.path(), "PD", "D1. Smith Jane");
    make_patient(root.path(), "PD", "D1. Lee Kim");
    let deep = root.path().join("PD/D1. Park Min/scans");
    fs::create_dir_all(&deep).unwrap();
    write_dicom(&deep.join(MARKER_FILE_NAME));
    write_dicom(&deep.join("IM0001"));

    let summary = validator().repair(root.path()).unwrap();
    assert_eq!(summary.relocated_markers, vec![deep.join(MARKER_FILE_NAME)]);
    assert!(!deep.join(MARKER_FILE_NAME).exists());
    assert!(root
        .path()
        .join("PD/Park Min")
        .join(MARKER_FILE_NAME)
        .is_file());

    // a follow-up survey sees the relocated marker at the expected depth
    let report = validator().survey(root.path()).unwrap();
    assert!(report.wrong_depth.is_empty());
}
