//! End-to-end pipeline run over a real DICOM tree

use cohort::core::pipeline::{Pipeline, PipelineOptions, MRI_DIR_NAME};
use cohort::core::scan::{Scanner, MARKER_FILE_NAME};
use cohort::domain::Result;
use cohort::interact::{AcceptAll, Answer, Selection, Selector};
use dicom_core::value::DataSetSequence;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";
const MEDIA_STORAGE_DIRECTORY: &str = "1.2.840.10008.1.3.10";
const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

fn write_pixel_image(path: &Path, patient_name: &str, uid: &str) {
    let obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, SECONDARY_CAPTURE),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, uid),
        DataElement::new(tags::PATIENT_NAME, VR::PN, patient_name),
        DataElement::new(tags::SERIES_DESCRIPTION, VR::LO, "t1 se"),
        DataElement::new(tags::INSTANCE_NUMBER, VR::IS, "1"),
        DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(2_u16)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(2_u16)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)),
        DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(7_u16)),
        DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(0_u16),
        ),
        DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(1_u16),
        ),
        DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::from(vec![0_u8, 85, 170, 255]),
        ),
    ]);
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LE)
            .media_storage_sop_class_uid(SECONDARY_CAPTURE)
            .media_storage_sop_instance_uid(uid),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

fn write_marker(path: &Path, patient_name: &str, uid: &str) {
    let patient = InMemDicomObject::from_element_iter([
        DataElement::new(tags::DIRECTORY_RECORD_TYPE, VR::CS, "PATIENT"),
        DataElement::new(tags::PATIENT_NAME, VR::PN, patient_name),
    ]);
    let obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, MEDIA_STORAGE_DIRECTORY),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, uid),
        DataElement::new(
            tags::DIRECTORY_RECORD_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![patient]),
        ),
    ]);
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LE)
            .media_storage_sop_class_uid(MEDIA_STORAGE_DIRECTORY)
            .media_storage_sop_instance_uid(uid),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

fn make_patient(root: &Path, class: &str, name: &str, uid_seed: u32) {
    let dir = root.join(class).join(name);
    fs::create_dir_all(&dir).unwrap();
    write_marker(
        &dir.join(MARKER_FILE_NAME),
        name,
        &format!("1.2.7.{uid_seed}.0"),
    );
    write_pixel_image(&dir.join("IM0001"), name, &format!("1.2.7.{uid_seed}.1"));
}

fn options(workdir: &Path) -> PipelineOptions {
    PipelineOptions {
        log_dir: workdir.join("logs"),
        selection_dir: workdir.join("selection"),
        ..PipelineOptions::default()
    }
}

#[test]
fn test_full_run_produces_training_tree() {
    let root = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "Doe John", 1);
    make_patient(root.path(), "NPD", "Smith Jane", 2);

    let mut selector = AcceptAll;
    let mut pipeline = Pipeline::new(Scanner::new(), options(workdir.path()), &mut selector);
    let report = pipeline.run(&[root.path().to_path_buf()]).unwrap();

    assert!(!report.aborted);
    assert!(report.is_complete_success());
    assert_eq!(report.patients_anonymized, 2);
    assert_eq!(report.total_entries, 2);
    assert_eq!(report.images_converted, 2);
    assert_eq!(report.images_removed, 2);
    assert_eq!(report.selection_copied, 2);

    // aliases are assigned over the sorted class directories, NPD first;
    // each patient ends up as <class>/Subject<N>/MRI/<sequence>.png
    let npd_patient = root.path().join("NPD").join("Subject1");
    assert!(npd_patient.join(MRI_DIR_NAME).join("t1_se_001.png").is_file());
    let pd_patient = root.path().join("PD").join("Subject2");
    assert!(pd_patient.join(MRI_DIR_NAME).join("t1_se_001.png").is_file());
    assert!(!pd_patient.join(MARKER_FILE_NAME).exists());
    assert!(!pd_patient.join("IM0001").exists());

    // selection tree mirrors class/MRI/patient
    assert!(workdir
        .path()
        .join("selection/NPD/MRI/Subject1/t1_se_001.png")
        .is_file());
    assert!(workdir
        .path()
        .join("selection/PD/MRI/Subject2/t1_se_001.png")
        .is_file());

    // the conversion log was written and anonymized
    let logs = workdir.path().join("logs");
    let conv = fs::read_to_string(logs.join("conversion_log.txt")).unwrap();
    assert!(conv.contains("Doe John"));
    let anon = fs::read_to_string(logs.join("conversion_log_anon.txt")).unwrap();
    assert!(anon.contains("Subject2"));
    assert!(!anon.contains("Doe John"));
    assert!(!anon.contains("Smith Jane"));
}

#[test]
fn test_nested_series_rasters_land_in_mri() {
    let root = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    // DICOMDIR layouts keep images in series subdirectories, so the
    // converted PNG lands one level below the patient root
    let patient = root.path().join("PD/Doe John");
    let series = patient.join("SER00001");
    fs::create_dir_all(&series).unwrap();
    write_marker(&patient.join(MARKER_FILE_NAME), "Doe John", "1.2.7.8.0");
    write_pixel_image(&series.join("IM0001"), "Doe John", "1.2.7.8.1");

    let mut selector = AcceptAll;
    let mut pipeline = Pipeline::new(Scanner::new(), options(workdir.path()), &mut selector);
    let report = pipeline.run(&[root.path().to_path_buf()]).unwrap();

    assert!(!report.aborted);
    assert_eq!(report.images_converted, 1);
    let renamed = root.path().join("PD/Subject1");
    assert!(renamed.join(MRI_DIR_NAME).join("t1_se_001.png").is_file());
    assert!(!renamed.join("SER00001").exists());
    assert_eq!(report.selection_copied, 1);
    assert!(workdir
        .path()
        .join("selection/PD/MRI/Subject1/t1_se_001.png")
        .is_file());
}

struct DeclineEverything;

impl Selector for DeclineEverything {
    fn select(&mut self, _prompt: &str, _options: &[String]) -> Result<Selection> {
        Ok(Selection::Nothing)
    }
    fn confirm(&mut self, _prompt: &str) -> Result<Answer> {
        Ok(Answer::No)
    }
}

#[test]
fn test_declined_structure_check_aborts_without_changes() {
    let root = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    // image without a marker makes the survey unclean
    let patient = root.path().join("PD/Doe John");
    fs::create_dir_all(&patient).unwrap();
    write_pixel_image(&patient.join("IM0001"), "Doe John", "1.2.7.9.1");

    let mut selector = DeclineEverything;
    let mut pipeline = Pipeline::new(Scanner::new(), options(workdir.path()), &mut selector);
    let report = pipeline.run(&[root.path().to_path_buf()]).unwrap();

    assert!(report.aborted);
    assert!(!report.is_complete_success());
    // nothing was renamed, converted, or deleted
    assert!(patient.join("IM0001").is_file());
    assert!(!root.path().join("PD/Subject1").exists());
    assert!(!workdir.path().join("logs").exists());
}

#[test]
fn test_run_tolerates_patients_without_images() {
    let root = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    make_patient(root.path(), "PD", "Doe John", 3);
    // a second patient directory with no DICOM content at all
    fs::create_dir_all(root.path().join("PD/Smith Jane")).unwrap();

    let mut selector = AcceptAll;
    let mut pipeline = Pipeline::new(Scanner::new(), options(workdir.path()), &mut selector);
    let report = pipeline.run(&[root.path().to_path_buf()]).unwrap();

    assert!(!report.aborted);
    assert_eq!(report.patients_anonymized, 2);
    assert_eq!(report.images_converted, 1);
    assert!(root.path().join("PD/Subject1").is_dir());
    assert!(root.path().join("PD/Subject2").is_dir());
}
