//! End-to-end dataset preparation
//!
//! The pipeline strings the stages together per scan root: structure
//! validation, alias-based anonymization of patient directories, DICOM-to-PNG
//! conversion, conversion-log anonymization, restructuring each patient down
//! to a canonical `MRI` subtree, and finally gathering the configured
//! sequence selection into a training tree.

pub mod summary;

pub use summary::RunReport;

use crate::core::anonymize::{
    anonymize_conversion_log, Anonymizer, AnonymizerOptions, PATIENT_LOG_FILE_NAME,
    SIMILARITY_THRESHOLD,
};
use crate::core::convert::{codec, Converter, Decompressor, CONVERSION_LOG_FILE_NAME};
use crate::core::scan::Scanner;
use crate::core::validate::{DirectoryValidator, RepairSummary, StructureReport};
use crate::domain::{CohortError, Result};
use crate::interact::{Selection, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the canonical per-patient image subdirectory.
pub const MRI_DIR_NAME: &str = "MRI";

/// Entries kept during restructuring besides PNG images: the
/// auxiliary-scan subtree, recognized by this token in its squashed name.
const AUX_KEEP_TOKEN: &str = "0.dat";

/// Knobs for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub log_dir: PathBuf,
    /// Explicit dictionary path; well-known locations are probed otherwise
    pub dictionary: Option<PathBuf>,
    /// Substring selecting sequences for the training tree
    pub selection_marker: String,
    pub selection_dir: PathBuf,
    /// Delete DICOM originals after conversion
    pub cleanup: bool,
    /// Rename patient directories only, leave image contents alone
    pub only_dirs: bool,
    /// Verify embedded patient names when rewriting images
    pub similarity_check: bool,
    /// Score below which an embedded name fails verification
    pub similarity_threshold: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            dictionary: None,
            selection_marker: "T1".to_string(),
            selection_dir: PathBuf::from("selection"),
            cleanup: true,
            only_dirs: true,
            similarity_check: true,
            similarity_threshold: SIMILARITY_THRESHOLD,
        }
    }
}

/// The orchestrator. Owns a scanner and validator; every confirmation goes
/// through the injected selector.
pub struct Pipeline<'a> {
    scanner: Scanner,
    validator: DirectoryValidator,
    options: PipelineOptions,
    selector: &'a mut dyn Selector,
}

impl<'a> Pipeline<'a> {
    pub fn new(scanner: Scanner, options: PipelineOptions, selector: &'a mut dyn Selector) -> Self {
        let validator = DirectoryValidator::new(scanner.clone());
        Self {
            scanner,
            validator,
            options,
            selector,
        }
    }

    /// The whole preparation run over `roots`.
    pub fn run(&mut self, roots: &[PathBuf]) -> Result<RunReport> {
        let mut report = RunReport::default();

        // structure check first; proceeding despite violations is a choice
        for root in roots {
            let survey = self.validator.survey(root)?;
            if !survey.is_clean() {
                println!("{}", survey.render());
                let answer = self
                    .selector
                    .confirm("Do you want to ignore the structure errors and proceed?")?;
                if !answer.is_yes() {
                    info!(root = %root.display(), "Run aborted on structure errors");
                    report.aborted = true;
                    return Ok(report);
                }
            }
        }

        let class_dirs = class_directories(roots)?;

        let store = Anonymizer::resolve_store(
            self.options.dictionary.as_deref(),
            &class_dirs,
            &self.options.log_dir,
            self.selector,
        )?;
        let mut anonymizer = Anonymizer::new(
            store,
            self.scanner.clone(),
            AnonymizerOptions {
                only_dirs: self.options.only_dirs,
                similarity_check: self.options.similarity_check,
                similarity_threshold: self.options.similarity_threshold,
                log_dir: self.options.log_dir.clone(),
            },
        );
        anonymizer.prepare(&class_dirs, self.selector)?;
        let outcome = anonymizer.run(&class_dirs, self.selector)?;
        if outcome.aborted {
            report.aborted = true;
            return Ok(report);
        }
        report.previous_entries = outcome.previous_entries;
        report.total_entries = outcome.current_entries;
        report.patients_anonymized = outcome.renamed;

        let mut converter = Converter::new(
            self.scanner.clone(),
            Decompressor::probe(),
            self.options.cleanup,
        );
        for class_dir in &class_dirs {
            for patient_dir in subdirectories(class_dir)? {
                match converter.convert_patient(&patient_dir, &self.options.log_dir, self.selector)
                {
                    Ok(()) => {}
                    Err(CohortError::Validation(msg)) => {
                        warn!(patient = %patient_dir.display(), "{msg}");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        converter.write_compressed_report(&self.options.log_dir)?;
        report.images_converted = converter.stats().pngs_created();
        report.images_failed = converter.stats().failed;
        report.images_removed = converter.stats().removed;
        report.compressed_failures = converter.compressed_failures().to_vec();

        let conv_log = self.options.log_dir.join(CONVERSION_LOG_FILE_NAME);
        if conv_log.is_file() {
            anonymize_conversion_log(
                &conv_log,
                &self.options.log_dir.join(PATIENT_LOG_FILE_NAME),
            )?;
        }

        self.restructure(roots)?;

        for root in roots {
            report.selection_copied += self.gather_selection(root)?;
        }

        info!(
            anonymized = report.patients_anonymized,
            converted = report.images_converted,
            failed = report.images_failed,
            selected = report.selection_copied,
            "Pipeline run finished"
        );
        Ok(report)
    }

    /// Prune every patient directory down to its PNGs (moved into an `MRI`
    /// subdirectory) and the auxiliary-scan subtree. Everything else,
    /// markers included, is deleted.
    pub fn restructure(&mut self, roots: &[PathBuf]) -> Result<usize> {
        let markers = self.scanner.find_markers(roots)?.found;
        let mut patient_dirs: Vec<PathBuf> = markers
            .iter()
            .filter_map(|m| m.parent().map(|p| p.to_path_buf()))
            .collect();
        patient_dirs.sort();
        patient_dirs.dedup();
        if patient_dirs.is_empty() {
            warn!("No marker files found, nothing to restructure");
            return Ok(0);
        }

        let labels: Vec<String> = patient_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let selection = self
            .selector
            .select("Which patient directories do you want to restructure?", &labels)?;
        let chosen = match selection {
            Selection::Nothing => {
                info!("Restructuring skipped");
                return Ok(0);
            }
            other => other.apply(patient_dirs),
        };

        for dir in &chosen {
            prune_patient_dir(&self.scanner, dir)?;
        }
        info!(patients = chosen.len(), "Restructuring finished");
        Ok(chosen.len())
    }

    /// Copy every PNG whose name contains the selection marker from each
    /// patient's `MRI` directory into `selection/<class>/MRI/<patient>/`.
    /// Returns the number of images copied.
    pub fn gather_selection(&self, root: &Path) -> Result<usize> {
        let destination = &self.options.selection_dir;
        if destination.exists() && !destination.is_dir() {
            return Err(CohortError::InvalidPath(destination.clone()));
        }
        let mut copied = 0;
        for class_dir in subdirectories(root)? {
            let class_name = file_name_of(&class_dir);
            let target_mri = destination.join(&class_name).join(MRI_DIR_NAME);
            for patient_dir in subdirectories(&class_dir)? {
                let mri_dir = patient_dir.join(MRI_DIR_NAME);
                if !mri_dir.is_dir() {
                    continue;
                }
                let pngs = self
                    .scanner
                    .find_rasters(&[&mri_dir], &self.options.selection_marker)?
                    .found;
                if pngs.is_empty() {
                    info!(patient = %patient_dir.display(), "No matching sequences");
                    continue;
                }
                let patient_target = target_mri.join(file_name_of(&patient_dir));
                fs::create_dir_all(&patient_target)?;
                for png in &pngs {
                    let name = png
                        .file_name()
                        .ok_or_else(|| CohortError::InvalidPath(png.clone()))?;
                    fs::copy(png, patient_target.join(name))?;
                    copied += 1;
                }
            }
        }
        info!(copied, root = %root.display(), "Selection gathered");
        Ok(copied)
    }

    /// Structure repair: the validator's mechanical fixes plus conversion of
    /// auxiliary-scan directories and markerless image sets.
    pub fn repair_structure(&mut self, root: &Path) -> Result<(RepairSummary, StructureReport)> {
        let summary = self.validator.repair(root)?;

        let survey = self.validator.survey(root)?;
        let mut converter = Converter::new(
            self.scanner.clone(),
            Decompressor::probe(),
            true,
        );
        for marker in &survey.aux_markers {
            let Some(aux_dir) = marker.parent() else {
                continue;
            };
            self.convert_aux_directory(&mut converter, aux_dir)?;
        }
        for patient_dir in &survey.images_without_marker {
            match converter.convert_patient(patient_dir, &self.options.log_dir, self.selector) {
                Ok(()) => {}
                Err(CohortError::Validation(msg)) => {
                    warn!(patient = %patient_dir.display(), "{msg}")
                }
                Err(e) => return Err(e),
            }
        }

        let after = self.validator.survey(root)?;
        Ok((summary, after))
    }

    /// Convert an auxiliary-scan directory in place, keeping source file
    /// names, then prune it down to the PNGs.
    fn convert_aux_directory(&mut self, converter: &mut Converter, aux_dir: &Path) -> Result<()> {
        let answer = self.selector.confirm(&format!(
            "Structuring {} will remove all files besides .png images. Do you want to proceed?",
            aux_dir.display()
        ))?;
        if !answer.is_yes() {
            info!(dir = %aux_dir.display(), "Auxiliary conversion skipped");
            return Ok(());
        }
        for dcm in self.scanner.find_images(&[aux_dir])?.found {
            converter.convert_file_same_name(&dcm)?;
        }
        for entry in fs::read_dir(aux_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_png = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("png"))
                .unwrap_or(false);
            if is_png {
                continue;
            }
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        info!(dir = %aux_dir.display(), "Auxiliary directory structured");
        Ok(())
    }
}

/// Delete everything in a patient directory except PNG images and the
/// auxiliary-scan subtree, then move the PNGs into an `MRI` subdirectory.
///
/// Conversion writes each PNG next to its source, which in nested series
/// layouts is a subdirectory of the patient; those rasters are moved out
/// before their subtree is deleted.
fn prune_patient_dir(scanner: &Scanner, dir: &Path) -> Result<()> {
    let mri_dir = dir.join(MRI_DIR_NAME);
    fs::create_dir_all(&mri_dir)?;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path == mri_dir {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let squashed: String = name.to_lowercase().split_whitespace().collect();
        if squashed.contains(AUX_KEEP_TOKEN) {
            continue;
        }
        if entry.file_type()?.is_dir() {
            for png in scanner.find_rasters(&[&path], "")?.found {
                move_raster(&png, &mri_dir)?;
            }
            fs::remove_dir_all(&path)?;
        } else if name.to_lowercase().ends_with(".png") {
            move_raster(&path, &mri_dir)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Move one raster into the `MRI` directory, appending a `_copy<N>` suffix
/// when two series directories used the same image name.
fn move_raster(png: &Path, mri_dir: &Path) -> Result<()> {
    let stem = png
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| CohortError::InvalidPath(png.to_path_buf()))?;
    fs::rename(png, codec::collision_free(mri_dir, &stem))?;
    Ok(())
}

fn class_directories(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for root in roots {
        dirs.extend(subdirectories(root)?);
    }
    Ok(dirs)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CohortError::InvalidPath(dir.to_path_buf()));
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interact::AcceptAll;
    use tempfile::TempDir;

    fn write_dicom(path: &Path) {
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"DICM");
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_prune_keeps_pngs_and_aux_subtree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t1_se_001.png"), "png").unwrap();
        fs::write(dir.path().join("IM0001"), "dicom").unwrap();
        write_dicom(&dir.path().join("DICOMDIR"));
        fs::create_dir_all(dir.path().join("0. DaT Scan")).unwrap();
        fs::write(dir.path().join("0. DaT Scan/scan.png"), "png").unwrap();
        fs::create_dir_all(dir.path().join("junk")).unwrap();

        prune_patient_dir(&Scanner::new(), dir.path()).unwrap();

        assert!(dir.path().join(MRI_DIR_NAME).join("t1_se_001.png").is_file());
        assert!(dir.path().join("0. DaT Scan/scan.png").is_file());
        assert!(!dir.path().join("IM0001").exists());
        assert!(!dir.path().join("DICOMDIR").exists());
        assert!(!dir.path().join("junk").exists());
        assert!(!dir.path().join("t1_se_001.png").exists());
    }

    #[test]
    fn test_prune_rescues_rasters_from_series_subdirectories() {
        let dir = TempDir::new().unwrap();
        let series = dir.path().join("SER00001");
        fs::create_dir_all(&series).unwrap();
        fs::write(series.join("t1_se_001.png"), "png").unwrap();
        fs::write(series.join("IM0001"), "dicom").unwrap();
        write_dicom(&dir.path().join("DICOMDIR"));

        prune_patient_dir(&Scanner::new(), dir.path()).unwrap();

        assert!(dir.path().join(MRI_DIR_NAME).join("t1_se_001.png").is_file());
        assert!(!dir.path().join("SER00001").exists());
        assert!(!dir.path().join("DICOMDIR").exists());
    }

    #[test]
    fn test_prune_disambiguates_same_name_across_series() {
        let dir = TempDir::new().unwrap();
        for series in ["SER00001", "SER00002"] {
            let sub = dir.path().join(series);
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join("t1_se_001.png"), "png").unwrap();
        }

        prune_patient_dir(&Scanner::new(), dir.path()).unwrap();

        let mri = dir.path().join(MRI_DIR_NAME);
        assert!(mri.join("t1_se_001.png").is_file());
        assert!(mri.join("t1_se_001_copy1.png").is_file());
    }

    #[test]
    fn test_gather_selection_copies_matching_sequences() {
        let root = TempDir::new().unwrap();
        let workdir = TempDir::new().unwrap();
        let mri = root.path().join("PD/Subject1").join(MRI_DIR_NAME);
        fs::create_dir_all(&mri).unwrap();
        fs::write(mri.join("t1_se_001.png"), "png").unwrap();
        fs::write(mri.join("t2_tirm_001.png"), "png").unwrap();

        let options = PipelineOptions {
            selection_dir: workdir.path().join("selection"),
            log_dir: workdir.path().join("logs"),
            ..PipelineOptions::default()
        };
        let mut selector = AcceptAll;
        let pipeline = Pipeline::new(Scanner::new(), options, &mut selector);

        let copied = pipeline.gather_selection(root.path()).unwrap();
        assert_eq!(copied, 1);
        assert!(workdir
            .path()
            .join("selection/PD/MRI/Subject1/t1_se_001.png")
            .is_file());
    }

    #[test]
    fn test_gather_selection_skips_patients_without_matches() {
        let root = TempDir::new().unwrap();
        let workdir = TempDir::new().unwrap();
        let mri = root.path().join("PD/Subject1").join(MRI_DIR_NAME);
        fs::create_dir_all(&mri).unwrap();
        fs::write(mri.join("t2_tirm_001.png"), "png").unwrap();

        let options = PipelineOptions {
            selection_dir: workdir.path().join("selection"),
            log_dir: workdir.path().join("logs"),
            ..PipelineOptions::default()
        };
        let mut selector = AcceptAll;
        let pipeline = Pipeline::new(Scanner::new(), options, &mut selector);

        assert_eq!(pipeline.gather_selection(root.path()).unwrap(), 0);
        assert!(!workdir.path().join("selection/PD/MRI/Subject1").exists());
    }

    #[test]
    fn test_restructure_without_markers_is_a_noop() {
        let root = TempDir::new().unwrap();
        let mut selector = AcceptAll;
        let mut pipeline = Pipeline::new(
            Scanner::new(),
            PipelineOptions::default(),
            &mut selector,
        );
        assert_eq!(
            pipeline.restructure(&[root.path().to_path_buf()]).unwrap(),
            0
        );
    }

    #[test]
    fn test_restructure_prunes_selected_patients() {
        let root = TempDir::new().unwrap();
        let patient = root.path().join("PD/Subject1");
        fs::create_dir_all(&patient).unwrap();
        write_dicom(&patient.join("DICOMDIR"));
        fs::write(patient.join("t1_se_001.png"), "png").unwrap();

        let mut selector = AcceptAll;
        let mut pipeline = Pipeline::new(
            Scanner::new(),
            PipelineOptions::default(),
            &mut selector,
        );
        let count = pipeline.restructure(&[root.path().to_path_buf()]).unwrap();
        assert_eq!(count, 1);
        assert!(patient.join(MRI_DIR_NAME).join("t1_se_001.png").is_file());
        assert!(!patient.join("DICOMDIR").exists());
    }
}
