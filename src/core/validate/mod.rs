//! Directory-structure validation and repair
//!
//! The expected layout is `root/<class>/<patient>/DICOMDIR`, with exactly one
//! non-auxiliary marker per patient. Archives rarely arrive that way, so the
//! validator classifies every patient directory into exactly one category and
//! can repair the mechanical violations in place.
//!
//! Depth correctness is population-relative: the expected marker depth is the
//! most common depth among candidate-normal patients, computed once over the
//! whole batch before any patient is judged. A hardcoded constant would
//! misfire on archives that nest an extra level everywhere.

use crate::core::scan::{Scanner, MARKER_FILE_NAME};
use crate::domain::{CohortError, MarkerKind, PatientDirectory, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The class-prefix naming convention, e.g. `D1. Lastname Firstname`.
const NAME_PATTERN: &str = r"^D[0-9]\. ";

/// Looser pattern used when stripping the prefix, tolerating sloppy variants
/// like `D1a.` or a missing dot or space.
const NAME_STRIP_PATTERN: &str = r"^D[0-9]?[a-z]?\.? ?";

/// Violation categories. Each patient lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    MissingMarker,
    MultipleMarkers,
    MarkerWithoutImages,
    ImagesWithoutMarker,
    WrongDepth,
    BadName,
}

/// Everything a report-only validation pass found.
#[derive(Debug, Default)]
pub struct StructureReport {
    /// Patients that passed every check (paths of their marker directories)
    pub ok: Vec<PathBuf>,
    /// Patient directories with no marker and no loose images
    pub missing_marker: Vec<PathBuf>,
    /// Patient directories with more than one non-auxiliary marker
    pub multiple_markers: Vec<PathBuf>,
    /// Marker files whose subtree holds no DICOM image
    pub marker_without_images: Vec<PathBuf>,
    /// Patient directories with DICOM images but no marker
    pub images_without_marker: Vec<PathBuf>,
    /// Marker directories at a depth other than the population's
    pub wrong_depth: Vec<PathBuf>,
    /// Patient directories not following the class-prefix convention
    pub bad_name: Vec<PathBuf>,
    /// Auxiliary-scan markers, segregated for separate handling
    pub aux_markers: Vec<PathBuf>,
    /// The population-relative marker depth, when computable
    pub expected_depth: Option<usize>,
}

impl StructureReport {
    /// True iff no category holds anything.
    pub fn is_clean(&self) -> bool {
        self.missing_marker.is_empty()
            && self.multiple_markers.is_empty()
            && self.marker_without_images.is_empty()
            && self.images_without_marker.is_empty()
            && self.wrong_depth.is_empty()
            && self.bad_name.is_empty()
            && self.aux_markers.is_empty()
    }

    /// Human-readable summary, one numbered block per non-empty category.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut section = |title: &str, paths: &[PathBuf]| {
            if paths.is_empty() {
                return;
            }
            out.push_str(title);
            out.push('\n');
            for (i, path) in paths.iter().enumerate() {
                out.push_str(&format!("{:<3} {}\n", format!("{}.", i + 1), path.display()));
            }
            out.push('\n');
        };
        section(
            "No marker files were found for the following patients that have DICOM images:",
            &self.images_without_marker,
        );
        section(
            "No DICOM images were found for the following markers:",
            &self.marker_without_images,
        );
        section(
            "No DICOM files were found for the following patients:",
            &self.missing_marker,
        );
        section(
            "Multiple marker files were found for the following patients:",
            &self.multiple_markers,
        );
        section(
            "Auxiliary-scan markers were found for the following patients:",
            &self.aux_markers,
        );
        section(
            "Wrong directory structure in the following patients:",
            &self.wrong_depth,
        );
        section(
            "Possibly wrong directory name in the following patients:",
            &self.bad_name,
        );
        out
    }
}

/// What a repair pass changed on disk.
#[derive(Debug, Default)]
pub struct RepairSummary {
    /// Directory renames performed while stripping class prefixes
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Markers moved up to the expected depth
    pub relocated_markers: Vec<PathBuf>,
    /// Imageless markers deleted
    pub removed_markers: Vec<PathBuf>,
}

/// Validates and repairs the patient-directory layout under one or more
/// scan roots.
#[derive(Debug)]
pub struct DirectoryValidator {
    scanner: Scanner,
    name_pattern: Regex,
    strip_pattern: Regex,
}

/// Internal per-patient survey record.
struct Surveyed {
    patient: PatientDirectory,
    /// Directory holding the single non-auxiliary marker, when there is one
    marker_dir: Option<PathBuf>,
    /// Depth of that marker directory relative to the scan root
    marker_depth: Option<usize>,
    imageless_markers: Vec<PathBuf>,
}

impl DirectoryValidator {
    pub fn new(scanner: Scanner) -> Self {
        // both patterns are literals; construction cannot fail
        Self {
            scanner,
            name_pattern: Regex::new(NAME_PATTERN).unwrap_or_else(|_| unreachable!()),
            strip_pattern: Regex::new(NAME_STRIP_PATTERN).unwrap_or_else(|_| unreachable!()),
        }
    }

    /// Report-only pass: classify every patient under `root`, change nothing.
    pub fn survey(&self, root: &Path) -> Result<StructureReport> {
        let surveyed = self.collect(root)?;
        let mut report = StructureReport::default();

        let mut candidates: Vec<&Surveyed> = Vec::new();
        for s in &surveyed {
            report
                .aux_markers
                .extend(s.patient.aux_markers.iter().cloned());
            report
                .marker_without_images
                .extend(s.imageless_markers.iter().cloned());
            match s.patient.marker_count() {
                0 if s.patient.has_images => {
                    report.images_without_marker.push(s.patient.path.clone())
                }
                0 => report.missing_marker.push(s.patient.path.clone()),
                1 => candidates.push(s),
                _ => report.multiple_markers.push(s.patient.path.clone()),
            }
        }

        // population statistic first, depth judgements second
        let expected = expected_depth(candidates.iter().filter_map(|s| s.marker_depth));
        report.expected_depth = expected;
        for s in candidates {
            let marker_dir = match &s.marker_dir {
                Some(d) => d.clone(),
                None => continue,
            };
            if expected.is_some() && s.marker_depth != expected {
                report.wrong_depth.push(marker_dir);
            } else if !self.name_pattern.is_match(&s.patient.raw_name) {
                report.bad_name.push(s.patient.path.clone());
            } else {
                report.ok.push(marker_dir);
            }
        }

        info!(
            ok = report.ok.len(),
            clean = report.is_clean(),
            expected_depth = report.expected_depth,
            "Structure survey complete"
        );
        Ok(report)
    }

    /// Repair pass: delete imageless markers, relocate depth outliers one
    /// level up, strip class prefixes from every surviving patient name.
    ///
    /// Auxiliary-scan directories and markerless image sets need conversion
    /// and are left to the pipeline; they stay listed in a follow-up
    /// [`survey`](Self::survey).
    pub fn repair(&self, root: &Path) -> Result<RepairSummary> {
        let surveyed = self.collect(root)?;
        let mut summary = RepairSummary::default();

        for s in &surveyed {
            for marker in &s.imageless_markers {
                debug!(marker = %marker.display(), "Removing marker with no images");
                fs::remove_file(marker)?;
                summary.removed_markers.push(marker.clone());
            }
        }

        let candidates: Vec<&Surveyed> = surveyed
            .iter()
            .filter(|s| s.patient.marker_count() == 1)
            .collect();
        // the delete phase may have taken a candidate's only marker with it,
        // so both the depth statistic and the relocation work on survivors
        let survivors: Vec<&Surveyed> = candidates
            .iter()
            .copied()
            .filter(|s| {
                s.patient
                    .sole_marker()
                    .map(|m| !summary.removed_markers.iter().any(|r| r.as_path() == m))
                    .unwrap_or(false)
            })
            .collect();
        let expected = expected_depth(survivors.iter().filter_map(|s| s.marker_depth));

        for s in &survivors {
            let marker_dir = match &s.marker_dir {
                Some(d) => d.clone(),
                None => continue,
            };
            if expected.is_some() && s.marker_depth != expected {
                let target_dir = marker_dir
                    .parent()
                    .ok_or_else(|| CohortError::InvalidPath(marker_dir.clone()))?;
                let marker = marker_dir.join(MARKER_FILE_NAME);
                debug!(
                    from = %marker.display(),
                    to = %target_dir.display(),
                    "Relocating marker to expected depth"
                );
                fs::rename(&marker, target_dir.join(MARKER_FILE_NAME))?;
                summary.relocated_markers.push(marker);
            }
        }

        for s in &candidates {
            let old = &s.patient.path;
            let stripped = self.strip_prefix(&s.patient.raw_name).into_owned();
            if stripped.is_empty() || stripped == s.patient.raw_name {
                continue;
            }
            let parent = old
                .parent()
                .ok_or_else(|| CohortError::InvalidPath(old.clone()))?;
            let new = parent.join(&stripped);
            if new.exists() {
                warn!(target = %new.display(), "Skipping rename, target exists");
                continue;
            }
            debug!(from = %s.patient.raw_name, to = %stripped, "Stripping class prefix");
            fs::rename(old, &new)?;
            summary.renamed.push((old.clone(), new));
        }

        info!(
            renamed = summary.renamed.len(),
            relocated = summary.relocated_markers.len(),
            removed = summary.removed_markers.len(),
            "Structure repair complete"
        );
        Ok(summary)
    }

    /// Strip the class-prefix token from a directory name. Names without a
    /// real prefix token (no digit, no dot) come back unchanged, so a clean
    /// `Doe John` never loses its leading letters.
    pub fn strip_prefix<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        match self.strip_pattern.find(name) {
            Some(m) if m.as_str().chars().any(|c| c.is_ascii_digit() || c == '.') => {
                std::borrow::Cow::Owned(name[m.end()..].to_string())
            }
            _ => std::borrow::Cow::Borrowed(name),
        }
    }

    /// Walk `root/<class>/<patient>` and build one survey record per patient.
    fn collect(&self, root: &Path) -> Result<Vec<Surveyed>> {
        if !root.is_dir() {
            return Err(CohortError::InvalidPath(root.to_path_buf()));
        }
        let mut surveyed = Vec::new();
        for class_dir in subdirectories(root)? {
            for patient_dir in subdirectories(&class_dir)? {
                surveyed.push(self.survey_patient(root, &patient_dir)?);
            }
        }
        Ok(surveyed)
    }

    fn survey_patient(&self, root: &Path, patient_dir: &Path) -> Result<Surveyed> {
        let scan = self.scanner.find_all(&[patient_dir])?;
        let depth = relative_depth(root, patient_dir);
        let mut patient = PatientDirectory::new(patient_dir, depth);

        let mut imageless = Vec::new();
        for marker in scan.markers {
            match MarkerKind::of(&marker) {
                MarkerKind::Auxiliary => patient.aux_markers.push(marker),
                MarkerKind::Primary => {
                    if !subtree_has_image(&marker, &scan.images) {
                        imageless.push(marker.clone());
                    }
                    patient.markers.push(marker);
                }
            }
        }
        patient.has_images = scan
            .images
            .iter()
            .any(|img| MarkerKind::of(img) == MarkerKind::Primary);

        // the marker belonging to the main series is the shallowest one
        let marker_dir = patient
            .sole_marker()
            .and_then(|m| m.parent())
            .map(|p| p.to_path_buf());
        let marker_depth = marker_dir.as_deref().map(|d| relative_depth(root, d));

        Ok(Surveyed {
            patient,
            marker_dir,
            marker_depth,
            imageless_markers: imageless,
        })
    }
}

/// The most common depth in the population; ties go to the shallower depth.
fn expected_depth(depths: impl Iterator<Item = usize>) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for d in depths {
        *counts.entry(d).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(depth, _)| depth)
}

/// Number of components between `root` and `path`.
fn relative_depth(root: &Path, path: &Path) -> usize {
    path.strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or_else(|_| path.components().count())
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
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

/// Whether any discovered image lives under the marker's directory.
fn subtree_has_image(marker: &Path, images: &[PathBuf]) -> bool {
    let Some(marker_dir) = marker.parent() else {
        return false;
    };
    images.iter().any(|img| img.starts_with(marker_dir))
}
