//! Anonymization engine
//!
//! Walks patient directories, renames them to their aliases, and optionally
//! rewrites the `Patient's Name` element of every image into an `_anon` side
//! file. A run is a one-way state machine; artifacts are only written when
//! the run reaches the logging stage, so a declined confirmation leaves the
//! tree untouched.

use crate::core::alias::store::DICTIONARY_FILE_NAME;
use crate::core::alias::{similarity, AliasStore};
use crate::core::anonymize::artifacts;
use crate::core::scan::Scanner;
use crate::domain::{CohortError, Result};
use crate::interact::{Selection, Selector};
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::tags;
use dicom_object::open_file;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default fail-closed similarity floor for embedded-name verification.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

const ANON_SUFFIX: &str = "_anon";

/// Stages of an anonymization run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, dictionary not yet reconciled with the tree
    Init,
    /// Dictionary covers every patient directory
    DictionaryReady,
    /// Renaming directories (and images, unless dirs-only)
    Renaming,
    /// Writing artifacts
    Logging,
    Done,
    /// User declined the proceed confirmation; nothing was modified
    Aborted,
}

/// Counters and failure paths for one run.
#[derive(Debug, Default, Clone)]
pub struct AnonymizeStats {
    pub attempted: usize,
    pub processed: usize,
    pub failed: Vec<PathBuf>,
}

/// Final outcome handed to the caller.
#[derive(Debug)]
pub struct RunOutcome {
    pub aborted: bool,
    pub renamed: usize,
    pub stats: AnonymizeStats,
    pub previous_entries: usize,
    pub current_entries: usize,
}

/// Options that shape a run.
#[derive(Debug, Clone)]
pub struct AnonymizerOptions {
    /// Rename directories only, leave image contents alone
    pub only_dirs: bool,
    /// Verify the embedded name against the directory name before rewriting
    pub similarity_check: bool,
    /// Score below which an embedded name fails verification, and above
    /// which a new dictionary name is reported as a possible duplicate
    pub similarity_threshold: f64,
    pub log_dir: PathBuf,
}

impl Default for AnonymizerOptions {
    fn default() -> Self {
        Self {
            only_dirs: true,
            similarity_check: true,
            similarity_threshold: SIMILARITY_THRESHOLD,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// The engine itself. Construct with a resolved [`AliasStore`], call
/// [`prepare`](Self::prepare) then [`run`](Self::run).
#[derive(Debug)]
pub struct Anonymizer {
    store: AliasStore,
    scanner: Scanner,
    options: AnonymizerOptions,
    state: RunState,
    stats: AnonymizeStats,
    /// Real-name-to-alias pairs observed while rewriting images
    observed: Vec<(String, String)>,
}

impl Anonymizer {
    pub fn new(store: AliasStore, scanner: Scanner, options: AnonymizerOptions) -> Self {
        Self {
            store,
            scanner,
            options,
            state: RunState::Init,
            stats: AnonymizeStats::default(),
            observed: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn store(&self) -> &AliasStore {
        &self.store
    }

    /// Resolve the dictionary to run with.
    ///
    /// Order: an explicit path wins; otherwise well-known locations are
    /// offered one by one through the selector; otherwise a fresh dictionary
    /// is built from the patient directory names under `roots`. Failing all
    /// of that propagates an error before anything on disk has changed.
    pub fn resolve_store(
        explicit_path: Option<&Path>,
        roots: &[PathBuf],
        log_dir: &Path,
        selector: &mut dyn Selector,
    ) -> Result<AliasStore> {
        if let Some(path) = explicit_path {
            if !path.is_file() {
                return Err(CohortError::InvalidPath(path.to_path_buf()));
            }
            return AliasStore::load(path);
        }

        let mut candidates = vec![PathBuf::from(DICTIONARY_FILE_NAME)];
        candidates.push(log_dir.join(DICTIONARY_FILE_NAME));
        for root in roots {
            candidates.push(root.join(DICTIONARY_FILE_NAME));
        }
        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            let answer = selector.confirm(&format!(
                "Found dictionary from previous procedure: {}. Do you want to use this one?",
                candidate.display()
            ))?;
            if answer.is_yes() {
                return AliasStore::load(&candidate);
            }
        }

        let mut names = Vec::new();
        for root in roots {
            names.extend(subdirectory_names(root)?);
        }
        AliasStore::create(names)
    }

    /// Reconcile the dictionary with the patient directories under `roots`:
    /// names not yet mapped are offered to the selector and appended.
    pub fn prepare(&mut self, roots: &[PathBuf], selector: &mut dyn Selector) -> Result<usize> {
        let mut new_names = Vec::new();
        for root in roots {
            for name in subdirectory_names(root)? {
                // a directory already named after an alias was renamed by an
                // earlier run and must not become a dictionary entry itself
                if self.store.contains_alias(&name) {
                    continue;
                }
                if self.store.lookup(&name).is_err() && !new_names.contains(&name) {
                    new_names.push(name);
                }
            }
        }

        let mut added = 0;
        if !new_names.is_empty() {
            // near-duplicate notes go into the prompt so they are in front
            // of the user at decision time, through whatever selector the
            // caller injected
            let mut prompt = String::new();
            for name in &new_names {
                for record in self.store.records() {
                    let score = similarity::ratio(name, &record.real_name);
                    if score >= self.options.similarity_threshold {
                        prompt.push_str(&format!(
                            "{:<30} is similar to previous entry {:<30} with a score of {score:.2}.\n",
                            truncate(name, 30),
                            truncate(&record.real_name, 30),
                        ));
                    }
                }
            }
            prompt.push_str("Which patients do you want to add to the dictionary?");
            let selection = selector.select(&prompt, &new_names)?;
            let chosen = match selection {
                Selection::Nothing => Vec::new(),
                other => other.apply(new_names),
            };
            let (n, _) = self
                .store
                .update(chosen, self.options.similarity_threshold);
            added = n;
        }
        self.state = RunState::DictionaryReady;
        Ok(added)
    }

    /// The full anonymization pass over `roots`.
    pub fn run(&mut self, roots: &[PathBuf], selector: &mut dyn Selector) -> Result<RunOutcome> {
        if self.state != RunState::DictionaryReady {
            return Err(CohortError::Validation(format!(
                "anonymizer not ready to run (state {:?})",
                self.state
            )));
        }

        let answer = selector.confirm(
            "Proceeding will replace all DICOM images' \"Patient's Names\" to aliases:\n\
             e.g \"John Doe\" --> \"Subject1\".\nDo you want to proceed?",
        )?;
        if !answer.is_yes() {
            info!("Anonymization aborted before any change");
            self.state = RunState::Aborted;
            return Ok(self.outcome(true, 0));
        }

        self.state = RunState::Renaming;
        let mut renamed = 0;
        for root in roots {
            for name in subdirectory_names(root)? {
                let Ok(alias) = self.store.lookup(&name) else {
                    debug!(directory = %name, "No alias, leaving directory alone");
                    continue;
                };
                let alias = alias.to_string();
                let dir = root.join(&name);
                if !self.options.only_dirs {
                    self.anonymize_patient(&dir, &name, &alias)?;
                }
                self.rename_patient_directory(&dir, root, &alias)?;
                renamed += 1;
            }
        }
        info!(renamed, "Patients successfully anonymized");

        if !self.options.only_dirs {
            self.cleanup(roots, selector)?;
        }

        self.state = RunState::Logging;
        self.write_artifacts(roots)?;
        self.state = RunState::Done;
        Ok(self.outcome(false, renamed))
    }

    /// Rename one patient directory to its alias.
    ///
    /// # Errors
    ///
    /// [`CohortError::NameCollision`] when the target exists: a collision
    /// means the alias mapping can no longer be trusted against this tree,
    /// so the run must stop rather than merge two patients.
    pub fn rename_patient_directory(
        &self,
        dir: &Path,
        parent: &Path,
        alias: &str,
    ) -> Result<PathBuf> {
        let target = parent.join(alias);
        if target.exists() {
            return Err(CohortError::NameCollision(target));
        }
        debug!(from = %dir.display(), to = %target.display(), "Renaming patient directory");
        fs::rename(dir, &target)?;
        Ok(target)
    }

    /// Rewrite every image under one patient, collecting per-image failures.
    fn anonymize_patient(&mut self, dir: &Path, name: &str, alias: &str) -> Result<()> {
        let images = self.scanner.find_images(&[dir])?.found;
        for dcm in images {
            let original = self.options.similarity_check.then_some(name);
            match self.anonymize_image(&dcm, alias, original) {
                Ok(old) => {
                    if !self.observed.iter().any(|(n, _)| n == &old) {
                        self.observed.push((old, alias.to_string()));
                    }
                }
                Err(e) if !e.is_fatal() || matches!(e, CohortError::Dicom(_)) => {
                    warn!(path = %dcm.display(), error = %e, "Image anonymization failed");
                    // record the path the file will have once the patient
                    // directory is renamed, so the failure list stays valid
                    let recorded = dir
                        .parent()
                        .map(|parent| parent.join(alias))
                        .and_then(|renamed| {
                            dcm.strip_prefix(dir).ok().map(|rel| renamed.join(rel))
                        })
                        .unwrap_or_else(|| dcm.clone());
                    self.stats.failed.push(recorded);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Rewrite one image's `Patient's Name` into an `_anon` side file and
    /// return the embedded name. The original file is never modified.
    ///
    /// # Errors
    ///
    /// [`CohortError::SimilarityMismatch`] when the embedded name scores
    /// below the configured threshold against `original`; the image likely
    /// belongs to a different patient than its directory says.
    pub fn anonymize_image(
        &mut self,
        dcm: &Path,
        alias: &str,
        original: Option<&str>,
    ) -> Result<String> {
        self.stats.attempted += 1;
        let mut obj = open_file(dcm)?;
        let embedded = obj
            .element(tags::PATIENT_NAME)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if self.options.similarity_check {
            let original = original.ok_or_else(|| {
                CohortError::Validation("need the patient's name to compare strings".to_string())
            })?;
            let score = similarity::ratio(&embedded, original);
            if score < self.options.similarity_threshold {
                return Err(CohortError::SimilarityMismatch {
                    embedded,
                    expected: original.to_string(),
                    score,
                    threshold: self.options.similarity_threshold,
                });
            }
        }

        obj.put(DataElement::new(tags::PATIENT_NAME, VR::PN, alias));
        let mut side: OsString = dcm.as_os_str().to_owned();
        side.push(ANON_SUFFIX);
        obj.write_to_file(PathBuf::from(side))?;
        self.stats.processed += 1;
        Ok(embedded)
    }

    /// Delete every DICOM image that is not an `_anon` side file. Images
    /// that failed anonymization keep their originals.
    fn cleanup(&mut self, roots: &[PathBuf], selector: &mut dyn Selector) -> Result<()> {
        let answer = selector.confirm(
            "Cleanup will delete all original (non-anonymized) DICOM images. \
             Do you want to proceed?",
        )?;
        if !answer.is_yes() {
            info!("Cleanup skipped");
            return Ok(());
        }
        let mut deleted = 0;
        for dcm in self.scanner.find_images(roots)?.found {
            let is_anon = dcm
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(ANON_SUFFIX))
                .unwrap_or(false);
            if !is_anon && !self.stats.failed.contains(&dcm) {
                fs::remove_file(&dcm)?;
                deleted += 1;
            }
        }
        info!(deleted, "Cleanup finished");
        Ok(())
    }

    /// Write the alias table, the marker-derived patient log, the failure
    /// list, and the persisted dictionary.
    fn write_artifacts(&self, roots: &[PathBuf]) -> Result<()> {
        let log_dir = &self.options.log_dir;
        fs::create_dir_all(log_dir)?;

        let pairs: Vec<(String, String)> = self
            .store
            .records()
            .iter()
            .map(|r| (r.real_name.clone(), r.alias.clone()))
            .collect();
        artifacts::write_alias_table(&log_dir.join(artifacts::PATIENT_ALIASES_FILE_NAME), &pairs)?;

        let observed = if self.options.only_dirs {
            self.patient_log_from_markers(roots)?
        } else {
            self.observed.clone()
        };
        artifacts::write_alias_table(
            &log_dir.join(artifacts::PATIENT_LOG_FILE_NAME),
            &observed,
        )?;

        artifacts::write_failed(
            &log_dir.join(artifacts::FAILED_FILE_NAME),
            &self.stats.failed,
        )?;
        self.store.persist(&log_dir.join(DICTIONARY_FILE_NAME))?;
        Ok(())
    }

    /// Recover real names from marker files in already-renamed directories,
    /// pairing each with the `Subject<N>` component of its path.
    fn patient_log_from_markers(&self, roots: &[PathBuf]) -> Result<Vec<(String, String)>> {
        let mut log = Vec::new();
        for root in roots {
            for marker in self.scanner.find_markers(&[root])?.found {
                let Some(alias) = alias_component(&marker) else {
                    continue;
                };
                match marker_patient_name(&marker) {
                    Ok(Some(name)) => {
                        if !log.iter().any(|(n, _)| n == &name) {
                            log.push((name, alias));
                        }
                    }
                    Ok(None) => {
                        warn!(marker = %marker.display(), "No patient name in marker file")
                    }
                    Err(e) => {
                        warn!(marker = %marker.display(), error = %e, "Unreadable marker file")
                    }
                }
            }
        }
        Ok(log)
    }

    fn outcome(&self, aborted: bool, renamed: usize) -> RunOutcome {
        RunOutcome {
            aborted,
            renamed,
            stats: self.stats.clone(),
            previous_entries: self.store.previous_entry_count(),
            current_entries: self.store.len(),
        }
    }
}

/// The `Subject<N>` component of a path, if any.
fn alias_component(path: &Path) -> Option<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .find(|c| c.starts_with("Subject"))
        .map(|c| c.into_owned())
}

/// The patient name recorded in a marker file's PATIENT record.
fn marker_patient_name(marker: &Path) -> Result<Option<String>> {
    let obj = open_file(marker)?;
    let records = obj
        .element(tags::DIRECTORY_RECORD_SEQUENCE)
        .map_err(|e| CohortError::Dicom(format!("no directory record sequence: {e}")))?;
    let Some(items) = records.items() else {
        return Ok(None);
    };
    for item in items {
        let is_patient = item
            .element(tags::DIRECTORY_RECORD_TYPE)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim() == "PATIENT")
            .unwrap_or(false);
        if is_patient {
            return Ok(item
                .element(tags::PATIENT_NAME)
                .ok()
                .and_then(|e| e.to_str().ok())
                .map(|s| s.trim().to_string()));
        }
    }
    Ok(None)
}

fn subdirectory_names(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(CohortError::InvalidPath(root.to_path_buf()));
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
