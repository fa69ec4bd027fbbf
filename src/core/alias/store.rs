//! Persistent alias dictionary
//!
//! Maps real patient names to stable `Subject<N>` aliases. The store is
//! append-only: aliases are never reassigned or renumbered, so a dictionary
//! written by an earlier run keeps its meaning when later runs extend it.

use crate::core::alias::similarity;
use crate::domain::{CohortError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default file name for the persisted dictionary.
pub const DICTIONARY_FILE_NAME: &str = "cohort_dictionary.json";

/// Default ratio above which a new name is reported as a possible duplicate.
pub const SIMILARITY_WARN_THRESHOLD: f64 = 0.7;

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub real_name: String,
    pub alias: String,
}

/// A possible near-duplicate found while updating the dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarPair {
    pub new_name: String,
    pub existing_name: String,
    pub score: f64,
}

/// Ordered, append-only mapping from real patient names to aliases.
#[derive(Debug, Clone)]
pub struct AliasStore {
    records: Vec<AliasRecord>,
    index: HashMap<String, usize>,
    previous_entry_count: usize,
}

impl AliasStore {
    /// Build a fresh dictionary from candidate names.
    ///
    /// Aliases are assigned sequentially in the order the names are given.
    /// Duplicate candidates are collapsed to their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Validation`] when `candidates` is empty: an
    /// empty dictionary is almost always a mis-pointed scan root.
    pub fn create<I, S>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self {
            records: Vec::new(),
            index: HashMap::new(),
            previous_entry_count: 0,
        };
        for name in candidates {
            store.insert(name.into());
        }
        if store.records.is_empty() {
            return Err(CohortError::Validation(
                "Cannot create an alias dictionary from an empty name list".to_string(),
            ));
        }
        info!(entries = store.records.len(), "Created alias dictionary");
        Ok(store)
    }

    /// Load a dictionary previously written by [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::CorruptStore`] when the file cannot be read or
    /// does not parse as an array of records. A corrupt dictionary must stop
    /// the run: renaming against a bad mapping destroys data.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CohortError::CorruptStore(format!("cannot read {}: {e}", path.display()))
        })?;
        let records: Vec<AliasRecord> = serde_json::from_str(&contents).map_err(|e| {
            CohortError::CorruptStore(format!("cannot parse {}: {e}", path.display()))
        })?;
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.real_name.clone(), i).is_some() {
                return Err(CohortError::CorruptStore(format!(
                    "duplicate entry for \"{}\" in {}",
                    record.real_name,
                    path.display()
                )));
            }
        }
        let previous_entry_count = records.len();
        debug!(
            path = %path.display(),
            entries = previous_entry_count,
            "Loaded alias dictionary"
        );
        Ok(Self {
            records,
            index,
            previous_entry_count,
        })
    }

    /// Append any names not already present, continuing the numeric sequence.
    ///
    /// Returns the number of entries added. Names that score at or above
    /// `warn_threshold` against an existing entry are still added; the
    /// near-duplicates are logged and returned so the caller can surface
    /// them, but they never block the update.
    pub fn update<I, S>(&mut self, new_names: I, warn_threshold: f64) -> (usize, Vec<SimilarPair>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        let mut similar = Vec::new();
        for name in new_names {
            let name = name.into();
            if self.index.contains_key(&name) {
                continue;
            }
            for existing in &self.records {
                let score = similarity::ratio(&name, &existing.real_name);
                if score >= warn_threshold && score < 1.0 {
                    warn!(
                        new_name = %name,
                        existing_name = %existing.real_name,
                        score = format!("{score:.2}"),
                        "New name resembles an existing dictionary entry"
                    );
                    similar.push(SimilarPair {
                        new_name: name.clone(),
                        existing_name: existing.real_name.clone(),
                        score,
                    });
                }
            }
            self.insert(name);
            added += 1;
        }
        if added > 0 {
            info!(added, total = self.records.len(), "Updated alias dictionary");
        }
        (added, similar)
    }

    /// Write the dictionary as a JSON array, via a temp file and rename so a
    /// crash never leaves a half-written dictionary behind.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), entries = self.records.len(), "Persisted alias dictionary");
        Ok(())
    }

    /// Resolve a real name to its alias.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::UnknownPatient`] when the name has no entry.
    pub fn lookup(&self, real_name: &str) -> Result<&str> {
        self.index
            .get(real_name)
            .map(|&i| self.records[i].alias.as_str())
            .ok_or_else(|| CohortError::UnknownPatient(real_name.to_string()))
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[AliasRecord] {
        &self.records
    }

    /// Whether `name` is one of the assigned aliases.
    pub fn contains_alias(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.alias == name)
    }

    /// Number of entries right now.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entry count at load time, before any `update` in this run.
    pub fn previous_entry_count(&self) -> usize {
        self.previous_entry_count
    }

    /// Render the boxed, numbered table shown by the `dictionary` command.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(" {} \n", "-".repeat(71)));
        out.push_str(&format!(
            "| {:^3} | {:^50} | {:^10} |\n",
            "No.", "Patient's Name", "Alias"
        ));
        out.push_str(&format!(
            "| {:<3} | {:<50} | {:<10} |\n",
            "-".repeat(3),
            "-".repeat(50),
            "-".repeat(10)
        ));
        for (i, record) in self.records.iter().enumerate() {
            out.push_str(&format!(
                "| {:<3} | {:<50} | {:<10} |\n",
                format!("{}.", i + 1),
                record.real_name,
                record.alias
            ));
        }
        out.push_str(&format!(" {} ", "-".repeat(71)));
        out
    }

    fn insert(&mut self, real_name: String) {
        if self.index.contains_key(&real_name) {
            return;
        }
        let alias = format!("Subject{}", self.records.len() + 1);
        self.index.insert(real_name.clone(), self.records.len());
        self.records.push(AliasRecord { real_name, alias });
    }
}
