//! Integration tests for the alias dictionary

use cohort::core::alias::store::{AliasStore, DICTIONARY_FILE_NAME, SIMILARITY_WARN_THRESHOLD};
use cohort::domain::CohortError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_create_persist_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DICTIONARY_FILE_NAME);

    let store = AliasStore::create(["Doe John", "Smith Jane", "Lee Kim"]).unwrap();
    store.persist(&path).unwrap();

    let loaded = AliasStore::load(&path).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.lookup("Doe John").unwrap(), "Subject1");
    assert_eq!(loaded.lookup("Smith Jane").unwrap(), "Subject2");
    assert_eq!(loaded.lookup("Lee Kim").unwrap(), "Subject3");
    assert_eq!(loaded.previous_entry_count(), 3);
}

#[test]
fn test_aliases_are_stable_across_updates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DICTIONARY_FILE_NAME);

    let store = AliasStore::create(["Doe John"]).unwrap();
    store.persist(&path).unwrap();

    let mut loaded = AliasStore::load(&path).unwrap();
    let (added, _) = loaded.update(["Smith Jane".to_string()], SIMILARITY_WARN_THRESHOLD);
    assert_eq!(added, 1);
    // existing mapping unchanged, new patient gets the next number
    assert_eq!(loaded.lookup("Doe John").unwrap(), "Subject1");
    assert_eq!(loaded.lookup("Smith Jane").unwrap(), "Subject2");

    loaded.persist(&path).unwrap();
    let reloaded = AliasStore::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.lookup("Smith Jane").unwrap(), "Subject2");
}

#[test]
fn test_update_reports_near_duplicates_without_blocking() {
    let mut store = AliasStore::create(["Doe John"]).unwrap();
    let (added, similar) = store.update(["Doe Jon".to_string()], SIMILARITY_WARN_THRESHOLD);

    // a likely typo is still added; the pair is only reported
    assert_eq!(added, 1);
    assert_eq!(similar.len(), 1);
    assert!(similar[0].score >= 0.7);
    assert_eq!(store.lookup("Doe Jon").unwrap(), "Subject2");
}

#[test]
fn test_update_ignores_exact_duplicates() {
    let mut store = AliasStore::create(["Doe John"]).unwrap();
    let (added, _) = store.update(["Doe John".to_string()], SIMILARITY_WARN_THRESHOLD);
    assert_eq!(added, 0);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_unknown_patient_lookup() {
    let store = AliasStore::create(["Doe John"]).unwrap();
    let err = store.lookup("Nobody Here").unwrap_err();
    assert!(matches!(err, CohortError::UnknownPatient(_)));
    assert!(!err.is_fatal());
}

#[test]
fn test_load_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DICTIONARY_FILE_NAME);
    fs::write(&path, "{ not json").unwrap();

    let err = AliasStore::load(&path).unwrap_err();
    assert!(matches!(err, CohortError::CorruptStore(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_load_rejects_duplicate_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DICTIONARY_FILE_NAME);
    fs::write(
        &path,
        r#"[
  {"real_name": "Doe John", "alias": "Subject1"},
  {"real_name": "Doe John", "alias": "Subject2"}
]"#,
    )
    .unwrap();

    let err = AliasStore::load(&path).unwrap_err();
    assert!(matches!(err, CohortError::CorruptStore(_)));
}

#[test]
fn test_persist_leaves_no_temp_file_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DICTIONARY_FILE_NAME);
    let store = AliasStore::create(["Doe John"]).unwrap();
    store.persist(&path).unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec![DICTIONARY_FILE_NAME.to_string()]);
}

#[test]
fn test_render_table_lists_every_entry() {
    let store = AliasStore::create(["Doe John", "Smith Jane"]).unwrap();
    let table = store.render_table();
    assert!(table.contains("Patient's Name"));
    assert!(table.contains("Doe John"));
    assert!(table.contains("Subject2"));
}
