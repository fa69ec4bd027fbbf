//! Alias dictionary: stable patient-name pseudonyms
//!
//! Patients are identified across runs by `Subject<N>` aliases held in a
//! persisted, append-only dictionary. [`store`] owns the mapping and its
//! JSON round-trip; [`similarity`] supplies the near-duplicate warning ratio.

pub mod similarity;
pub mod store;

pub use similarity::ratio;
pub use store::{AliasRecord, AliasStore, SimilarPair, DICTIONARY_FILE_NAME};
