//! Filesystem discovery for DICOM trees
//!
//! Clinical archives arrive with unreliable extensions, so files are
//! classified by content: the `DICM` magic at byte offset 128 marks a DICOM
//! file regardless of its name. The `DICOMDIR` manifest is a marker file and
//! deliberately not an image, even though it carries the same magic.

use crate::domain::Result;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File name of the per-patient manifest.
pub const MARKER_FILE_NAME: &str = "DICOMDIR";

/// What the scanner is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A DICOM image (magic present, name is not `DICOMDIR`)
    DicomImage,
    /// The `DICOMDIR` manifest
    Marker,
    /// A `.png` raster
    Raster,
}

/// One observation during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    /// A file of the requested kind, absolute path
    Found(PathBuf),
    /// An entry that could not be read or statted; the walk continues
    Invalid(PathBuf),
}

/// Result of a walk: what was found, what was unreadable, and whether the
/// walk was cut short by an interrupt.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub found: Vec<PathBuf>,
    pub invalid: Vec<PathBuf>,
    pub interrupted: bool,
}

/// Combined result of a single-pass walk for images and markers.
#[derive(Debug, Default)]
pub struct FullScanResult {
    pub images: Vec<PathBuf>,
    pub markers: Vec<PathBuf>,
    pub invalid: Vec<PathBuf>,
    pub interrupted: bool,
}

/// Recursive scanner over one or more root directories.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    interrupt: Option<Arc<AtomicBool>>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scanner that stops early when `flag` becomes true, returning
    /// whatever it has collected so far.
    pub fn with_interrupt(flag: Arc<AtomicBool>) -> Self {
        Self {
            interrupt: Some(flag),
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Walk `roots` collecting files of `kind`. Unreadable entries are
    /// recorded as invalid and never abort the walk. No ordering guarantee;
    /// callers sort when order matters.
    pub fn scan<P: AsRef<Path>>(&self, roots: &[P], kind: FileKind) -> Result<ScanResult> {
        let mut result = ScanResult::default();
        for entry in self.entries(roots, |path| classify(path) == Some(kind)) {
            match entry {
                Some(ScanEntry::Found(path)) => result.found.push(path),
                Some(ScanEntry::Invalid(path)) => result.invalid.push(path),
                None => {
                    result.interrupted = true;
                    break;
                }
            }
        }
        debug!(
            found = result.found.len(),
            invalid = result.invalid.len(),
            interrupted = result.interrupted,
            kind = ?kind,
            "Scan complete"
        );
        Ok(result)
    }

    /// All DICOM images under `roots`.
    pub fn find_images<P: AsRef<Path>>(&self, roots: &[P]) -> Result<ScanResult> {
        self.scan(roots, FileKind::DicomImage)
    }

    /// All `DICOMDIR` markers under `roots`.
    pub fn find_markers<P: AsRef<Path>>(&self, roots: &[P]) -> Result<ScanResult> {
        self.scan(roots, FileKind::Marker)
    }

    /// All `.png` files whose file name contains `contains`,
    /// case-insensitive. An empty filter matches everything.
    pub fn find_rasters<P: AsRef<Path>>(&self, roots: &[P], contains: &str) -> Result<ScanResult> {
        let needle = contains.to_lowercase();
        let mut result = ScanResult::default();
        let filter = |path: &Path| {
            classify(path) == Some(FileKind::Raster)
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase().contains(&needle))
                    .unwrap_or(false)
        };
        for entry in self.entries(roots, filter) {
            match entry {
                Some(ScanEntry::Found(path)) => result.found.push(path),
                Some(ScanEntry::Invalid(path)) => result.invalid.push(path),
                None => {
                    result.interrupted = true;
                    break;
                }
            }
        }
        Ok(result)
    }

    /// Single walk collecting both images and markers.
    pub fn find_all<P: AsRef<Path>>(&self, roots: &[P]) -> Result<FullScanResult> {
        let mut result = FullScanResult::default();
        for root in roots {
            for entry in WalkDir::new(root.as_ref()) {
                if self.interrupted() {
                    warn!("Scan interrupted, returning partial results");
                    result.interrupted = true;
                    return Ok(result);
                }
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        if let Some(path) = e.path() {
                            result.invalid.push(path.to_path_buf());
                        }
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                match classify(entry.path()) {
                    Some(FileKind::DicomImage) => result.images.push(entry.into_path()),
                    Some(FileKind::Marker) => result.markers.push(entry.into_path()),
                    _ => {}
                }
            }
        }
        Ok(result)
    }

    /// Shared walk driver. Yields `None` once on interrupt.
    fn entries<'a, P, F>(
        &'a self,
        roots: &'a [P],
        filter: F,
    ) -> impl Iterator<Item = Option<ScanEntry>> + 'a
    where
        P: AsRef<Path>,
        F: Fn(&Path) -> bool + 'a,
    {
        roots
            .iter()
            .flat_map(|root| WalkDir::new(root.as_ref()))
            .filter_map(move |entry| {
                if self.interrupted() {
                    warn!("Scan interrupted, returning partial results");
                    return Some(None);
                }
                match entry {
                    Ok(e) if e.file_type().is_file() => {
                        if filter(e.path()) {
                            Some(Some(ScanEntry::Found(e.into_path())))
                        } else {
                            None
                        }
                    }
                    Ok(_) => None,
                    Err(e) => e
                        .path()
                        .map(|p| Some(ScanEntry::Invalid(p.to_path_buf()))),
                }
            })
    }
}

/// Classify a file by name and content.
pub fn classify(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_string_lossy();
    if name == MARKER_FILE_NAME {
        return Some(FileKind::Marker);
    }
    if path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
    {
        return Some(FileKind::Raster);
    }
    if is_dicom_file(path) {
        return Some(FileKind::DicomImage);
    }
    None
}

/// True when the file carries the `DICM` magic, either after the standard
/// 128-byte preamble or, for headerless files, at offset zero.
pub fn is_dicom_file(path: &Path) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut header = [0u8; 132];
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return false,
        }
    }
    if filled >= 132 && &header[128..132] == b"DICM" {
        return true;
    }
    // headerless files carry the magic at offset zero
    filled >= 4 && &header[0..4] == b"DICM"
}
