//! External decompression via the GDCM command-line tool
//!
//! Lossless-JPEG and friends are handed to `gdcmconv --raw`, which rewrites
//! the file with native pixel data. Availability is probed once at
//! construction; every converter owns its decompressor instance.

use crate::domain::{CohortError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

const GDCMCONV: &str = "gdcmconv";

/// Suffix given to decompressed side files.
const DECOMP_SUFFIX: &str = "_decomp";

/// Wrapper around the `gdcmconv` subprocess.
#[derive(Debug)]
pub struct Decompressor {
    available: bool,
}

impl Decompressor {
    /// Probe for `gdcmconv` once. A missing tool is not an error here;
    /// [`decompress`](Self::decompress) reports it per file.
    pub fn probe() -> Self {
        let available = Command::new(GDCMCONV)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        if !available {
            warn!(
                tool = GDCMCONV,
                "Decompression tool not found, compressed images will be skipped"
            );
        }
        Self { available }
    }

    #[cfg(test)]
    fn unavailable() -> Self {
        Self { available: false }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Decompress `src` into a `_decomp.dcm` side file and return its path.
    /// The caller removes the side file when done with it.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Decompress`] when the tool is missing, exits
    /// nonzero, or produces no output file.
    pub fn decompress(&self, src: &Path) -> Result<PathBuf> {
        if !self.available {
            return Err(CohortError::Decompress(format!(
                "{GDCMCONV} is not installed"
            )));
        }
        let dst = side_file_name(src);
        debug!(src = %src.display(), dst = %dst.display(), "Decompressing image");
        let status = Command::new(GDCMCONV)
            .arg("--raw")
            .arg(src)
            .arg(&dst)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| CohortError::Decompress(format!("failed to run {GDCMCONV}: {e}")))?;
        if !status.success() {
            return Err(CohortError::Decompress(format!(
                "{GDCMCONV} exited with {status} for {}",
                src.display()
            )));
        }
        if !dst.is_file() {
            return Err(CohortError::Decompress(format!(
                "{GDCMCONV} produced no output for {}",
                src.display()
            )));
        }
        Ok(dst)
    }
}

/// `<stem>_decomp.dcm` next to the source, dropping a `.dcm` extension first.
fn side_file_name(src: &Path) -> PathBuf {
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".dcm")
        .or_else(|| name.strip_suffix(".DCM"))
        .unwrap_or(&name);
    src.with_file_name(format!("{stem}{DECOMP_SUFFIX}.dcm"))
}
