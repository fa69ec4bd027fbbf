//! DICOM-to-PNG conversion
//!
//! Conversion is the anonymization step for pixel data: the PNG output keeps
//! only the series description and instance number, both coded into the file
//! name. Identity survives solely in the conversion log, which is rewritten
//! by the anonymizer afterwards.

pub mod codec;
pub mod decompress;
pub mod dirlog;

pub use codec::{DecodeResult, PixelBuffer};
pub use decompress::Decompressor;
pub use dirlog::{ConversionLog, CONVERSION_LOG_FILE_NAME};

use crate::core::scan::{Scanner, MARKER_FILE_NAME};
use crate::domain::{CohortError, Result};
use crate::interact::Selector;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File listing the images that stayed compressed after a decompression
/// attempt.
pub const COMPRESSED_REPORT_FILE_NAME: &str = "compressed_images.txt";

/// Aggregate conversion counters across patients.
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Extra PNGs emitted by multiframe images, beyond one per source file
    pub extra_frames: usize,
    /// DICOM files deleted during cleanup
    pub removed: usize,
}

impl ConversionStats {
    pub fn pngs_created(&self) -> usize {
        self.succeeded + self.extra_frames
    }
}

/// Converts patients' DICOM images to PNG, maintaining the conversion log
/// and optionally deleting the originals afterwards.
#[derive(Debug)]
pub struct Converter {
    scanner: Scanner,
    decompressor: Decompressor,
    cleanup: bool,
    log: ConversionLog,
    stats: ConversionStats,
    compressed_failures: Vec<PathBuf>,
}

impl Converter {
    pub fn new(scanner: Scanner, decompressor: Decompressor, cleanup: bool) -> Self {
        Self {
            scanner,
            decompressor,
            cleanup,
            log: ConversionLog::new(),
            stats: ConversionStats::default(),
            compressed_failures: Vec::new(),
        }
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    pub fn compressed_failures(&self) -> &[PathBuf] {
        &self.compressed_failures
    }

    pub fn log(&self) -> &ConversionLog {
        &self.log
    }

    /// Convert every DICOM image under one patient directory.
    ///
    /// Appends the patient's block to the conversion log in `log_dir` when a
    /// marker is present, asks the selector before converting and again
    /// before deleting, and leaves the PNGs next to their sources.
    pub fn convert_patient(
        &mut self,
        patient_dir: &Path,
        log_dir: &Path,
        selector: &mut dyn Selector,
    ) -> Result<()> {
        info!(patient = %patient_dir.display(), "Converting patient");
        let images = self.scanner.find_images(&[patient_dir])?.found;
        if images.is_empty() {
            return Err(CohortError::Validation(format!(
                "no DICOM images under {}",
                patient_dir.display()
            )));
        }

        let marker = patient_dir.join(MARKER_FILE_NAME);
        if marker.is_file() {
            self.log.add_patient(&marker)?;
            self.log.append_last(log_dir)?;
        }

        let keyword = if self.cleanup {
            "will delete"
        } else {
            "without deleting"
        };
        let answer = selector.confirm(&format!(
            "Proceeding will convert all DICOM to '.png' images ({keyword} the originals). \
             Do you want to proceed?"
        ))?;
        if !answer.is_yes() {
            info!(patient = %patient_dir.display(), "Conversion skipped");
            return Ok(());
        }

        let pb = progress_bar(images.len() as u64, "Converting images");
        let mut converted = 0;
        for dcm in &images {
            if self.convert_file(dcm)? {
                converted += 1;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        info!(
            patient = %patient_dir.display(),
            converted,
            total = images.len(),
            "Patient conversion finished"
        );

        if self.cleanup {
            self.cleanup_patient(patient_dir, selector)?;
        }
        Ok(())
    }

    /// Convert one file. Returns whether a PNG was written.
    pub fn convert_file(&mut self, dcm: &Path) -> Result<bool> {
        self.stats.attempted += 1;
        let buffer = match codec::decode(dcm)? {
            DecodeResult::Decoded(buffer) => buffer,
            DecodeResult::Invalid => {
                debug!(path = %dcm.display(), "Not a convertible image");
                self.stats.failed += 1;
                return Ok(false);
            }
            DecodeResult::Compressed => match self.decode_via_decompressor(dcm)? {
                Some(buffer) => buffer,
                None => {
                    self.compressed_failures.push(dcm.to_path_buf());
                    self.stats.failed += 1;
                    return Ok(false);
                }
            },
        };

        let dir = dcm
            .parent()
            .ok_or_else(|| CohortError::InvalidPath(dcm.to_path_buf()))?;
        if buffer.is_multiframe() {
            for (i, frame) in buffer.frames.iter().enumerate() {
                let name = codec::png_frame_name(&buffer.series_description, i);
                let path = codec::collision_free(dir, &name);
                frame
                    .save(&path)
                    .map_err(|e| CohortError::Decode(e.to_string()))?;
            }
            debug!(frames = buffer.frames.len(), "Image sequence written");
            self.stats.extra_frames += buffer.frames.len() - 1;
        } else {
            let name = codec::png_base_name(&buffer.series_description, buffer.instance_number);
            let path = codec::collision_free(dir, &name);
            buffer.frames[0]
                .save(&path)
                .map_err(|e| CohortError::Decode(e.to_string()))?;
        }
        self.stats.succeeded += 1;
        Ok(true)
    }

    /// Convert one file, naming the PNG after the source file instead of its
    /// series metadata. Used for auxiliary-scan directories, whose file
    /// names are already meaningful.
    pub fn convert_file_same_name(&mut self, dcm: &Path) -> Result<bool> {
        self.stats.attempted += 1;
        let buffer = match codec::decode(dcm)? {
            DecodeResult::Decoded(buffer) => buffer,
            DecodeResult::Invalid => {
                self.stats.failed += 1;
                return Ok(false);
            }
            DecodeResult::Compressed => match self.decode_via_decompressor(dcm)? {
                Some(buffer) => buffer,
                None => {
                    self.compressed_failures.push(dcm.to_path_buf());
                    self.stats.failed += 1;
                    return Ok(false);
                }
            },
        };

        let dir = dcm
            .parent()
            .ok_or_else(|| CohortError::InvalidPath(dcm.to_path_buf()))?;
        let stem = dcm
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        if buffer.is_multiframe() {
            for (i, frame) in buffer.frames.iter().enumerate() {
                let path = codec::collision_free(dir, &format!("{stem}_{:03}", i + 1));
                frame
                    .save(&path)
                    .map_err(|e| CohortError::Decode(e.to_string()))?;
            }
            self.stats.extra_frames += buffer.frames.len() - 1;
        } else {
            let path = codec::collision_free(dir, &stem);
            buffer.frames[0]
                .save(&path)
                .map_err(|e| CohortError::Decode(e.to_string()))?;
        }
        self.stats.succeeded += 1;
        Ok(true)
    }

    /// Route a compressed image through gdcmconv, decode the side file, and
    /// remove it. `None` means the image stayed undecodable.
    fn decode_via_decompressor(&mut self, dcm: &Path) -> Result<Option<PixelBuffer>> {
        let side = match self.decompressor.decompress(dcm) {
            Ok(side) => side,
            Err(e) => {
                warn!(path = %dcm.display(), error = %e, "Decompression failed");
                return Ok(None);
            }
        };
        let result = codec::decode(&side)?;
        fs::remove_file(&side)?;
        match result {
            DecodeResult::Decoded(buffer) => Ok(Some(buffer)),
            _ => {
                warn!(path = %dcm.display(), "Image still undecodable after decompression");
                Ok(None)
            }
        }
    }

    /// Delete all remaining DICOM images under the patient, gated by one
    /// more confirmation. Re-scans first so decompression side files are
    /// caught too.
    fn cleanup_patient(&mut self, patient_dir: &Path, selector: &mut dyn Selector) -> Result<()> {
        let answer = selector
            .confirm("Proceeding will delete all DICOM images. Do you want to proceed?")?;
        if !answer.is_yes() {
            info!(patient = %patient_dir.display(), "Cleanup skipped");
            return Ok(());
        }
        let images = self.scanner.find_images(&[patient_dir])?.found;
        let pb = progress_bar(images.len() as u64, "Deleting images");
        for dcm in &images {
            fs::remove_file(dcm)?;
            self.stats.removed += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();
        info!(
            patient = %patient_dir.display(),
            deleted = images.len(),
            "Cleanup finished"
        );
        Ok(())
    }

    /// Write the list of images that stayed compressed, if any.
    pub fn write_compressed_report(&self, log_dir: &Path) -> Result<Option<PathBuf>> {
        if self.compressed_failures.is_empty() {
            return Ok(None);
        }
        let path = log_dir.join(COMPRESSED_REPORT_FILE_NAME);
        let mut out = String::from("DICOM images that failed due to compression:\n");
        for p in &self.compressed_failures {
            out.push_str(&format!("{}\n", p.display()));
        }
        fs::write(&path, out)?;
        Ok(Some(path))
    }

    /// The end-of-run report block.
    pub fn render_report(&self) -> String {
        let mut out = String::from("\n------------------- Report -------------------\n");
        out.push_str(&format!(
            "{:<40} {}\n",
            "DICOM-to-png conversions attempted:", self.stats.attempted
        ));
        out.push_str(&format!(
            "{:<40} {}\n",
            "DICOM-to-png conversions successful:", self.stats.succeeded
        ));
        out.push_str(&format!(
            "{:<40} {}\n",
            "DICOM-to-png conversions failed:", self.stats.failed
        ));
        out.push_str(&format!(
            "{:<40} {}\n",
            "Total number of .png images created:",
            self.stats.pngs_created()
        ));
        if self.cleanup {
            out.push_str(&format!(
                "{:<40} {}\n",
                "Deleted DICOM images:", self.stats.removed
            ));
        }
        out
    }
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(message);
    pb
}
