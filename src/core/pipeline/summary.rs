//! End-of-run report

use std::path::PathBuf;

/// Aggregated counters across every root the pipeline processed.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    /// Dictionary entries before this run
    pub previous_entries: usize,
    /// Dictionary entries after this run
    pub total_entries: usize,
    /// Patient directories renamed to aliases
    pub patients_anonymized: usize,
    /// PNG images created
    pub images_converted: usize,
    /// Images that failed to convert
    pub images_failed: usize,
    /// DICOM images deleted after conversion
    pub images_removed: usize,
    /// PNGs copied into the selection tree
    pub selection_copied: usize,
    /// Images that stayed compressed after a decompression attempt
    pub compressed_failures: Vec<PathBuf>,
    /// The run stopped at a confirmation checkpoint
    pub aborted: bool,
}

impl RunReport {
    /// Whether every attempted item succeeded.
    pub fn is_complete_success(&self) -> bool {
        !self.aborted && self.images_failed == 0 && self.compressed_failures.is_empty()
    }

    /// Render the fixed-width report block.
    pub fn render(&self) -> String {
        let mut out = String::from("\n------------------ REPORT -------------------\n");
        if self.aborted {
            out.push_str("Run aborted at a confirmation checkpoint.\n");
            return out;
        }
        if self.previous_entries > 0 {
            out.push_str(&format!(
                "{:<40} {}\n",
                "Previous entries:", self.previous_entries
            ));
        }
        out.push_str(&format!(
            "{:<40} {}\n",
            "Patients anonymized:", self.patients_anonymized
        ));
        out.push_str(&format!(
            "{:<40} {}\n",
            "Dictionary's total entries:", self.total_entries
        ));
        out.push_str(&format!(
            "{:<40} {}\n",
            "DICOM images converted to png:", self.images_converted
        ));
        if self.images_failed > 0 {
            out.push_str(&format!(
                "{:<40} {}\n",
                "DICOM images failed to convert:", self.images_failed
            ));
        }
        out.push_str(&format!(
            "{:<40} {}\n",
            "Deleted DICOM images:", self.images_removed
        ));
        out.push_str(&format!(
            "{:<40} {}\n",
            "Images copied to selection:", self.selection_copied
        ));
        if !self.compressed_failures.is_empty() {
            out.push_str(&format!(
                "{:<40} {}\n",
                "Images that stayed compressed:",
                self.compressed_failures.len()
            ));
        }
        out
    }
}
