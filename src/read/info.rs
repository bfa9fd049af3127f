//! Extraction result types.

/// Result of extracting every entry of one container.
///
/// Entry-level failures are recorded here instead of aborting the run.
#[must_use = "extraction reports should be checked for partial failures"]
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Number of entries written completely.
    pub files_extracted: usize,
    /// Total bytes written.
    pub bytes_written: u64,
    /// Number of entries that failed.
    pub errors: usize,
    /// Detailed failures (entry path and error message).
    pub failures: Vec<(String, String)>,
}

impl ExtractReport {
    /// Returns true if every entry was extracted.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Returns true if any entry failed.
    pub fn is_err(&self) -> bool {
        self.errors > 0
    }

    pub(crate) fn record_success(&mut self, bytes: u64) {
        self.files_extracted += 1;
        self.bytes_written += bytes;
    }

    pub(crate) fn record_failure(&mut self, path: impl Into<String>, error: &crate::Error) {
        self.errors += 1;
        self.failures.push((path.into(), error.to_string()));
    }
}
