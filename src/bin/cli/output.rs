//! Output formatting for CLI operations.

use paktools::read::ExtractReport;
use paktools::tool::{Listing, compression_percent, human_size};
use serde_json::json;

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats a merged listing
    fn format_listing(&self, listing: &Listing) -> String;

    /// Formats extraction results
    fn format_extract_report(&self, report: &ExtractReport) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_listing(&self, listing: &Listing) -> String {
        let mut output = String::new();
        for line in listing.lines() {
            output.push_str(&line);
            output.push('\n');
        }
        output.push_str(&listing.total_line());
        output.push('\n');
        output
    }

    fn format_extract_report(&self, report: &ExtractReport) -> String {
        let mut output = format!(
            "Extracted {} files ({})\n",
            report.files_extracted,
            human_size(report.bytes_written)
        );

        if report.is_err() {
            output.push_str(&format!("Failed:    {}\n", report.errors));
            output.push_str("\nFailures:\n");
            for (path, error) in &report.failures {
                output.push_str(&format!("  {}: {}\n", path, error));
            }
        }

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_listing(&self, listing: &Listing) -> String {
        let items: Vec<_> = listing
            .entries()
            .iter()
            .map(|e| {
                json!({
                    "path": e.path,
                    "uncompressed_size": e.uncompressed_size,
                    "compressed_size": e.compressed_size,
                    "compression_percent": compression_percent(e.compressed_size, e.uncompressed_size),
                    "source": e.source.name(),
                })
            })
            .collect();
        let obj = json!({
            "entries": items,
            "total_compressed_size": listing.total_compressed(),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_extract_report(&self, report: &ExtractReport) -> String {
        let obj = json!({
            "success": report.is_ok(),
            "files_extracted": report.files_extracted,
            "bytes_written": report.bytes_written,
            "errors": report.errors,
            "failures": report.failures.iter().map(|(p, e)| json!({"path": p, "error": e})).collect::<Vec<_>>(),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}
