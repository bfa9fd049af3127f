//! Command implementations for the CLI tool.

use std::path::{Path, PathBuf};

use paktools::crypto::KeyChain;
use paktools::read::ExtractOptions;
use paktools::tool::{extract_files, list_files};

use crate::OutputFormat;
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::create_formatter;

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub output_dir: &'a Path,
    pub buffer_size: usize,
    pub format: OutputFormat,
    pub quiet: bool,
}

fn report_error(error: &paktools::Error) -> ExitCode {
    eprintln!("Error: {}", error);
    error_to_exit_code(error)
}

/// List command implementation
///
/// Prints nothing unless every container could be listed.
pub fn list(archives: &[PathBuf], keys: &KeyChain, format: OutputFormat) -> ExitCode {
    let formatter = create_formatter(format);

    match list_files(archives, keys) {
        Ok(listing) => {
            print!("{}", formatter.format_listing(&listing));
            ExitCode::Success
        }
        Err(e) => report_error(&e),
    }
}

/// Extract command implementation
///
/// Entry failures are reported but do not change the exit code.
pub fn extract(config: &ExtractConfig<'_>, keys: &KeyChain) -> ExitCode {
    let formatter = create_formatter(config.format);
    let options = ExtractOptions::new().buffer_size(config.buffer_size);

    match extract_files(config.archive_path, config.output_dir, keys, &options) {
        Ok(report) => {
            if !config.quiet || report.is_err() {
                print!("{}", formatter.format_extract_report(&report));
            }
            ExitCode::Success
        }
        Err(e) => report_error(&e),
    }
}
