//! # webpdrop
//!
//! Drop-and-convert image to WebP utility.
//!
//! Takes a list of image paths, keeps the ones with a supported extension and
//! runs the `cwebp` encoder once per file, writing the result to the folder
//! selected by the persisted save-location setting.

pub mod config;
pub mod converter;
pub mod core;
pub mod output;
pub mod progress;
pub mod stats;
pub mod status;
pub mod utils;

// Re-export commonly used types
pub use config::{ConversionOptions, SaveLocation, SaveLocationType, Settings};
pub use converter::{ConverterBackend, CwebpCommand, ImageConverter};
pub use core::BatchConverter;
pub use progress::ProgressReporter;
pub use stats::ConversionStats;
pub use status::{Status, StatusBoard, StatusReporter};
pub use utils::{format_duration, is_supported_extension, validate_image_file, ImageValidationError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of one batch run
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversionReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub total_inputs: u64,
    pub accepted_files: u64,
    pub converted_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    /// Files a dry run would have converted
    #[serde(default)]
    pub planned_files: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
    pub quality: u8,
    pub save_location: String,
    pub backend: String,
    pub dry_run: bool,
    pub last_output_dir: Option<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub unsupported: Vec<PathBuf>,
    pub format_stats: HashMap<String, u64>,
    pub errors: Vec<String>,
}

impl ConversionReport {
    /// True when at least one file was accepted by the extension filter
    pub fn had_images(&self) -> bool {
        self.accepted_files > 0
    }

    pub fn space_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }
}

/// Report output formats
#[derive(Debug, Clone, PartialEq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ReportFormat::Json => "webpdrop_report.json",
            ReportFormat::Csv => "webpdrop_report.csv",
        }
    }
}

/// Write a conversion report in the given format
pub fn generate_report(report: &ConversionReport, format: &ReportFormat, path: &Path) -> Result<()> {
    let contents = match format {
        ReportFormat::Json => serde_json::to_string_pretty(report)?,
        ReportFormat::Csv => render_csv_report(report),
    };
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    log::info!("Report saved to: {}", path.display());
    Ok(())
}

fn render_csv_report(report: &ConversionReport) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "metric,value");
    let _ = writeln!(out, "start_time,{}", report.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "end_time,{}", report.end_time.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "duration_seconds,{:.3}", report.duration.as_secs_f64());
    let _ = writeln!(out, "total_inputs,{}", report.total_inputs);
    let _ = writeln!(out, "accepted_files,{}", report.accepted_files);
    let _ = writeln!(out, "converted_files,{}", report.converted_files);
    let _ = writeln!(out, "failed_files,{}", report.failed_files);
    let _ = writeln!(out, "skipped_files,{}", report.skipped_files);
    let _ = writeln!(out, "planned_files,{}", report.planned_files);
    let _ = writeln!(out, "unsupported_files,{}", report.unsupported.len());
    let _ = writeln!(out, "original_size_bytes,{}", report.original_size);
    let _ = writeln!(out, "compressed_size_bytes,{}", report.compressed_size);
    let _ = writeln!(out, "compression_ratio,{:.2}", report.compression_ratio);
    let _ = writeln!(out, "quality,{}", report.quality);
    let _ = writeln!(out, "save_location,\"{}\"", report.save_location.replace('"', "\"\""));
    let _ = writeln!(out, "backend,{}", report.backend);
    out
}
