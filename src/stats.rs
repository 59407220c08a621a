use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Running totals for one batch. Files are converted one after another, so
/// plain counters suffice.
#[derive(Debug, Clone, Default)]
pub struct ConversionStats {
    pub converted: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Files a dry run would have converted
    pub planned: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    outputs: Vec<PathBuf>,
    format_stats: HashMap<String, u64>,
    errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone)]
struct ErrorRecord {
    file_path: PathBuf,
    error_message: String,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, output: &Path, original_size: u64, compressed_size: u64) {
        self.converted += 1;
        self.original_size += original_size;
        self.compressed_size += compressed_size;
        self.outputs.push(output.to_path_buf());
    }

    pub fn record_error(&mut self, file_path: &Path, error: String) {
        self.failed += 1;
        self.errors.push(ErrorRecord {
            file_path: file_path.to_path_buf(),
            error_message: error,
        });
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_planned(&mut self) {
        self.planned += 1;
    }

    pub fn record_format(&mut self, format: &str) {
        *self.format_stats.entry(format.to_string()).or_insert(0) += 1;
    }

    /// Output size relative to input size, 0 when nothing was converted
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size > 0 {
            self.compressed_size as f64 / self.original_size as f64
        } else {
            0.0
        }
    }

    /// Files handled so far, whatever the outcome
    pub fn handled(&self) -> u64 {
        self.converted + self.failed + self.skipped + self.planned
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn format_stats(&self) -> &HashMap<String, u64> {
        &self.format_stats
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.file_path.display(), e.error_message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_ratio() {
        let mut stats = ConversionStats::new();
        stats.record_success(Path::new("a.webp"), 1000, 250);
        stats.record_success(Path::new("b.webp"), 1000, 750);
        stats.record_error(Path::new("c.png"), "exit status 2".to_string());
        stats.record_skip();
        stats.record_planned();

        assert_eq!(stats.converted, 2);
        assert_eq!(stats.planned, 1);
        assert_eq!(stats.handled(), 5);
        assert!((stats.compression_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.outputs().len(), 2);
        assert_eq!(stats.errors(), vec!["c.png: exit status 2".to_string()]);
    }

    #[test]
    fn test_empty_ratio_is_zero() {
        assert_eq!(ConversionStats::new().compression_ratio(), 0.0);
    }
}
