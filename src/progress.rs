use std::path::Path;

/// Trait for reporting conversion progress
/// This lets the CLI and tests observe a batch without the engine knowing who is listening
pub trait ProgressReporter {
    /// Set the total number of files to be processed
    fn set_total_files(&self, total: usize);

    /// Update current progress
    fn update_progress(&self, handled: usize, failed: usize);

    /// Report that conversion has started
    fn start_conversion(&self) {}

    /// Report that conversion has finished
    fn finish_conversion(&self) {}

    /// Report an error for a specific file
    fn report_error(&self, _file_path: &Path, _error: &str) {}

    /// Report successful conversion of a file
    fn report_success(&self, _output_path: &Path, _original_size: u64, _compressed_size: u64) {}

    /// Report a file skipped because its output already exists
    fn report_skip(&self, _file_path: &Path) {}
}

/// A no-op progress reporter for when progress reporting is not needed
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn set_total_files(&self, _total: usize) {}
    fn update_progress(&self, _handled: usize, _failed: usize) {}
}

/// Console-based progress reporter using indicatif
#[cfg(feature = "cli")]
pub struct ConsoleProgressReporter {
    progress_bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ConsoleProgressReporter {
    pub fn new() -> Self {
        let progress_bar = indicatif::ProgressBar::new(0);
        // The template is a literal, so parsing only fails on a typo here
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        Self { progress_bar }
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for ConsoleProgressReporter {
    fn set_total_files(&self, total: usize) {
        self.progress_bar.set_length(total as u64);
    }

    fn update_progress(&self, handled: usize, _failed: usize) {
        self.progress_bar.set_position(handled as u64);
    }

    fn start_conversion(&self) {
        self.progress_bar.set_message("Converting...");
    }

    fn finish_conversion(&self) {
        self.progress_bar.finish_and_clear();
    }

    fn report_error(&self, file_path: &Path, error: &str) {
        self.progress_bar
            .println(format!("❌ {}: {error}", file_path.display()));
    }

    fn report_success(&self, output_path: &Path, original_size: u64, compressed_size: u64) {
        let ratio = if original_size > 0 {
            (1.0 - compressed_size as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };

        self.progress_bar.println(format!(
            "✅ {} ({}, {:.1}% smaller)",
            output_path.display(),
            humansize::format_size(compressed_size, humansize::DECIMAL),
            ratio
        ));
    }

    fn report_skip(&self, file_path: &Path) {
        self.progress_bar
            .println(format!("⏭️ {} (output exists)", file_path.display()));
    }
}
