//! User-facing status line.
//!
//! The status follows `idle -> converting -> done | planned | no images | error`,
//! and any terminal state falls back to idle once [`RESET_AFTER`] has elapsed.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::progress::ProgressReporter;
use crate::ConversionReport;

/// How long a finished status stays visible
pub const RESET_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Converting {
        done: usize,
        total: usize,
    },
    Done {
        converted: u64,
        failed: u64,
        /// File name of the output when exactly one file was converted
        single_output: Option<String>,
    },
    /// Dry run finished; nothing was written
    Planned {
        files: u64,
        failed: u64,
    },
    NoImages,
    Error(String),
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Done { .. } | Status::Planned { .. } | Status::NoImages | Status::Error(_)
        )
    }

    pub fn message(&self) -> String {
        match self {
            Status::Idle => "Add files to convert".to_string(),
            Status::Converting { done, total } => format!("Converting... ({done}/{total})"),
            Status::Done {
                converted,
                failed,
                single_output,
            } => {
                let mut message = match single_output {
                    Some(name) if *failed == 0 => format!("Converted to {name}"),
                    _ if *converted == 1 => "1 file converted".to_string(),
                    _ => format!("{converted} files converted"),
                };
                if *failed > 0 {
                    message.push_str(&format!(", {failed} failed"));
                }
                message
            }
            Status::Planned { files, failed } => {
                let mut message = if *files == 1 {
                    "1 file would be converted".to_string()
                } else {
                    format!("{files} files would be converted")
                };
                if *failed > 0 {
                    message.push_str(&format!(", {failed} failed"));
                }
                message
            }
            Status::NoImages => "No image files among the selected files".to_string(),
            Status::Error(e) => format!("Conversion failed: {e}"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Current status plus the moment it should revert to idle
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    status: Status,
    reset_at: Option<Instant>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn begin(&mut self, total: usize) {
        self.set(Status::Converting { done: 0, total }, None);
    }

    /// Count one more file as handled. Ignored unless a conversion is running.
    pub fn advance(&mut self) {
        if let Status::Converting { done, total } = &mut self.status {
            *done = (*done + 1).min(*total);
        }
    }

    pub fn finish(&mut self, report: &ConversionReport) {
        self.finish_at(report, Instant::now());
    }

    pub fn finish_at(&mut self, report: &ConversionReport, now: Instant) {
        let status = if !report.had_images() {
            Status::NoImages
        } else if report.dry_run {
            Status::Planned {
                files: report.planned_files,
                failed: report.failed_files,
            }
        } else {
            let single_output = match report.outputs.as_slice() {
                [only] if report.accepted_files == 1 => only
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()),
                _ => None,
            };
            Status::Done {
                converted: report.converted_files,
                failed: report.failed_files,
                single_output,
            }
        };
        self.set(status, Some(now + RESET_AFTER));
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.fail_at(message, Instant::now());
    }

    pub fn fail_at(&mut self, message: impl Into<String>, now: Instant) {
        self.set(Status::Error(message.into()), Some(now + RESET_AFTER));
    }

    /// Revert to idle if the reset deadline has passed. Returns true on change.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(deadline) if now >= deadline => {
                self.set(Status::Idle, None);
                true
            }
            _ => false,
        }
    }

    /// Time left before the status reverts to idle
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.reset_at.map(|deadline| deadline.saturating_duration_since(now))
    }

    fn set(&mut self, status: Status, reset_at: Option<Instant>) {
        log::debug!("Status: {}", status);
        self.status = status;
        self.reset_at = reset_at;
    }
}

/// Forwards batch events to another reporter while keeping a [`StatusBoard`]
/// in step with them
pub struct StatusReporter<'a> {
    inner: &'a dyn ProgressReporter,
    board: RefCell<StatusBoard>,
}

impl<'a> StatusReporter<'a> {
    pub fn new(inner: &'a dyn ProgressReporter) -> Self {
        Self {
            inner,
            board: RefCell::new(StatusBoard::new()),
        }
    }

    pub fn status(&self) -> Status {
        self.board.borrow().status().clone()
    }

    pub fn into_board(self) -> StatusBoard {
        self.board.into_inner()
    }
}

impl ProgressReporter for StatusReporter<'_> {
    fn set_total_files(&self, total: usize) {
        self.board.borrow_mut().begin(total);
        self.inner.set_total_files(total);
    }

    fn update_progress(&self, handled: usize, failed: usize) {
        self.board.borrow_mut().advance();
        self.inner.update_progress(handled, failed);
    }

    fn start_conversion(&self) {
        self.inner.start_conversion();
    }

    fn finish_conversion(&self) {
        self.inner.finish_conversion();
    }

    fn report_error(&self, file_path: &Path, error: &str) {
        self.inner.report_error(file_path, error);
    }

    fn report_success(&self, output_path: &Path, original_size: u64, compressed_size: u64) {
        self.inner.report_success(output_path, original_size, compressed_size);
    }

    fn report_skip(&self, file_path: &Path) {
        self.inner.report_skip(file_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoOpProgressReporter;
    use chrono::Utc;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn report(accepted: u64, converted: u64, failed: u64, outputs: &[&str]) -> ConversionReport {
        let now = Utc::now();
        ConversionReport {
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            total_inputs: accepted,
            accepted_files: accepted,
            converted_files: converted,
            failed_files: failed,
            skipped_files: 0,
            planned_files: 0,
            original_size: 0,
            compressed_size: 0,
            compression_ratio: 0.0,
            quality: 75,
            save_location: "original folder".to_string(),
            backend: "External".to_string(),
            dry_run: false,
            last_output_dir: None,
            outputs: outputs.iter().map(PathBuf::from).collect(),
            unsupported: Vec::new(),
            format_stats: HashMap::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_progress_then_done_then_reset() {
        let start = Instant::now();
        let mut board = StatusBoard::new();
        assert_eq!(board.status(), &Status::Idle);

        board.begin(2);
        board.advance();
        assert_eq!(board.status().message(), "Converting... (1/2)");
        board.advance();
        board.advance();
        assert_eq!(board.status(), &Status::Converting { done: 2, total: 2 });
        assert!(!board.tick(start + Duration::from_secs(60)));

        board.finish_at(&report(2, 2, 0, &["/o/a.webp", "/o/b.webp"]), start);
        assert_eq!(board.status().message(), "2 files converted");
        assert!(!board.tick(start + Duration::from_millis(2999)));
        assert!(board.tick(start + RESET_AFTER));
        assert_eq!(board.status(), &Status::Idle);
        assert_eq!(board.remaining(start), None);
    }

    #[test]
    fn test_single_file_names_output() {
        let mut board = StatusBoard::new();
        board.finish_at(&report(1, 1, 0, &["/out/converted_cat.webp"]), Instant::now());
        assert_eq!(board.status().message(), "Converted to converted_cat.webp");
    }

    #[test]
    fn test_failures_are_mentioned() {
        let mut board = StatusBoard::new();
        board.finish_at(&report(3, 1, 2, &["/o/a.webp"]), Instant::now());
        assert_eq!(board.status().message(), "1 file converted, 2 failed");
    }

    #[test]
    fn test_no_images_and_error_reset() {
        let start = Instant::now();
        let mut board = StatusBoard::new();
        board.finish_at(&report(0, 0, 0, &[]), start);
        assert_eq!(board.status(), &Status::NoImages);
        assert!(board.status().is_terminal());

        board.fail_at("cwebp missing", start);
        assert_eq!(board.status().message(), "Conversion failed: cwebp missing");
        assert_eq!(board.remaining(start), Some(RESET_AFTER));
        assert!(board.tick(start + Duration::from_secs(5)));
        assert_eq!(board.status().message(), "Add files to convert");
    }

    #[test]
    fn test_dry_run_reports_planned_files() {
        let mut dry = report(3, 0, 1, &[]);
        dry.dry_run = true;
        dry.planned_files = 2;

        let mut board = StatusBoard::new();
        board.finish_at(&dry, Instant::now());
        assert_eq!(board.status(), &Status::Planned { files: 2, failed: 1 });
        assert_eq!(board.status().message(), "2 files would be converted, 1 failed");
        assert!(board.status().is_terminal());

        dry.planned_files = 1;
        dry.failed_files = 0;
        board.finish_at(&dry, Instant::now());
        assert_eq!(board.status().message(), "1 file would be converted");
    }

    /// Records the last progress update it was given
    #[derive(Default)]
    struct LastUpdate {
        handled: Cell<usize>,
        total: Cell<usize>,
    }

    impl ProgressReporter for LastUpdate {
        fn set_total_files(&self, total: usize) {
            self.total.set(total);
        }

        fn update_progress(&self, handled: usize, _failed: usize) {
            self.handled.set(handled);
        }
    }

    #[test]
    fn test_status_reporter_tracks_batch_events() {
        let inner = LastUpdate::default();
        let reporter = StatusReporter::new(&inner);
        assert_eq!(reporter.status(), Status::Idle);

        reporter.set_total_files(3);
        reporter.update_progress(1, 0);
        assert_eq!(reporter.status().message(), "Converting... (1/3)");
        reporter.update_progress(2, 1);
        assert_eq!(reporter.status(), Status::Converting { done: 2, total: 3 });
        assert_eq!((inner.handled.get(), inner.total.get()), (2, 3));

        let mut board = reporter.into_board();
        board.finish_at(&report(3, 1, 1, &["/o/a.webp"]), Instant::now());
        assert_eq!(board.status().message(), "1 file converted, 1 failed");
    }

    #[test]
    fn test_status_reporter_counts_accepted_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let notes = dir.path().join("notes.txt");
        let missing = dir.path().join("gone.png");
        std::fs::write(&notes, b"hello").expect("write");

        let inner = NoOpProgressReporter;
        let reporter = StatusReporter::new(&inner);
        let options = crate::ConversionOptions::default()
            .with_backend(crate::ConverterBackend::Builtin);
        crate::BatchConverter::new(options)
            .run_with_progress(&[notes, missing], &reporter)
            .expect("run");

        assert_eq!(reporter.status(), Status::Converting { done: 1, total: 1 });
    }
}
