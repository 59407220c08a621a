use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::{
    config::ConversionOptions,
    converter::{ConverterBackend, CwebpCommand, ImageConverter},
    output::{describe, output_file_path, prepare_output_dir},
    progress::{NoOpProgressReporter, ProgressReporter},
    stats::ConversionStats,
    utils::{expand_inputs, file_extension, partition_inputs, validate_image_file},
    ConversionReport,
};

/// Converts a batch of dropped or picked files, one at a time
pub struct BatchConverter {
    options: ConversionOptions,
    stats: ConversionStats,
    last_output_dir: Option<PathBuf>,
}

/// What happened to a single accepted file
enum FileOutcome {
    Converted { output: PathBuf, original_size: u64, compressed_size: u64 },
    Skipped,
    Planned,
}

impl BatchConverter {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            stats: ConversionStats::new(),
            last_output_dir: None,
        }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Get current conversion statistics
    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Run the batch without progress reporting
    pub fn run(&mut self, inputs: &[PathBuf]) -> Result<ConversionReport> {
        self.run_with_progress(inputs, &NoOpProgressReporter)
    }

    /// Run the batch, reporting each file to `reporter`.
    ///
    /// Per-file failures are recorded in the report; only setup problems such
    /// as a missing encoder make this return an error.
    pub fn run_with_progress(
        &mut self,
        inputs: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<ConversionReport> {
        let start_time = Instant::now();
        let start_time_utc = Utc::now();
        self.stats = ConversionStats::new();
        self.last_output_dir = None;

        let expanded = expand_inputs(inputs, self.options.recursive)
            .context("Failed to expand input folders")?;
        let total_inputs = expanded.len() as u64;
        let (accepted, unsupported) = self.filter_inputs(expanded);

        for path in &unsupported {
            log::info!("Skipping unsupported file: {}", path.display());
        }

        if accepted.is_empty() {
            log::warn!("No image files among the {} selected inputs", total_inputs);
            return Ok(self.build_report(start_time_utc, start_time, total_inputs, 0, unsupported));
        }

        let converter = self.create_converter()?;
        log::info!(
            "Converting {} file(s) at quality {} into {}",
            accepted.len(),
            self.options.quality,
            describe(&self.options.save_location)
        );

        reporter.set_total_files(accepted.len());
        reporter.start_conversion();

        for input in &accepted {
            match self.process_single_file(&converter, input) {
                Ok(FileOutcome::Converted { output, original_size, compressed_size }) => {
                    log::debug!("Converted {} -> {}", input.display(), output.display());
                    reporter.report_success(&output, original_size, compressed_size);
                    self.stats.record_success(&output, original_size, compressed_size);
                }
                Ok(FileOutcome::Skipped) => {
                    reporter.report_skip(input);
                    self.stats.record_skip();
                }
                Ok(FileOutcome::Planned) => self.stats.record_planned(),
                Err(e) => {
                    let message = format!("{e:#}");
                    log::error!("Failed to convert {}: {}", input.display(), message);
                    reporter.report_error(input, &message);
                    self.stats.record_error(input, message);
                }
            }

            reporter.update_progress(self.stats.handled() as usize, self.stats.failed as usize);
        }

        reporter.finish_conversion();

        Ok(self.build_report(
            start_time_utc,
            start_time,
            total_inputs,
            accepted.len() as u64,
            unsupported,
        ))
    }

    /// Split inputs by extension and, when enabled, by file header
    fn filter_inputs(&self, inputs: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let (accepted, mut unsupported) = partition_inputs(inputs, self.options.extensions.as_slice());
        if !self.options.verify_headers {
            return (accepted, unsupported);
        }

        let mut verified = Vec::with_capacity(accepted.len());
        for path in accepted {
            match validate_image_file(&path) {
                Ok(()) => verified.push(path),
                Err(e) => {
                    log::warn!("Rejecting {}: {}", path.display(), e);
                    unsupported.push(path);
                }
            }
        }
        (verified, unsupported)
    }

    fn create_converter(&self) -> Result<ImageConverter> {
        match self.options.backend {
            ConverterBackend::External => {
                let command = CwebpCommand::locate(self.options.converter_path.as_deref())?;
                Ok(ImageConverter::external(command))
            }
            ConverterBackend::Builtin => Ok(ImageConverter::builtin()),
        }
    }

    fn process_single_file(&mut self, converter: &ImageConverter, input: &Path) -> Result<FileOutcome> {
        if !input.is_file() {
            anyhow::bail!("File not found");
        }

        let output_dir = prepare_output_dir(input, &self.options.save_location, self.options.dry_run);
        let output_path = output_file_path(input, &output_dir, &self.options.output_prefix);

        if self.options.skip_existing && output_path.exists() {
            log::info!("Skipping {}: {} already exists", input.display(), output_path.display());
            return Ok(FileOutcome::Skipped);
        }

        if self.options.dry_run {
            log::info!("Would run: {}", converter.describe(input, &output_path, self.options.quality));
            return Ok(FileOutcome::Planned);
        }

        if let Some(extension) = file_extension(input) {
            self.stats.record_format(&extension);
        }

        log::debug!("Running: {}", converter.describe(input, &output_path, self.options.quality));
        let (original_size, compressed_size) =
            converter.convert(input, &output_path, self.options.quality)?;
        self.last_output_dir = Some(output_dir);

        Ok(FileOutcome::Converted {
            output: output_path,
            original_size,
            compressed_size,
        })
    }

    fn build_report(
        &self,
        start_time_utc: chrono::DateTime<Utc>,
        start_time: Instant,
        total_inputs: u64,
        accepted_files: u64,
        unsupported: Vec<PathBuf>,
    ) -> ConversionReport {
        ConversionReport {
            start_time: start_time_utc,
            end_time: Utc::now(),
            duration: start_time.elapsed(),
            total_inputs,
            accepted_files,
            converted_files: self.stats.converted,
            failed_files: self.stats.failed,
            skipped_files: self.stats.skipped,
            planned_files: self.stats.planned,
            original_size: self.stats.original_size,
            compressed_size: self.stats.compressed_size,
            compression_ratio: self.stats.compression_ratio(),
            quality: self.options.quality,
            save_location: describe(&self.options.save_location),
            backend: format!("{:?}", self.options.backend),
            dry_run: self.options.dry_run,
            last_output_dir: self.last_output_dir.clone(),
            outputs: self.stats.outputs().to_vec(),
            unsupported,
            format_stats: self.stats.format_stats().clone(),
            errors: self.stats.errors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaveLocation;

    fn write_png(path: &Path) {
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 120, 240, 255]))
            .save(path)
            .expect("save png");
    }

    #[test]
    fn test_no_images_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hello").expect("write");

        // External backend with a bogus encoder path: never consulted without images
        let options = ConversionOptions::default().with_converter_path(dir.path().join("missing-cwebp"));
        let report = BatchConverter::new(options).run(&[notes.clone()]).expect("run");

        assert!(!report.had_images());
        assert_eq!(report.total_inputs, 1);
        assert_eq!(report.unsupported, vec![notes]);
        assert_eq!(report.converted_files, 0);
    }

    #[test]
    fn test_missing_encoder_fails_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("a.png");
        write_png(&input);

        let options = ConversionOptions::default().with_converter_path(dir.path().join("missing-cwebp"));
        let err = BatchConverter::new(options).run(&[input]).expect_err("must fail");
        assert!(err.to_string().contains("cwebp executable not found"), "unexpected error: {err}");
    }

    #[test]
    fn test_builtin_batch_into_subfolder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.PNG");
        write_png(&a);
        write_png(&b);
        let missing = dir.path().join("gone.jpg");

        let options = ConversionOptions::default()
            .with_backend(ConverterBackend::Builtin)
            .with_save_location(SaveLocation::Subfolder("webp".to_string()));
        let mut batch = BatchConverter::new(options);
        let report = batch.run(&[a, missing.clone(), b]).expect("run");

        let out_dir = dir.path().join("webp");
        assert_eq!(report.accepted_files, 3);
        assert_eq!(report.converted_files, 2);
        assert_eq!(report.failed_files, 1);
        assert_eq!(
            report.outputs,
            vec![out_dir.join("converted_a.webp"), out_dir.join("converted_b.webp")]
        );
        assert_eq!(report.last_output_dir, Some(out_dir.clone()));
        assert!(report.errors[0].contains("gone.jpg"));
        assert_eq!(report.format_stats.get("png"), Some(&2));
        assert!(out_dir.join("converted_a.webp").is_file());
    }

    #[test]
    fn test_skip_existing_and_dry_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("a.png");
        write_png(&input);
        std::fs::write(dir.path().join("a.webp"), b"old").expect("write");

        let options = ConversionOptions::default()
            .with_backend(ConverterBackend::Builtin)
            .with_save_location(SaveLocation::Original)
            .with_output_prefix("")
            .with_skip_existing(true);
        let report = BatchConverter::new(options).run(&[input.clone()]).expect("run");
        assert_eq!(report.skipped_files, 1);
        assert_eq!(std::fs::read(dir.path().join("a.webp")).expect("read"), b"old");

        let options = ConversionOptions::default()
            .with_backend(ConverterBackend::Builtin)
            .with_save_location(SaveLocation::Custom(dir.path().join("never")))
            .with_dry_run(true);
        let report = BatchConverter::new(options).run(&[input]).expect("run");
        assert!(report.dry_run);
        assert_eq!(report.converted_files, 0);
        assert_eq!(report.skipped_files, 0);
        assert_eq!(report.planned_files, 1);
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn test_header_verification_rejects_fakes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = dir.path().join("fake.jpg");
        std::fs::write(&fake, b"plain text").expect("write");

        let options = ConversionOptions::default()
            .with_backend(ConverterBackend::Builtin)
            .with_verify_headers(true);
        let report = BatchConverter::new(options).run(&[fake.clone()]).expect("run");
        assert!(!report.had_images());
        assert_eq!(report.unsupported, vec![fake]);
    }
}
