use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use webpdrop::{
    config::DEFAULT_SUBFOLDER,
    generate_report,
    output::{describe, folder_to_open},
    progress::{ConsoleProgressReporter, NoOpProgressReporter},
    utils::open_folder,
    BatchConverter, ConversionOptions, ConversionReport, ConverterBackend, ProgressReporter,
    ReportFormat, SaveLocation, SaveLocationType, Settings, StatusReporter,
};

/// webpdrop - convert images to WebP with cwebp
///
/// Pass image files (or folders) and each supported one is converted to WebP
#[derive(Parser)]
#[command(name = "webpdrop")]
#[command(about = "webpdrop - convert dropped or picked images to WebP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = r#"
webpdrop converts JPEG, PNG and GIF images to WebP by running the cwebp
encoder once per file.

Where the results go is controlled by the save location:
• original   next to each source image
• subfolder  in a named folder beside each source image (default)
• custom     in one folder of your choice

Quality and save location are remembered in settings.json next to the
program; use --save-settings to store the values given on the command line.
"#)]
pub struct Args {
    /// Image files or folders to convert
    #[arg(value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Pick files with the native file dialog
    #[cfg(feature = "gui")]
    #[arg(long)]
    pub pick: bool,

    /// WebP quality (0-100), overrides the saved setting
    #[arg(short, long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,

    /// Where converted files are written
    #[arg(short, long, value_enum)]
    pub location: Option<LocationArg>,

    /// Subfolder name used with `--location subfolder`
    #[arg(long, value_name = "NAME")]
    pub subfolder: Option<String>,

    /// Target folder used with `--location custom`
    #[arg(long, value_name = "DIR")]
    pub custom_dir: Option<PathBuf>,

    /// Prefix added to every output file name
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Settings file path (defaults to settings.json next to the program)
    #[arg(short, long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Store the effective quality and save location in the settings file
    #[arg(long)]
    pub save_settings: bool,

    /// Print the effective settings and exit
    #[arg(long)]
    pub show_settings: bool,

    /// Path to the cwebp executable
    #[arg(long, value_name = "FILE")]
    pub cwebp: Option<PathBuf>,

    /// Encode in-process instead of running cwebp
    #[arg(long, conflicts_with = "cwebp")]
    pub builtin: bool,

    /// Descend into subfolders of folder inputs
    #[arg(short, long)]
    pub recursive: bool,

    /// Leave existing output files alone
    #[arg(long)]
    pub skip_existing: bool,

    /// Reject files whose content does not match their extension
    #[arg(long)]
    pub verify_headers: bool,

    /// Show what would be run without converting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Open the output folder when done
    #[arg(long)]
    pub open: bool,

    /// Write a conversion report
    #[arg(long)]
    pub report: bool,

    /// Report output format
    #[arg(long, default_value = "json", value_enum)]
    pub report_format: ReportFormatArg,

    /// Report file path
    #[arg(long, value_name = "FILE")]
    pub report_path: Option<PathBuf>,

    /// Verbose output mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (results only)
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LocationArg {
    /// Next to each source image
    Original,
    /// In a folder beside each source image
    Subfolder,
    /// In the folder given by --custom-dir
    Custom,
}

impl From<LocationArg> for SaveLocationType {
    fn from(location: LocationArg) -> Self {
        match location {
            LocationArg::Original => SaveLocationType::Original,
            LocationArg::Subfolder => SaveLocationType::Subfolder,
            LocationArg::Custom => SaveLocationType::Custom,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ReportFormatArg {
    Json,
    Csv,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(format: ReportFormatArg) -> Self {
        match format {
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Csv => ReportFormat::Csv,
        }
    }
}

/// Exit code when every file converted (or there was nothing to do)
const EXIT_OK: u8 = 0;
/// Exit code when at least one file failed to convert
const EXIT_FILES_FAILED: u8 = 1;
/// Exit code when the batch could not start, e.g. cwebp was not found
const EXIT_SETUP_FAILED: u8 = 2;

fn main() -> Result<ExitCode> {
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if !args.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    run(&args).map(ExitCode::from)
}

/// Run the command described by `args` and return the process exit code
fn run(args: &Args) -> Result<u8> {
    let settings_path = match &args.settings {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let settings = apply_overrides(Settings::load(&settings_path), args)?;

    if args.save_settings {
        settings.save(&settings_path)?;
        if !args.quiet {
            println!("Settings saved to {}", settings_path.display());
        }
    }

    if args.show_settings {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        println!("Save location: {}", describe(&settings.save_location()));
        return Ok(EXIT_OK);
    }

    let inputs = collect_inputs(args)?;
    if inputs.is_empty() {
        if args.save_settings {
            return Ok(EXIT_OK);
        }
        anyhow::bail!("No input files given");
    }

    let mut options = ConversionOptions::from_settings(&settings)
        .with_recursive(args.recursive)
        .with_skip_existing(args.skip_existing)
        .with_verify_headers(args.verify_headers)
        .with_dry_run(args.dry_run);
    if args.builtin {
        options = options.with_backend(ConverterBackend::Builtin);
    }
    if let Some(cwebp) = &args.cwebp {
        options = options.with_converter_path(cwebp.clone());
    }

    let save_location = options.save_location.clone();
    let mut batch = BatchConverter::new(options);

    let console: Box<dyn ProgressReporter> = if args.quiet {
        Box::new(NoOpProgressReporter)
    } else {
        Box::new(ConsoleProgressReporter::new())
    };
    let reporter = StatusReporter::new(console.as_ref());
    let result = batch.run_with_progress(&inputs, &reporter);
    let mut status = reporter.into_board();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            status.fail(format!("{e:#}"));
            eprintln!("{}", status.status());
            return Ok(EXIT_SETUP_FAILED);
        }
    };
    status.finish(&report);

    if args.report {
        let format: ReportFormat = args.report_format.clone().into();
        let path = args
            .report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format.default_file_name()));
        generate_report(&report, &format, &path)?;
    }

    println!("{}", status.status());
    if !args.quiet {
        print_results_summary(&report);
    }

    if args.open && !report.dry_run {
        match folder_to_open(&save_location, report.last_output_dir.as_deref()) {
            Some(folder) => {
                if let Err(e) = open_folder(&folder) {
                    log::warn!("{e:#}");
                }
            }
            None => log::warn!("No folder to open"),
        }
    }

    if report.failed_files > 0 {
        Ok(EXIT_FILES_FAILED)
    } else {
        Ok(EXIT_OK)
    }
}

/// Merge command-line overrides into the loaded settings
fn apply_overrides(mut settings: Settings, args: &Args) -> Result<Settings> {
    if let Some(quality) = args.quality {
        settings.quality = quality;
    }
    if let Some(prefix) = &args.prefix {
        settings.output_prefix = prefix.clone();
    }

    let location_type = args.location.map(SaveLocationType::from).or_else(|| {
        // A folder argument alone implies its location type
        if args.custom_dir.is_some() {
            Some(SaveLocationType::Custom)
        } else if args.subfolder.is_some() {
            Some(SaveLocationType::Subfolder)
        } else {
            None
        }
    });

    match location_type {
        Some(SaveLocationType::Original) => settings.set_save_location(SaveLocation::Original),
        Some(SaveLocationType::Subfolder) => {
            let name = match &args.subfolder {
                Some(name) => name.clone(),
                None => match settings.save_location() {
                    SaveLocation::Subfolder(name) => name,
                    _ => DEFAULT_SUBFOLDER.to_string(),
                },
            };
            settings.set_save_location(SaveLocation::Subfolder(name));
        }
        Some(SaveLocationType::Custom) => {
            let dir = match &args.custom_dir {
                Some(dir) => dir.clone(),
                None => match settings.save_location() {
                    SaveLocation::Custom(dir) => dir,
                    _ => anyhow::bail!("--location custom needs --custom-dir"),
                },
            };
            settings.set_save_location(SaveLocation::Custom(dir));
        }
        None => {}
    }

    Ok(settings)
}

fn collect_inputs(args: &Args) -> Result<Vec<PathBuf>> {
    let mut inputs = args.inputs.clone();
    inputs.extend(picked_files(args)?);

    for input in &inputs {
        if !input.exists() {
            log::warn!("Input does not exist: {}", input.display());
        }
    }
    Ok(inputs)
}

#[cfg(feature = "gui")]
fn picked_files(args: &Args) -> Result<Vec<PathBuf>> {
    use anyhow::Context;

    if !args.pick {
        return Ok(Vec::new());
    }

    let start_dir = dirs::download_dir()
        .or_else(dirs::home_dir)
        .context("Could not determine a folder to start the file dialog in")?;
    let picked = rfd::FileDialog::new()
        .set_title("Select images")
        .set_directory(start_dir)
        .add_filter("Images", webpdrop::utils::SUPPORTED_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_files()
        .unwrap_or_default();
    Ok(picked)
}

#[cfg(not(feature = "gui"))]
fn picked_files(_args: &Args) -> Result<Vec<PathBuf>> {
    Ok(Vec::new())
}

fn print_results_summary(report: &ConversionReport) {
    use humansize::{format_size, DECIMAL};
    use webpdrop::format_duration;

    println!("\n📊 Results Summary:");
    println!("  📥 Inputs: {} ({} images)", report.total_inputs, report.accepted_files);
    println!("  ✅ Converted: {} files", report.converted_files);
    if report.failed_files > 0 {
        println!("  ❌ Failed: {} files", report.failed_files);
    }
    if report.skipped_files > 0 {
        println!("  ⏭️ Skipped: {} files", report.skipped_files);
    }
    if report.dry_run {
        println!("  📝 Planned: {} files (dry run)", report.planned_files);
    }
    if !report.unsupported.is_empty() {
        println!("  🚫 Unsupported: {} files", report.unsupported.len());
    }
    println!("  📁 Saved to: {}", report.save_location);

    if report.original_size > 0 {
        println!("\n💾 Space Analysis:");
        println!("  📦 Original size: {}", format_size(report.original_size, DECIMAL));
        println!("  🗜️ Compressed size: {}", format_size(report.compressed_size, DECIMAL));
        println!("  💾 Space saved: {}", format_size(report.space_saved(), DECIMAL));
    }

    println!("\n⏱️ Duration: {}", format_duration(report.duration));

    if !report.errors.is_empty() && report.errors.len() <= 5 {
        println!("\n❌ Errors:");
        for error in &report.errors {
            println!("  • {}", error);
        }
    } else if report.errors.len() > 5 {
        println!("\n❌ {} errors occurred (use --report for full details)", report.errors.len());
    }
}
