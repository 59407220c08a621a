use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};
use std::process::Command;
use webp::Encoder;

use crate::utils::file_extension;

/// WebP maximum dimensions are 16383x16383
const MAX_WEBP_DIMENSION: u32 = 16383;

/// How a single file is turned into WebP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConverterBackend {
    /// Run the cwebp executable once per file
    #[default]
    External,
    /// Decode and encode in-process
    Builtin,
}

fn executable_name(base: &str) -> String {
    format!("{base}{}", std::env::consts::EXE_SUFFIX)
}

/// Find the cwebp executable.
///
/// Search order: the explicit path, next to the running executable, then `PATH`.
pub fn locate_cwebp(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("cwebp executable not found at {}", path.display());
    }

    let name = executable_name("cwebp");

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        let bundled = exe_dir.join(&name);
        if bundled.is_file() {
            return Ok(bundled);
        }
    }

    if let Some(paths) = std::env::var_os("PATH") {
        if let Some(found) = std::env::split_paths(&paths)
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file())
        {
            return Ok(found);
        }
    }

    anyhow::bail!("Could not find {name}; place it next to this program, add it to PATH, or pass --cwebp")
}

/// Process invocation for the cwebp family of tools
#[derive(Debug, Clone)]
pub struct CwebpCommand {
    cwebp: PathBuf,
    gif2webp: Option<PathBuf>,
}

impl CwebpCommand {
    pub fn new(cwebp: PathBuf) -> Self {
        let gif2webp = cwebp
            .parent()
            .map(|dir| dir.join(executable_name("gif2webp")))
            .filter(|path| path.is_file());
        if let Some(path) = &gif2webp {
            log::debug!("Using {} for GIF inputs", path.display());
        }
        Self { cwebp, gif2webp }
    }

    /// Locate cwebp and build the command wrapper around it
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let cwebp = locate_cwebp(explicit)?;
        log::debug!("Using encoder {}", cwebp.display());
        Ok(Self::new(cwebp))
    }

    pub fn program_for(&self, input: &Path) -> &Path {
        match (&self.gif2webp, file_extension(input).as_deref()) {
            (Some(gif2webp), Some("gif")) => gif2webp.as_path(),
            _ => self.cwebp.as_path(),
        }
    }

    /// `<program> <input> -q <quality> -o <output>`
    pub fn build(&self, input: &Path, output: &Path, quality: u8) -> Command {
        let mut command = Command::new(self.program_for(input));
        command
            .arg(input)
            .arg("-q")
            .arg(quality.to_string())
            .arg("-o")
            .arg(output);
        command
    }

    fn run(&self, input: &Path, output: &Path, quality: u8) -> Result<()> {
        let program = self.program_for(input);
        let result = self
            .build(input, output, quality)
            .output()
            .with_context(|| format!("Failed to execute {}", program.display()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr.trim().lines().last().unwrap_or("no output");
            match result.status.code() {
                Some(code) => anyhow::bail!("encoder exited with status {code}: {detail}"),
                None => anyhow::bail!("encoder terminated by signal: {detail}"),
            }
        }

        if !output.is_file() {
            anyhow::bail!("encoder reported success but wrote no file at {}", output.display());
        }
        Ok(())
    }
}

pub struct ImageConverter {
    backend: Backend,
}

enum Backend {
    External(CwebpCommand),
    Builtin,
}

impl ImageConverter {
    /// Converter that shells out to cwebp
    pub fn external(command: CwebpCommand) -> Self {
        Self {
            backend: Backend::External(command),
        }
    }

    /// Converter that encodes in-process
    pub fn builtin() -> Self {
        Self {
            backend: Backend::Builtin,
        }
    }

    pub fn kind(&self) -> ConverterBackend {
        match self.backend {
            Backend::External(_) => ConverterBackend::External,
            Backend::Builtin => ConverterBackend::Builtin,
        }
    }

    /// Shell-style rendering of what would run for this file
    pub fn describe(&self, input: &Path, output: &Path, quality: u8) -> String {
        match &self.backend {
            Backend::External(command) => format!(
                "\"{}\" \"{}\" -q {} -o \"{}\"",
                command.program_for(input).display(),
                input.display(),
                quality,
                output.display()
            ),
            Backend::Builtin => format!(
                "builtin encode \"{}\" -> \"{}\" (q={})",
                input.display(),
                output.display(),
                quality
            ),
        }
    }

    /// Convert one file, returning `(input_size, output_size)`
    pub fn convert(&self, input: &Path, output: &Path, quality: u8) -> Result<(u64, u64)> {
        let input_size = std::fs::metadata(input)
            .with_context(|| format!("Failed to read input file: {}", input.display()))?
            .len();

        match &self.backend {
            Backend::External(command) => command.run(input, output, quality)?,
            Backend::Builtin => convert_builtin(input, output, quality)?,
        }

        let output_size = std::fs::metadata(output)
            .with_context(|| format!("Failed to read output file: {}", output.display()))?
            .len();
        Ok((input_size, output_size))
    }
}

fn convert_builtin(input: &Path, output: &Path, quality: u8) -> Result<()> {
    let img = image::open(input)
        .with_context(|| format!("Failed to read image: {}", input.display()))?;
    let img = fit_webp_limits(img)
        .with_context(|| format!("Image validation failed for: {}", input.display()))?;

    let encoder = Encoder::from_image(&img)
        .map_err(|e| anyhow::anyhow!("Failed to create encoder: {}", e))?;
    let webp_data = encoder.encode(quality as f32);

    std::fs::write(output, &*webp_data)
        .with_context(|| format!("Failed to save WebP file: {}", output.display()))?;
    Ok(())
}

/// Downscale images that exceed the WebP dimension limit
fn fit_webp_limits(img: DynamicImage) -> Result<DynamicImage> {
    let (width, height) = img.dimensions();

    if width == 0 || height == 0 {
        anyhow::bail!("Invalid image dimensions: {}x{}", width, height);
    }

    if width <= MAX_WEBP_DIMENSION && height <= MAX_WEBP_DIMENSION {
        return Ok(img);
    }

    let scale_factor = MAX_WEBP_DIMENSION as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale_factor) as u32).max(1);
    let new_height = ((height as f64 * scale_factor) as u32).max(1);

    log::warn!(
        "Resizing image from {}x{} to {}x{} to fit WebP limits",
        width, height, new_width, new_height
    );

    Ok(img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3))
}
