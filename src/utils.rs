use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Extensions accepted for conversion
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Get file extension (lowercase)
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check a path against the default allow-list
pub fn is_supported_extension(path: &Path) -> bool {
    has_allowed_extension(path, SUPPORTED_EXTENSIONS)
}

fn has_allowed_extension<S: AsRef<str>>(path: &Path, allowed: &[S]) -> bool {
    file_extension(path)
        .map(|ext| allowed.iter().any(|a| a.as_ref().eq_ignore_ascii_case(&ext)))
        .unwrap_or(false)
}

/// Split inputs into `(accepted, unsupported)`, keeping the original order
pub fn partition_inputs<S: AsRef<str>>(paths: Vec<PathBuf>, allowed: &[S]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    paths
        .into_iter()
        .partition(|path| has_allowed_extension(path, allowed))
}

/// Replace directories with the files they contain.
///
/// Plain files and paths that do not exist are passed through untouched so
/// that a vanished file is reported as a failure instead of disappearing.
pub fn expand_inputs(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut expanded = Vec::new();

    for path in paths {
        if !path.is_dir() {
            expanded.push(path.clone());
            continue;
        }

        let walker = WalkDir::new(path)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();
        let walker = if recursive { walker } else { walker.max_depth(1) };

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to read directory entry in {}", path.display()))?;
            if entry.file_type().is_file() {
                expanded.push(entry.into_path());
            }
        }
    }

    Ok(expanded)
}

/// Reveal a folder in the platform file manager
pub fn open_folder(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Folder does not exist: {}", path.display());
    }

    let opener = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    Command::new(opener)
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to run {opener} for {}", path.display()))?;
    Ok(())
}

/// Error types for image validation
#[derive(Debug)]
pub enum ImageValidationError {
    InvalidExtension,
    FileNotFound,
    IoError(io::Error),
    InvalidHeader,
    FileTooSmall,
}

impl fmt::Display for ImageValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageValidationError::InvalidExtension => write!(f, "Unsupported file extension"),
            ImageValidationError::FileNotFound => write!(f, "File not found"),
            ImageValidationError::IoError(e) => write!(f, "IO error: {}", e),
            ImageValidationError::InvalidHeader => write!(f, "Invalid image header"),
            ImageValidationError::FileTooSmall => write!(f, "File too small to be a valid image"),
        }
    }
}

impl std::error::Error for ImageValidationError {}

impl From<io::Error> for ImageValidationError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error)
    }
}

/// Check that the file content matches its extension's magic bytes
pub fn validate_image_file(path: &Path) -> Result<(), ImageValidationError> {
    if !path.exists() {
        return Err(ImageValidationError::FileNotFound);
    }

    let extension = file_extension(path).ok_or(ImageValidationError::InvalidExtension)?;
    let header_size = match extension.as_str() {
        "png" => 8,
        "gif" => 6,
        "jpg" | "jpeg" => 2,
        _ => return Err(ImageValidationError::InvalidExtension),
    };

    let mut file = File::open(path)?;
    let mut header = vec![0u8; header_size];
    let bytes_read = file.read(&mut header)?;
    if bytes_read < header_size {
        return Err(ImageValidationError::FileTooSmall);
    }

    let is_valid = match extension.as_str() {
        "jpg" | "jpeg" => header[0] == 0xFF && header[1] == 0xD8,
        "png" => header == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        "gif" => header[0..6] == *b"GIF87a" || header[0..6] == *b"GIF89a",
        _ => false,
    };

    if is_valid {
        Ok(())
    } else {
        Err(ImageValidationError::InvalidHeader)
    }
}
