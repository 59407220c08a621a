//! Output-path resolution for the three save-location policies.

use std::path::{Path, PathBuf};

use crate::config::SaveLocation;

/// Directory the converted file for `input` belongs in
pub fn resolve_output_dir(input: &Path, location: &SaveLocation) -> PathBuf {
    let parent = source_dir(input);
    match location {
        SaveLocation::Original => parent,
        SaveLocation::Subfolder(name) => parent.join(name),
        SaveLocation::Custom(path) => path.clone(),
    }
}

/// Resolve and create the output directory.
///
/// When the directory cannot be created the file is written next to its
/// source instead. Dry runs never touch the filesystem.
pub fn prepare_output_dir(input: &Path, location: &SaveLocation, dry_run: bool) -> PathBuf {
    let dir = resolve_output_dir(input, location);
    if dry_run || matches!(location, SaveLocation::Original) {
        return dir;
    }

    match std::fs::create_dir_all(&dir) {
        Ok(()) => dir,
        Err(e) => {
            let fallback = source_dir(input);
            log::warn!(
                "Failed to create output folder {} ({}), saving to {} instead",
                dir.display(),
                e,
                fallback.display()
            );
            fallback
        }
    }
}

/// `dir/<prefix><stem>.webp`
pub fn output_file_path(input: &Path, dir: &Path, prefix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{prefix}{stem}.webp"))
}

/// Short label describing where files go
pub fn describe(location: &SaveLocation) -> String {
    match location {
        SaveLocation::Original => "original folder".to_string(),
        SaveLocation::Subfolder(name) => format!("original folder/{name}"),
        SaveLocation::Custom(path) => path.display().to_string(),
    }
}

/// Folder to reveal after a run: the last one written, the custom folder, or Downloads
pub fn folder_to_open(location: &SaveLocation, last_output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = last_output_dir {
        return Some(dir.to_path_buf());
    }
    match location {
        SaveLocation::Custom(path) => Some(path.clone()),
        _ => dirs::download_dir(),
    }
}

fn source_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output_dir_policies() {
        let input = Path::new("/photos/trip/beach.jpg");

        assert_eq!(resolve_output_dir(input, &SaveLocation::Original), PathBuf::from("/photos/trip"));
        assert_eq!(
            resolve_output_dir(input, &SaveLocation::Subfolder("webp".to_string())),
            PathBuf::from("/photos/trip/webp")
        );
        assert_eq!(
            resolve_output_dir(input, &SaveLocation::Custom(PathBuf::from("/exports"))),
            PathBuf::from("/exports")
        );
    }

    #[test]
    fn test_bare_file_name_resolves_to_current_dir() {
        assert_eq!(resolve_output_dir(Path::new("cat.png"), &SaveLocation::Original), PathBuf::from("."));
    }

    #[test]
    fn test_output_file_name_gets_prefix_and_webp_extension() {
        let out = output_file_path(Path::new("/a/b/holiday.photo.JPG"), Path::new("/out"), "converted_");
        assert_eq!(out, PathBuf::from("/out/converted_holiday.photo.webp"));

        let out = output_file_path(Path::new("/a/icon.png"), Path::new("/a"), "");
        assert_eq!(out, PathBuf::from("/a/icon.webp"));
    }

    #[test]
    fn test_prepare_creates_subfolder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("a.png");
        let out = prepare_output_dir(&input, &SaveLocation::Subfolder("out".to_string()), false);
        assert_eq!(out, dir.path().join("out"));
        assert!(out.is_dir());
    }

    #[test]
    fn test_prepare_dry_run_creates_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("a.png");
        let out = prepare_output_dir(&input, &SaveLocation::Custom(dir.path().join("custom")), true);
        assert_eq!(out, dir.path().join("custom"));
        assert!(!out.exists());
    }

    #[test]
    fn test_prepare_falls_back_to_source_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a folder").expect("write");

        let input = dir.path().join("a.png");
        let out = prepare_output_dir(&input, &SaveLocation::Custom(blocker.join("sub")), false);
        assert_eq!(out, dir.path());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&SaveLocation::Original), "original folder");
        assert_eq!(describe(&SaveLocation::Subfolder("webp".into())), "original folder/webp");
        assert_eq!(describe(&SaveLocation::Custom(PathBuf::from("/exports"))), "/exports");
    }

    #[test]
    fn test_folder_to_open_prefers_last_output() {
        let last = PathBuf::from("/photos/webp");
        assert_eq!(
            folder_to_open(&SaveLocation::Custom(PathBuf::from("/exports")), Some(last.as_path())),
            Some(last.clone())
        );
        assert_eq!(
            folder_to_open(&SaveLocation::Custom(PathBuf::from("/exports")), None),
            Some(PathBuf::from("/exports"))
        );
    }
}
