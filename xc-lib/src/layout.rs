//! On-disk layout: `<root>/<Genus>_<species>/XC<id>.<ext>` plus
//! `<root>/metadata.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, XcError};
use crate::types::{OutputInventory, XcRecording};

pub const METADATA_FILENAME: &str = "metadata.csv";
pub const PARTIAL_SUFFIX: &str = "part";
const DEFAULT_EXTENSION: &str = "mp3";

/// Sanitize a string for use in filenames.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Species folder name, e.g. "Larus_fuscus".
pub fn species_dir_name(rec: &XcRecording) -> String {
    let gen = rec.gen.trim();
    let sp = rec.sp.trim();
    let gen = if gen.is_empty() { "Unknown" } else { gen };
    let sp = if sp.is_empty() { "unknown" } else { sp };
    sanitize_filename(&format!("{gen}_{sp}"))
}

/// Determine audio file extension from the recording's original filename.
pub fn audio_extension(rec: &XcRecording) -> String {
    rec.file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Destination filename, e.g. "XC928094.mp3".
pub fn audio_file_name(rec: &XcRecording) -> String {
    sanitize_filename(&format!("XC{}.{}", rec.id, audio_extension(rec)))
}

/// Full destination path for a recording under `root`.
pub fn audio_path(root: &Path, rec: &XcRecording) -> PathBuf {
    root.join(species_dir_name(rec)).join(audio_file_name(rec))
}

/// Temporary path a download is streamed into before the final rename.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    dest.with_file_name(name)
}

/// Absolute download URL; the API sometimes hands out `//host/path`.
pub fn normalize_file_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        None
    } else if url.starts_with("//") {
        Some(format!("https:{url}"))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{}", url.trim_start_matches('/')))
    }
}

/// Count species folders and audio files below `root`.
pub fn scan_output_dir(root: &Path) -> Result<OutputInventory> {
    let mut inventory = OutputInventory::default();
    if !root.exists() {
        return Ok(inventory);
    }

    let entries = fs::read_dir(root).map_err(|e| XcError::io(root, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        inventory
            .species_folders
            .push(entry.file_name().to_string_lossy().to_string());

        let files = fs::read_dir(&path).map_err(|e| XcError::io(&path, e))?;
        for file in files.flatten() {
            let file_path = file.path();
            let is_partial = file_path
                .extension()
                .is_some_and(|ext| ext == PARTIAL_SUFFIX);
            if is_partial {
                continue;
            }
            if let Ok(meta) = file.metadata() {
                if meta.is_file() {
                    inventory.total_files += 1;
                    inventory.total_bytes += meta.len();
                }
            }
        }
    }
    inventory.species_folders.sort();
    Ok(inventory)
}
