use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recording from the XC API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct XcRecording {
    /// Catalogue number (the digits of "XC928094")
    pub id: u64,
    /// Genus
    pub gen: String,
    /// Species epithet
    pub sp: String,
    /// Subspecies
    pub ssp: String,
    /// Group (bats, birds, frogs, grasshoppers, land mammals)
    pub grp: String,
    /// English common name
    pub en: String,
    /// Recordist
    pub rec: String,
    /// Country
    pub cnt: String,
    /// Location description
    pub loc: String,
    /// Latitude
    pub lat: String,
    /// Longitude
    pub lon: String,
    /// Altitude in metres
    pub alt: String,
    /// Sound type (e.g. "song, call")
    #[serde(rename = "type")]
    pub sound_type: String,
    pub sex: String,
    /// Life stage
    pub stage: String,
    /// Recording method (e.g. "field recording")
    pub method: String,
    /// Recording page URL
    pub url: String,
    /// Download URL for audio file
    pub file_url: String,
    /// Original filename from XC
    pub file_name: String,
    /// License URL
    pub lic: String,
    /// Quality rating (A-E)
    pub q: String,
    /// Duration string (e.g. "0:16")
    pub length: String,
    /// Time (HH:MM)
    pub time: String,
    /// Date (YYYY-MM-DD)
    pub date: String,
    /// Upload date
    pub uploaded: String,
    /// Remarks
    pub rmk: String,
    /// Background species
    pub also: Vec<String>,
    pub animal_seen: String,
    pub playback_used: String,
    /// Temperature during recording
    pub temp: String,
    /// Specimen registration number
    pub regnr: String,
    /// Automatic (non-supervised) recording: yes / no / unknown
    pub auto: String,
    /// Recording device
    pub dvc: String,
    /// Microphone
    pub mic: String,
    /// Sample rate (as string from API, e.g. "48000")
    pub smp: String,
}

impl XcRecording {
    /// "Genus species" as shown in progress output.
    pub fn scientific_name(&self) -> String {
        format!("{} {}", self.gen, self.sp)
    }
}

/// Paginated search result from the API.
///
/// For an aggregated search, `page` is the last page fetched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XcSearchResult {
    pub num_recordings: u32,
    pub num_species: u32,
    pub num_pages: u32,
    pub page: u32,
    pub recordings: Vec<XcRecording>,
}

/// Totals for a query without the recordings themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub num_recordings: u32,
    pub num_species: u32,
    pub num_pages: u32,
}

/// Counters accumulated over one download run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    pub attempted: u32,
    pub downloaded: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Where a single recording ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordingOutcome {
    /// Destination already present and skip-existing was on.
    Skipped(PathBuf),
    Saved { path: PathBuf, bytes: u64 },
    Failed(String),
}

impl RecordingOutcome {
    /// Saved and skipped recordings both get a metadata row.
    pub fn is_processed(&self) -> bool {
        !matches!(self, RecordingOutcome::Failed(_))
    }
}

/// Result of [`crate::Downloader::download_recordings`].
#[derive(Clone, Debug)]
pub struct DownloadReport {
    pub stats: DownloadStats,
    /// `(catalogue number, outcome)` in input order.
    pub outcomes: Vec<(u64, RecordingOutcome)>,
    pub metadata_path: Option<PathBuf>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl DownloadReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished.signed_duration_since(self.started)
    }
}

/// What an output directory already holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutputInventory {
    pub total_files: u64,
    pub total_bytes: u64,
    /// Species folder names, sorted.
    pub species_folders: Vec<String>,
}

impl OutputInventory {
    pub fn species_count(&self) -> usize {
        self.species_folders.len()
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / 1_048_576.0
    }
}

/// Available groups on xeno-canto.
pub const XC_GROUPS: &[&str] = &["bats", "birds", "frogs", "grasshoppers", "land mammals"];
