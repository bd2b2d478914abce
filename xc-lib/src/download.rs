use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, XcError};
use crate::layout;
use crate::metadata;
use crate::types::{DownloadReport, DownloadStats, OutputInventory, RecordingOutcome, XcRecording};

/// Saves recordings into per-species folders under an output root.
///
/// Files are fetched one at a time. A failure on one recording is recorded
/// in the report and the run moves on to the next.
#[derive(Debug, Clone)]
pub struct Downloader {
    root: PathBuf,
    skip_existing: bool,
    http: reqwest::Client,
}

impl Downloader {
    /// Create the output root if needed.
    pub fn new(root: impl Into<PathBuf>, skip_existing: bool) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| XcError::io(&root, e))?;
        Ok(Self {
            root,
            skip_existing,
            http: reqwest::Client::new(),
        })
    }

    /// Use a preconfigured HTTP client (e.g. the search client's).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(layout::METADATA_FILENAME)
    }

    /// Download audio for every recording, then write `metadata.csv`.
    ///
    /// Only a failure to write the CSV is returned as an error.
    pub async fn download_recordings(&self, recordings: &[XcRecording]) -> Result<DownloadReport> {
        self.download_recordings_with_progress(recordings, |_, _, _| {})
            .await
    }

    /// As [`Self::download_recordings`], calling
    /// `on_progress(index, total, outcome)` after each recording.
    pub async fn download_recordings_with_progress<F>(
        &self,
        recordings: &[XcRecording],
        mut on_progress: F,
    ) -> Result<DownloadReport>
    where
        F: FnMut(usize, usize, &RecordingOutcome),
    {
        let started = Utc::now();
        let total = recordings.len();
        let mut stats = DownloadStats::default();
        let mut outcomes = Vec::with_capacity(total);

        for (i, rec) in recordings.iter().enumerate() {
            stats.attempted += 1;
            debug!(id = rec.id, species = %rec.scientific_name(), "[{}/{}] processing", i + 1, total);

            let outcome = match self.process(rec).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(id = rec.id, error = %e, "download failed");
                    RecordingOutcome::Failed(e.to_string())
                }
            };
            match &outcome {
                RecordingOutcome::Skipped(_) => stats.skipped += 1,
                RecordingOutcome::Saved { .. } => stats.downloaded += 1,
                RecordingOutcome::Failed(_) => stats.failed += 1,
            }
            on_progress(i + 1, total, &outcome);
            outcomes.push((rec.id, outcome));
        }

        let metadata_path = if recordings.is_empty() {
            None
        } else {
            let processed = recordings
                .iter()
                .zip(&outcomes)
                .filter(|(_, (_, outcome))| outcome.is_processed())
                .map(|(rec, _)| rec);
            let path = self.metadata_path();
            let rows = metadata::write_metadata_csv(&path, processed)?;
            info!(path = %path.display(), rows, "metadata saved");
            Some(path)
        };

        info!(
            downloaded = stats.downloaded,
            skipped = stats.skipped,
            failed = stats.failed,
            "download run complete"
        );

        Ok(DownloadReport {
            stats,
            outcomes,
            metadata_path,
            started,
            finished: Utc::now(),
        })
    }

    /// Write `metadata.csv` for every recording without fetching audio.
    pub fn export_metadata(&self, recordings: &[XcRecording]) -> Result<PathBuf> {
        let path = self.metadata_path();
        let rows = metadata::write_metadata_csv(&path, recordings)?;
        info!(path = %path.display(), rows, "metadata exported");
        Ok(path)
    }

    /// What the output root currently holds.
    pub fn inventory(&self) -> Result<OutputInventory> {
        layout::scan_output_dir(&self.root)
    }

    /// pending -> skipped | downloading -> saved | failed
    async fn process(&self, rec: &XcRecording) -> Result<RecordingOutcome> {
        let dir = self.root.join(layout::species_dir_name(rec));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| XcError::io(&dir, e))?;

        let dest = dir.join(layout::audio_file_name(rec));
        if self.skip_existing {
            let exists = tokio::fs::try_exists(&dest)
                .await
                .map_err(|e| XcError::io(&dest, e))?;
            if exists {
                debug!(path = %dest.display(), "already present, skipping");
                return Ok(RecordingOutcome::Skipped(dest));
            }
        }

        let url = layout::normalize_file_url(&rec.file_url)
            .ok_or_else(|| XcError::malformed(format!("XC{} has no file URL", rec.id)))?;

        // The partial file never outlives a failed fetch or rename.
        let partial = layout::partial_path(&dest);
        let saved = match self.fetch_to(&url, &partial).await {
            Ok(bytes) => tokio::fs::rename(&partial, &dest)
                .await
                .map(|()| bytes)
                .map_err(|e| XcError::io(&dest, e)),
            Err(e) => Err(e),
        };
        match saved {
            Ok(bytes) => {
                info!(path = %dest.display(), mb = %format!("{:.2}", bytes as f64 / 1_048_576.0), "saved");
                Ok(RecordingOutcome::Saved { path: dest, bytes })
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    /// Stream `url` into `path`, returning the number of bytes written.
    async fn fetch_to(&self, url: &str, path: &Path) -> Result<u64> {
        let mut resp = self.http.get(url).send().await.map_err(|e| XcError::TransientNetwork {
            attempts: 1,
            message: format!("download of {url} failed: {e}"),
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(XcError::RequestRejected {
                status: status.as_u16(),
                message: format!("download of {url} failed"),
            });
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| XcError::io(path, e))?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|e| XcError::TransientNetwork {
            attempts: 1,
            message: format!("download of {url} interrupted: {e}"),
        })? {
            file.write_all(&chunk).await.map_err(|e| XcError::io(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| XcError::io(path, e))?;
        Ok(written)
    }
}
