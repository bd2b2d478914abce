//! `metadata.csv` export.

use std::path::Path;

use serde::Serialize;

use crate::error::{Result, XcError};
use crate::types::XcRecording;

/// Column order of `metadata.csv`.
pub const COLUMNS: &[&str] = &[
    "id", "gen", "sp", "ssp", "grp", "en", "rec", "cnt", "loc", "lat", "lon", "alt", "type", "sex",
    "stage", "method", "url", "file", "file-name", "lic", "q", "length", "time", "date", "uploaded",
    "rmk", "also", "animal-seen", "playback-used", "temp", "regnr", "auto", "dvc", "mic", "smp",
];

/// One CSV row. Field order must match [`COLUMNS`].
#[derive(Serialize)]
struct MetadataRow<'a> {
    id: u64,
    gen: &'a str,
    sp: &'a str,
    ssp: &'a str,
    grp: &'a str,
    en: &'a str,
    rec: &'a str,
    cnt: &'a str,
    loc: &'a str,
    lat: &'a str,
    lon: &'a str,
    alt: &'a str,
    #[serde(rename = "type")]
    sound_type: &'a str,
    sex: &'a str,
    stage: &'a str,
    method: &'a str,
    url: &'a str,
    file: &'a str,
    #[serde(rename = "file-name")]
    file_name: &'a str,
    lic: &'a str,
    q: &'a str,
    length: &'a str,
    time: &'a str,
    date: &'a str,
    uploaded: &'a str,
    rmk: &'a str,
    also: String,
    #[serde(rename = "animal-seen")]
    animal_seen: &'a str,
    #[serde(rename = "playback-used")]
    playback_used: &'a str,
    temp: &'a str,
    regnr: &'a str,
    auto: &'a str,
    dvc: &'a str,
    mic: &'a str,
    smp: &'a str,
}

impl<'a> From<&'a XcRecording> for MetadataRow<'a> {
    fn from(r: &'a XcRecording) -> Self {
        Self {
            id: r.id,
            gen: &r.gen,
            sp: &r.sp,
            ssp: &r.ssp,
            grp: &r.grp,
            en: &r.en,
            rec: &r.rec,
            cnt: &r.cnt,
            loc: &r.loc,
            lat: &r.lat,
            lon: &r.lon,
            alt: &r.alt,
            sound_type: &r.sound_type,
            sex: &r.sex,
            stage: &r.stage,
            method: &r.method,
            url: &r.url,
            file: &r.file_url,
            file_name: &r.file_name,
            lic: &r.lic,
            q: &r.q,
            length: &r.length,
            time: &r.time,
            date: &r.date,
            uploaded: &r.uploaded,
            rmk: &r.rmk,
            also: r.also.join("; "),
            animal_seen: &r.animal_seen,
            playback_used: &r.playback_used,
            temp: &r.temp,
            regnr: &r.regnr,
            auto: &r.auto,
            dvc: &r.dvc,
            mic: &r.mic,
            smp: &r.smp,
        }
    }
}

/// Write `recordings` to `path`, replacing any previous file.
///
/// The header row is written even when there are no recordings.
pub fn write_metadata_csv<'a, I>(path: &Path, recordings: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a XcRecording>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(COLUMNS)?;

    let mut rows = 0;
    for rec in recordings {
        writer.serialize(MetadataRow::from(rec))?;
        rows += 1;
    }
    writer.flush().map_err(|e| XcError::io(path, e))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.csv");
        let recs = vec![
            XcRecording {
                id: 1,
                gen: "Larus".into(),
                sp: "fuscus".into(),
                en: "Lesser Black-backed Gull".into(),
                loc: "Texel, Noord-Holland".into(),
                also: vec!["Larus argentatus".into(), "Haematopus ostralegus".into()],
                ..Default::default()
            },
            XcRecording {
                id: 2,
                gen: "Parus".into(),
                sp: "major".into(),
                ..Default::default()
            },
        ];

        let rows = write_metadata_csv(&path, &recs).unwrap();
        assert_eq!(rows, 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "1");
        assert_eq!(&records[0][8], "Texel, Noord-Holland");
        assert_eq!(&records[0][26], "Larus argentatus; Haematopus ostralegus");
        assert_eq!(&records[1][1], "Parus");
        assert_eq!(records[1].len(), COLUMNS.len());
    }

    #[test]
    fn empty_export_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.csv");
        assert_eq!(write_metadata_csv(&path, &[]).unwrap(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("id,gen,sp,"));
    }
}
