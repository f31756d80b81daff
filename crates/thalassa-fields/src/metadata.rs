//! Archive metadata documents.
//!
//! Each archive directory carries a `metadata.json` listing its days,
//! grid shape and (for currents) the depth levels; the daily binaries
//! hold only their own payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use thalassa_core::EngineError;

/// One per-day entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayEntry {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// File path relative to the archive directory.
    pub file: String,
    /// Days since the first entry.
    pub day_offset: i64,
}

impl DayEntry {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Metadata document for one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Dataset identifier, e.g. "hycom-glby-currents".
    pub dataset: String,
    pub n_lat: usize,
    pub n_lon: usize,
    /// Ascending depth levels in meters, surface first. Empty for 2-D
    /// archives.
    #[serde(default)]
    pub depths_m: Vec<f64>,
    pub days: Vec<DayEntry>,
}

impl ArchiveMetadata {
    /// Load `metadata.json` from an archive directory.
    pub async fn load(dir: &Path) -> Result<Self, EngineError> {
        let path = dir.join("metadata.json");
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| EngineError::io(&path, &e))?;
        let meta: ArchiveMetadata =
            serde_json::from_str(&text).map_err(|e| EngineError::CorruptBinary {
                path: path.display().to_string(),
                detail: format!("metadata parse error: {}", e),
            })?;
        if meta.days.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "{}: archive lists no days",
                path.display()
            )));
        }
        info!(
            dataset = %meta.dataset,
            days = meta.days.len(),
            depths = meta.depths_m.len(),
            "archive metadata loaded"
        );
        Ok(meta)
    }

    /// Calendar-date → file-path map. Entries with impossible dates are
    /// dropped with a warning.
    pub fn date_map(&self, dir: &Path) -> BTreeMap<NaiveDate, PathBuf> {
        let mut map = BTreeMap::new();
        for entry in &self.days {
            match entry.date() {
                Some(date) => {
                    map.insert(date, dir.join(&entry.file));
                }
                None => warn!(
                    year = entry.year,
                    month = entry.month,
                    day = entry.day,
                    "skipping metadata entry with invalid date"
                ),
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_map_skips_invalid_entries() {
        let meta = ArchiveMetadata {
            dataset: "test".into(),
            n_lat: 2,
            n_lon: 2,
            depths_m: vec![0.0, 10.0],
            days: vec![
                DayEntry {
                    year: 2011,
                    month: 3,
                    day: 11,
                    file: "d0.bin".into(),
                    day_offset: 0,
                },
                DayEntry {
                    year: 2011,
                    month: 2,
                    day: 30,
                    file: "bogus.bin".into(),
                    day_offset: 1,
                },
            ],
        };
        let map = meta.date_map(Path::new("/archive"));
        assert_eq!(map.len(), 1);
        let date = NaiveDate::from_ymd_opt(2011, 3, 11).expect("valid literal date");
        assert_eq!(map[&date], PathBuf::from("/archive/d0.bin"));
    }

    #[test]
    fn json_round_trip() {
        let meta = ArchiveMetadata {
            dataset: "eke-aviso".into(),
            n_lat: 10,
            n_lon: 20,
            depths_m: vec![],
            days: vec![DayEntry {
                year: 2012,
                month: 6,
                day: 1,
                file: "eke_2012_06_01.bin".into(),
                day_offset: 448,
            }],
        };
        let text = serde_json::to_string(&meta).expect("serialize");
        let back: ArchiveMetadata = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back.dataset, "eke-aviso");
        assert_eq!(back.days[0].day_offset, 448);
    }
}
