//! Daily 2-D eddy-diffusivity field, stored as binary16.
//!
//! Coordinates are shared across all days (`eke_coords.bin`), so the
//! spatial index is built eagerly at open; only the K payloads cycle
//! through the day cache.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument};

use thalassa_core::fields::{EddyDiffusivity, K_CEIL_M2_S, K_FLOOR_M2_S};
use thalassa_core::EngineError;

use crate::binary::{CoordsFile, DiffusivityFile};
use crate::cache::{DayCache, DEFAULT_DAY_CAPACITY};
use crate::f16;
use crate::index::{IndexParams, SpatialIndex, EKE_INDEX};
use crate::metadata::ArchiveMetadata;

struct ActiveDay {
    /// Date the caller asked for.
    requested: NaiveDate,
    bundle: Arc<DiffusivityFile>,
}

pub struct DiffusivityField {
    dates: BTreeMap<NaiveDate, PathBuf>,
    n_cells: usize,
    index: SpatialIndex,
    cache: DayCache<DiffusivityFile>,
    active: RwLock<Option<ActiveDay>>,
}

impl DiffusivityField {
    pub async fn open(dir: PathBuf) -> Result<Self, EngineError> {
        Self::open_with_index(dir, EKE_INDEX).await
    }

    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn open_with_index(
        dir: PathBuf,
        index_params: IndexParams,
    ) -> Result<Self, EngineError> {
        let meta = ArchiveMetadata::load(&dir).await?;
        let dates = meta.date_map(&dir);
        if dates.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "{}: no usable day entries",
                dir.display()
            )));
        }

        let coords_path = dir.join("eke_coords.bin");
        let coords = CoordsFile::read(&coords_path).await?;
        let index = SpatialIndex::build(coords.lon.clone(), coords.lat.clone(), &index_params);

        info!(
            dataset = %meta.dataset,
            days = dates.len(),
            cells = coords.n_cells(),
            "diffusivity archive opened"
        );
        Ok(Self {
            dates,
            n_cells: coords.n_cells(),
            index,
            cache: DayCache::new("diffusivity", DEFAULT_DAY_CAPACITY),
            active: RwLock::new(None),
        })
    }

    /// Date-key clamp policy: the smallest archive date >= target, else
    /// the latest available. No interpolation across days.
    fn resolve_date(&self, target: NaiveDate) -> Option<NaiveDate> {
        self.dates
            .range(target..)
            .next()
            .map(|(d, _)| *d)
            .or_else(|| self.dates.keys().next_back().copied())
    }

    fn pinned(&self, requested: NaiveDate) -> Option<Arc<DiffusivityFile>> {
        let guard = self.active.read().expect("active-day lock poisoned");
        guard
            .as_ref()
            .filter(|a| a.requested == requested)
            .map(|a| a.bundle.clone())
    }

    /// Decode one stored cell: binary16 → f32, NaN → floor, clamp to the
    /// physical window.
    fn decode_cell(&self, bundle: &DiffusivityFile, cell: usize) -> f64 {
        let raw = f16::decode(bundle.k_half.get(cell));
        let k = if raw.is_nan() {
            K_FLOOR_M2_S
        } else {
            raw as f64
        };
        k.clamp(K_FLOOR_M2_S, K_CEIL_M2_S)
    }
}

#[async_trait]
impl EddyDiffusivity for DiffusivityField {
    async fn ensure_day(&self, date: NaiveDate) -> Result<(), EngineError> {
        {
            let guard = self.active.read().expect("active-day lock poisoned");
            if guard.as_ref().is_some_and(|a| a.requested == date) {
                return Ok(());
            }
        }

        let key = self
            .resolve_date(date)
            .ok_or_else(|| EngineError::DataUnavailable("diffusivity archive is empty".into()))?;
        let path = self
            .dates
            .get(&key)
            .ok_or_else(|| {
                EngineError::DataUnavailable(format!("no diffusivity file for {}", key))
            })?
            .clone();
        let n_cells = self.n_cells;
        let bundle = self
            .cache
            .get_or_load(key, move || {
                async move { DiffusivityFile::read(&path, n_cells).await }.boxed()
            })
            .await?;

        let mut guard = self.active.write().expect("active-day lock poisoned");
        *guard = Some(ActiveDay {
            requested: date,
            bundle,
        });
        Ok(())
    }

    fn k_at(&self, lon: f64, lat: f64, date: NaiveDate) -> Option<f64> {
        let bundle = self.pinned(date)?;
        let cell = self.index.nearest(lon, lat)?;
        Some(self.decode_cell(&bundle, cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::test_support::{push_f32s, push_i32, push_u16s};
    use crate::metadata::DayEntry;

    fn dense_index() -> IndexParams {
        IndexParams {
            grid: 10,
            member_stride: 1,
            bounds_stride: 1,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 3, d).expect("valid literal date")
    }

    /// Two-day archive over a 4x4 grid. Day 11 stores K = 100 everywhere
    /// except one NaN cell; day 20 stores K = 300.
    async fn write_archive(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("thalassa-eke-{}-{}", tag, std::process::id()));
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");

        let mut coords = Vec::new();
        push_i32(&mut coords, 1);
        push_i32(&mut coords, 4);
        push_i32(&mut coords, 4);
        let mut lons = Vec::new();
        let mut lats = Vec::new();
        for iy in 0..4 {
            for ix in 0..4 {
                lons.push(140.0 + ix as f32);
                lats.push(30.0 + iy as f32);
            }
        }
        push_f32s(&mut coords, &lons);
        push_f32s(&mut coords, &lats);
        tokio::fs::write(dir.join("eke_coords.bin"), &coords)
            .await
            .expect("write coords");

        for (d, k_value) in [(11u32, 100.0f32), (20u32, 300.0f32)] {
            let mut day = Vec::new();
            push_i32(&mut day, crate::binary::DIFFUSIVITY_VERSION);
            push_i32(&mut day, 2011);
            push_i32(&mut day, 3);
            push_i32(&mut day, d as i32);
            push_i32(&mut day, 42);
            let mut cells = vec![f16::encode(k_value); 16];
            cells[5] = f16::encode(f32::NAN);
            push_u16s(&mut day, &cells);
            tokio::fs::write(dir.join(format!("eke_2011_03_{:02}.bin", d)), &day)
                .await
                .expect("write day");
        }

        let meta = ArchiveMetadata {
            dataset: "test-eke".into(),
            n_lat: 4,
            n_lon: 4,
            depths_m: vec![],
            days: [11u32, 20]
                .iter()
                .map(|&d| DayEntry {
                    year: 2011,
                    month: 3,
                    day: d,
                    file: format!("eke_2011_03_{:02}.bin", d),
                    day_offset: (d - 11) as i64,
                })
                .collect(),
        };
        tokio::fs::write(
            dir.join("metadata.json"),
            serde_json::to_vec(&meta).expect("meta json"),
        )
        .await
        .expect("write meta");
        dir
    }

    #[tokio::test]
    async fn decodes_and_serves_k() {
        let dir = write_archive("serve").await;
        let field = DiffusivityField::open_with_index(dir, dense_index())
            .await
            .expect("open");
        field.ensure_day(date(11)).await.expect("ensure");
        let k = field.k_at(142.0, 32.0, date(11)).expect("in grid");
        assert!((k - 100.0).abs() < 0.1, "k = {}", k);
    }

    #[tokio::test]
    async fn nan_cell_substitutes_the_floor() {
        let dir = write_archive("nan").await;
        let field = DiffusivityField::open_with_index(dir, dense_index())
            .await
            .expect("open");
        field.ensure_day(date(11)).await.expect("ensure");
        // cell 5 = (row 1, col 1) → lon 141, lat 31... cell 5 is NaN
        let k = field.k_at(141.0, 31.0, date(11)).expect("in grid");
        assert_eq!(k, K_FLOOR_M2_S);
    }

    #[tokio::test]
    async fn date_clamps_to_next_available_key() {
        let dir = write_archive("clamp").await;
        let field = DiffusivityField::open_with_index(dir, dense_index())
            .await
            .expect("open");
        // day 15 is absent; the smallest key >= 15 is day 20
        field.ensure_day(date(15)).await.expect("ensure");
        let k = field.k_at(142.0, 32.0, date(15)).expect("in grid");
        assert!((k - 300.0).abs() < 0.5, "k = {}", k);
    }

    #[tokio::test]
    async fn date_past_the_end_uses_latest() {
        let dir = write_archive("tail").await;
        let field = DiffusivityField::open_with_index(dir, dense_index())
            .await
            .expect("open");
        field.ensure_day(date(30)).await.expect("ensure");
        let k = field.k_at(142.0, 32.0, date(30)).expect("in grid");
        assert!((k - 300.0).abs() < 0.5, "k = {}", k);
    }

    #[tokio::test]
    async fn out_of_grid_lookup_is_none() {
        let dir = write_archive("miss").await;
        let field = DiffusivityField::open_with_index(dir, dense_index())
            .await
            .expect("open");
        field.ensure_day(date(11)).await.expect("ensure");
        assert!(field.k_at(0.0, 0.0, date(11)).is_none());
    }
}
