//! Daily 3-D current field backed by the binary archive.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{info, instrument};

use thalassa_core::fields::{OceanFlow, VelocitySample};
use thalassa_core::EngineError;

use crate::binary::CurrentFile;
use crate::cache::{DayCache, DEFAULT_DAY_CAPACITY};
use crate::index::{IndexParams, SpatialIndex, CURRENT_INDEX};
use crate::metadata::ArchiveMetadata;

/// Land/fill sentinel: NaN or any magnitude beyond 1000 m/s (the legacy
/// archives used -9999).
pub fn is_land_value(value: f32) -> bool {
    value.is_nan() || value.abs() > 1000.0
}

struct ActiveDay {
    date: NaiveDate,
    bundle: Arc<CurrentFile>,
}

/// (u, v) at arbitrary (lon, lat, depth, day), served from the day cache.
///
/// `ensure_day` is the async entry point; every other operation is a
/// synchronous read of the pinned day, so a step can look up all its
/// particles without touching the executor.
pub struct CurrentField {
    dates: BTreeMap<NaiveDate, PathBuf>,
    depths: Vec<f64>,
    cache: DayCache<CurrentFile>,
    index_params: IndexParams,
    /// Built once from the first loaded day; grids are static across
    /// days.
    index: OnceLock<Arc<SpatialIndex>>,
    active: RwLock<Option<ActiveDay>>,
}

impl CurrentField {
    pub async fn open(dir: PathBuf) -> Result<Self, EngineError> {
        Self::open_with_index(dir, CURRENT_INDEX).await
    }

    /// Open with explicit index parameters. Small test archives need a
    /// denser index than the production HYCOM-scale grids.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn open_with_index(dir: PathBuf, index_params: IndexParams) -> Result<Self, EngineError> {
        let meta = ArchiveMetadata::load(&dir).await?;
        let dates = meta.date_map(&dir);
        if dates.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "{}: no usable day entries",
                dir.display()
            )));
        }
        let depths = if meta.depths_m.is_empty() {
            vec![0.0]
        } else {
            meta.depths_m.clone()
        };
        info!(
            dataset = %meta.dataset,
            days = dates.len(),
            layers = depths.len(),
            "current archive opened"
        );
        Ok(Self {
            dates,
            depths,
            cache: DayCache::new("currents", DEFAULT_DAY_CAPACITY),
            index_params,
            index: OnceLock::new(),
            active: RwLock::new(None),
        })
    }

    /// First day of the archive, for tests and range checks.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.keys().next().copied()
    }

    /// Depth layer nearest to `depth_m`; ties go to the shallower layer.
    fn pick_layer(&self, depth_m: f64) -> usize {
        let mut best = 0usize;
        let mut best_d = f64::INFINITY;
        for (k, &layer) in self.depths.iter().enumerate() {
            let d = (depth_m - layer).abs();
            if d < best_d {
                best_d = d;
                best = k;
            }
        }
        best
    }

    async fn activate(&self, date: NaiveDate) -> Result<Arc<CurrentFile>, EngineError> {
        {
            let guard = self.active.read().expect("active-day lock poisoned");
            if let Some(active) = guard.as_ref() {
                if active.date == date {
                    return Ok(active.bundle.clone());
                }
            }
        }

        let path = self
            .dates
            .get(&date)
            .ok_or_else(|| {
                EngineError::DataUnavailable(format!("no current file for {}", date))
            })?
            .clone();
        let bundle = self
            .cache
            .get_or_load(date, move || {
                async move { CurrentFile::read(&path).await }.boxed()
            })
            .await?;

        if self.index.get().is_none() {
            let index =
                SpatialIndex::build(bundle.lon.clone(), bundle.lat.clone(), &self.index_params);
            let _ = self.index.set(Arc::new(index));
        }

        let mut guard = self.active.write().expect("active-day lock poisoned");
        *guard = Some(ActiveDay {
            date,
            bundle: bundle.clone(),
        });
        Ok(bundle)
    }

    /// The pinned bundle, if it is the one for `date`.
    fn pinned(&self, date: NaiveDate) -> Option<Arc<CurrentFile>> {
        let guard = self.active.read().expect("active-day lock poisoned");
        guard
            .as_ref()
            .filter(|a| a.date == date)
            .map(|a| a.bundle.clone())
    }
}

#[async_trait]
impl OceanFlow for CurrentField {
    async fn ensure_day(&self, date: NaiveDate) -> Result<(), EngineError> {
        self.activate(date).await.map(|_| ())
    }

    fn velocity_at(&self, lon: f64, lat: f64, depth_m: f64, date: NaiveDate) -> VelocitySample {
        let Some(bundle) = self.pinned(date) else {
            return VelocitySample::missing();
        };
        let Some(index) = self.index.get() else {
            return VelocitySample::missing();
        };
        let Some(cell) = index.nearest(lon, lat) else {
            return VelocitySample::missing();
        };

        let k = self.pick_layer(depth_m);
        let n_cells = bundle.n_cells();
        let layer = k.min(bundle.n_depth - 1);
        let u = bundle.u.get(layer * n_cells + cell);
        let v = bundle.v.get(layer * n_cells + cell);
        if is_land_value(u) || is_land_value(v) {
            return VelocitySample::missing();
        }
        VelocitySample {
            u: u as f64,
            v: v as f64,
            found: true,
            chosen_depth_m: self.depths.get(layer).copied().unwrap_or(0.0),
        }
    }

    fn nearest_ocean_cell(
        &self,
        lon: f64,
        lat: f64,
        depth_m: f64,
        date: NaiveDate,
        max_radius: usize,
    ) -> Option<(f64, f64)> {
        let bundle = self.pinned(date)?;
        let index = self.index.get()?;
        let (bx, by) = index.bucket_of(lon, lat)?;

        let k = self.pick_layer(depth_m).min(bundle.n_depth - 1);
        let n_cells = bundle.n_cells();
        for radius in 0..=max_radius {
            for (nx, ny) in index.ring(bx, by, radius) {
                for &cell in index.members(nx, ny) {
                    let u = bundle.u.get(k * n_cells + cell as usize);
                    if !is_land_value(u) {
                        return Some(index.cell_lonlat(cell as usize));
                    }
                }
            }
        }
        None
    }

    fn depth_levels(&self) -> &[f64] {
        &self.depths
    }
}
