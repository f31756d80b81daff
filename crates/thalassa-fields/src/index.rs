//! Bucketed nearest-cell index over the irregular native lon/lat arrays.
//!
//! The native grids are static across days, so one index per archive is
//! built on first load and reused for the whole run. Buckets hold a
//! sampled subset of cells to bound build time; queries scan the 3×3
//! bucket neighborhood and pick the closest member in lon/lat degrees.

use tracing::debug;

use crate::binary::F32View;

/// Build parameters per archive kind.
#[derive(Debug, Clone, Copy)]
pub struct IndexParams {
    /// Buckets per side.
    pub grid: usize,
    /// Every n-th native cell becomes a bucket member.
    pub member_stride: usize,
    /// Every n-th native point contributes to the extent estimate.
    pub bounds_stride: usize,
}

/// Current-archive parameters.
pub const CURRENT_INDEX: IndexParams = IndexParams {
    grid: 100,
    member_stride: 10,
    bounds_stride: 1000,
};

/// Diffusivity-archive parameters.
pub const EKE_INDEX: IndexParams = IndexParams {
    grid: 50,
    member_stride: 20,
    bounds_stride: 100,
};

pub struct SpatialIndex {
    grid: usize,
    lon_min: f64,
    lon_span: f64,
    lat_min: f64,
    lat_span: f64,
    buckets: Vec<Vec<u32>>,
    lon: F32View,
    lat: F32View,
}

impl SpatialIndex {
    /// One-shot build over the native coordinate arrays.
    pub fn build(lon: F32View, lat: F32View, params: &IndexParams) -> Self {
        let n = lon.len();
        let grid = params.grid.max(1);

        let mut lon_min = f64::INFINITY;
        let mut lon_max = f64::NEG_INFINITY;
        let mut lat_min = f64::INFINITY;
        let mut lat_max = f64::NEG_INFINITY;
        for i in (0..n).step_by(params.bounds_stride.max(1)) {
            let x = lon.get(i) as f64;
            let y = lat.get(i) as f64;
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            lon_min = lon_min.min(x);
            lon_max = lon_max.max(x);
            lat_min = lat_min.min(y);
            lat_max = lat_max.max(y);
        }
        if !lon_min.is_finite() || !lat_min.is_finite() {
            // pathological archive: no finite coordinates sampled
            lon_min = 0.0;
            lon_max = 0.0;
            lat_min = 0.0;
            lat_max = 0.0;
        }
        let lon_span = (lon_max - lon_min).max(f64::EPSILON);
        let lat_span = (lat_max - lat_min).max(f64::EPSILON);

        let mut buckets = vec![Vec::new(); grid * grid];
        let mut members = 0usize;
        for i in (0..n).step_by(params.member_stride.max(1)) {
            let x = lon.get(i) as f64;
            let y = lat.get(i) as f64;
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            let bx = (((x - lon_min) / lon_span) * grid as f64).min(grid as f64 - 1.0);
            let by = (((y - lat_min) / lat_span) * grid as f64).min(grid as f64 - 1.0);
            if bx < 0.0 || by < 0.0 {
                continue;
            }
            buckets[by as usize * grid + bx as usize].push(i as u32);
            members += 1;
        }

        debug!(
            grid,
            members,
            lon_min,
            lon_max,
            lat_min,
            lat_max,
            "spatial index built"
        );

        Self {
            grid,
            lon_min,
            lon_span,
            lat_min,
            lat_span,
            buckets,
            lon,
            lat,
        }
    }

    /// Bucket coordinates of a query point; `None` outside the extent.
    pub fn bucket_of(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let fx = (lon - self.lon_min) / self.lon_span;
        let fy = (lat - self.lat_min) / self.lat_span;
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        let bx = ((fx * self.grid as f64) as usize).min(self.grid - 1);
        let by = ((fy * self.grid as f64) as usize).min(self.grid - 1);
        Some((bx, by))
    }

    /// Members of one bucket.
    pub fn members(&self, bx: usize, by: usize) -> &[u32] {
        &self.buckets[by * self.grid + bx]
    }

    /// Native coordinates of one cell.
    pub fn cell_lonlat(&self, idx: usize) -> (f64, f64) {
        (self.lon.get(idx) as f64, self.lat.get(idx) as f64)
    }

    /// Buckets on the ring at `radius` bucket steps around (bx, by),
    /// clipped to the grid, in a fixed scan order. Radius 0 is the
    /// bucket itself.
    pub fn ring(&self, bx: usize, by: usize, radius: usize) -> Vec<(usize, usize)> {
        let grid = self.grid as i64;
        let (cx, cy) = (bx as i64, by as i64);
        let r = radius as i64;
        let mut out = Vec::new();
        if r == 0 {
            return vec![(bx, by)];
        }
        for y in (cy - r)..=(cy + r) {
            if y < 0 || y >= grid {
                continue;
            }
            for x in (cx - r)..=(cx + r) {
                if x < 0 || x >= grid {
                    continue;
                }
                if (x - cx).abs() == r || (y - cy).abs() == r {
                    out.push((x as usize, y as usize));
                }
            }
        }
        out
    }

    /// Nearest native cell to (lon, lat): scan the 3×3 bucket
    /// neighborhood, minimize Euclidean distance in degrees, break ties
    /// toward the lower linear index. `None` when no candidate exists.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<usize> {
        let (bx, by) = self.bucket_of(lon, lat)?;
        let mut best: Option<(f64, usize)> = None;

        let y0 = by.saturating_sub(1);
        let y1 = (by + 1).min(self.grid - 1);
        let x0 = bx.saturating_sub(1);
        let x1 = (bx + 1).min(self.grid - 1);
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                for &idx in self.members(nx, ny) {
                    let i = idx as usize;
                    let dx = self.lon.get(i) as f64 - lon;
                    let dy = self.lat.get(i) as f64 - lat;
                    let d2 = dx * dx + dy * dy;
                    let better = match best {
                        None => true,
                        Some((bd, bi)) => d2 < bd || (d2 == bd && i < bi),
                    };
                    if better {
                        best = Some((d2, i));
                    }
                }
            }
        }
        best.map(|(_, i)| i)
    }
}
