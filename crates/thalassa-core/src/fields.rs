use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::EngineError;

/// Physical clamp window for horizontal eddy diffusivity, m²/s.
pub const K_FLOOR_M2_S: f64 = 20.0;
pub const K_CEIL_M2_S: f64 = 500.0;

/// One velocity lookup.
#[derive(Debug, Clone, Copy)]
pub struct VelocitySample {
    /// Eastward component, m/s.
    pub u: f64,
    /// Northward component, m/s.
    pub v: f64,
    /// False when the cell is land, fill, or outside the grid.
    pub found: bool,
    /// Depth of the layer that served the sample, meters.
    pub chosen_depth_m: f64,
}

impl VelocitySample {
    pub fn missing() -> Self {
        Self {
            u: 0.0,
            v: 0.0,
            found: false,
            chosen_depth_m: 0.0,
        }
    }
}

/// Daily 3-D current archive as seen by the integrator.
///
/// `ensure_day` is the only suspension point: the step loop awaits it
/// once per step, then serves every particle of that step from the
/// resident bundle through the synchronous lookups.
#[async_trait]
pub trait OceanFlow: Send + Sync {
    /// Make `date` resident so the lookups below can serve it.
    async fn ensure_day(&self, date: NaiveDate) -> Result<(), EngineError>;

    fn velocity_at(&self, lon: f64, lat: f64, depth_m: f64, date: NaiveDate) -> VelocitySample;

    /// Batched variant; one resident day bundle serves all positions.
    fn velocities_at_multiple(
        &self,
        positions: &[(f64, f64)],
        depth_m: f64,
        date: NaiveDate,
    ) -> Vec<VelocitySample> {
        positions
            .iter()
            .map(|&(lon, lat)| self.velocity_at(lon, lat, depth_m, date))
            .collect()
    }

    fn is_ocean(&self, lon: f64, lat: f64, depth_m: f64, date: NaiveDate) -> bool {
        self.velocity_at(lon, lat, depth_m, date).found
    }

    /// Ring-by-ring spiral search for the nearest wet cell, in bucket
    /// steps of the spatial index. Returns the cell center.
    fn nearest_ocean_cell(
        &self,
        lon: f64,
        lat: f64,
        depth_m: f64,
        date: NaiveDate,
        max_radius: usize,
    ) -> Option<(f64, f64)>;

    /// Ascending depth levels of the archive, meters, surface first.
    fn depth_levels(&self) -> &[f64];
}

/// Daily 2-D eddy-diffusivity archive.
#[async_trait]
pub trait EddyDiffusivity: Send + Sync {
    async fn ensure_day(&self, date: NaiveDate) -> Result<(), EngineError>;

    /// Horizontal diffusivity in m²/s, already clamped to
    /// [`K_FLOOR_M2_S`, `K_CEIL_M2_S`]. `None` where the grid has no
    /// data.
    fn k_at(&self, lon: f64, lat: f64, date: NaiveDate) -> Option<f64>;
}

pub mod synthetic {
    //! In-memory fields for tests and benches.

    use super::*;

    /// Spatially uniform current; every cell is ocean.
    pub struct UniformFlow {
        pub u: f64,
        pub v: f64,
        depths: Vec<f64>,
    }

    impl UniformFlow {
        pub fn new(u: f64, v: f64) -> Self {
            Self {
                u,
                v,
                depths: vec![0.0, 50.0, 200.0, 500.0, 1000.0],
            }
        }

        /// Flow at rest everywhere.
        pub fn still() -> Self {
            Self::new(0.0, 0.0)
        }
    }

    #[async_trait]
    impl OceanFlow for UniformFlow {
        async fn ensure_day(&self, _date: NaiveDate) -> Result<(), EngineError> {
            Ok(())
        }

        fn velocity_at(
            &self,
            _lon: f64,
            _lat: f64,
            depth_m: f64,
            _date: NaiveDate,
        ) -> VelocitySample {
            let chosen = self
                .depths
                .iter()
                .copied()
                .min_by(|a, b| {
                    (a - depth_m)
                        .abs()
                        .partial_cmp(&(b - depth_m).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0.0);
            VelocitySample {
                u: self.u,
                v: self.v,
                found: true,
                chosen_depth_m: chosen,
            }
        }

        fn nearest_ocean_cell(
            &self,
            lon: f64,
            lat: f64,
            _depth_m: f64,
            _date: NaiveDate,
            _max_radius: usize,
        ) -> Option<(f64, f64)> {
            Some((lon, lat))
        }

        fn depth_levels(&self) -> &[f64] {
            &self.depths
        }
    }

    /// Uniform flow with a straight meridional coastline: everything at
    /// or east of `coast_lon` is land. Cells are `cell_deg` wide.
    pub struct CoastalFlow {
        pub coast_lon: f64,
        pub u: f64,
        pub v: f64,
        pub cell_deg: f64,
        depths: Vec<f64>,
    }

    impl CoastalFlow {
        pub fn new(coast_lon: f64, u: f64, v: f64) -> Self {
            Self {
                coast_lon,
                u,
                v,
                cell_deg: 0.1,
                depths: vec![0.0, 50.0, 200.0],
            }
        }
    }

    #[async_trait]
    impl OceanFlow for CoastalFlow {
        async fn ensure_day(&self, _date: NaiveDate) -> Result<(), EngineError> {
            Ok(())
        }

        fn velocity_at(
            &self,
            lon: f64,
            _lat: f64,
            depth_m: f64,
            _date: NaiveDate,
        ) -> VelocitySample {
            if lon >= self.coast_lon {
                return VelocitySample::missing();
            }
            VelocitySample {
                u: self.u,
                v: self.v,
                found: true,
                chosen_depth_m: depth_m.clamp(0.0, 200.0),
            }
        }

        fn nearest_ocean_cell(
            &self,
            lon: f64,
            lat: f64,
            _depth_m: f64,
            _date: NaiveDate,
            max_radius: usize,
        ) -> Option<(f64, f64)> {
            if lon < self.coast_lon {
                return Some((lon, lat));
            }
            let steps = ((lon - self.coast_lon) / self.cell_deg).ceil() as usize + 1;
            if steps <= max_radius {
                Some((self.coast_lon - self.cell_deg, lat))
            } else {
                None
            }
        }

        fn depth_levels(&self) -> &[f64] {
            &self.depths
        }
    }

    /// Constant horizontal diffusivity everywhere.
    pub struct ConstantK(pub f64);

    #[async_trait]
    impl EddyDiffusivity for ConstantK {
        async fn ensure_day(&self, _date: NaiveDate) -> Result<(), EngineError> {
            Ok(())
        }

        fn k_at(&self, _lon: f64, _lat: f64, _date: NaiveDate) -> Option<f64> {
            Some(self.0.clamp(K_FLOOR_M2_S, K_CEIL_M2_S))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::synthetic::*;
    use super::*;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 3, 11).expect("valid literal date")
    }

    #[tokio::test]
    async fn uniform_flow_is_ocean_everywhere() {
        let flow = UniformFlow::new(0.1, 0.0);
        flow.ensure_day(day()).await.expect("synthetic load");
        let s = flow.velocity_at(141.3, 37.4, 0.0, day());
        assert!(s.found);
        assert_eq!(s.u, 0.1);
        assert!(flow.is_ocean(0.0, 0.0, 500.0, day()));
    }

    #[tokio::test]
    async fn coastal_flow_rejects_land_and_finds_water() {
        let flow = CoastalFlow::new(141.0, 0.0, 0.0);
        assert!(flow.is_ocean(140.9, 37.0, 0.0, day()));
        assert!(!flow.is_ocean(141.2, 37.0, 0.0, day()));
        let cell = flow.nearest_ocean_cell(141.2, 37.0, 0.0, day(), 10);
        assert!(cell.is_some());
        let (clon, _) = cell.expect("coastline within radius");
        assert!(clon < 141.0);
        assert!(flow.nearest_ocean_cell(146.0, 37.0, 0.0, day(), 10).is_none());
    }

    #[tokio::test]
    async fn constant_k_is_clamped() {
        let k = ConstantK(5.0);
        assert_eq!(k.k_at(0.0, 0.0, day()), Some(K_FLOOR_M2_S));
        let k = ConstantK(900.0);
        assert_eq!(k.k_at(0.0, 0.0, day()), Some(K_CEIL_M2_S));
    }
}
