//! Particle records and the fixed-capacity pool.

use chrono::NaiveDate;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::VecDeque;
use tracing::debug;

use thalassa_core::fields::OceanFlow;
use thalassa_core::geo::{KM_PER_DEG_LAT, KM_PER_DEG_LON};
use thalassa_core::tracer::TracerDescriptor;

/// Which advection scheme last moved a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeTag {
    None,
    Euler,
    Rk4,
}

/// Maximum retained trail positions.
pub const TRAIL_LEN: usize = 8;

/// One Lagrangian parcel carrying a share of the released mass.
///
/// An inactive record has no meaningful position, age or mass; it is a
/// vacant slot awaiting the next emission.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: u32,
    pub active: bool,
    pub species: &'static TracerDescriptor,
    /// km offsets from the release point; z is depth in km, positive
    /// downward, clamped to [0, 1].
    pub position: Vector3<f64>,
    pub age_days: f64,
    /// Remaining mass/activity in the species base unit.
    pub mass: f64,
    pub concentration: f64,
    /// Last sampled velocity components, m/s.
    pub last_u: f64,
    pub last_v: f64,
    /// Most recent positions, oldest first.
    pub trail: VecDeque<Vector3<f64>>,
    pub scheme: SchemeTag,
}

impl Particle {
    fn vacant(species: &'static TracerDescriptor) -> Self {
        Self {
            id: 0,
            active: false,
            species,
            position: Vector3::zeros(),
            age_days: 0.0,
            mass: 0.0,
            concentration: 0.0,
            last_u: 0.0,
            last_v: 0.0,
            trail: VecDeque::with_capacity(TRAIL_LEN),
            scheme: SchemeTag::None,
        }
    }

    pub fn push_trail(&mut self, p: Vector3<f64>) {
        if self.trail.len() == TRAIL_LEN {
            self.trail.pop_front();
        }
        self.trail.push_back(p);
    }
}

/// Emission sampling parameters.
#[derive(Debug, Clone, Copy)]
pub struct EmissionSettings {
    /// Horizontal sigma of the release cloud, km.
    pub sigma_km: f64,
    /// Resampling budget under land rejection.
    pub max_attempts: usize,
    /// Optional minimum clearance to land, km; checked with four compass
    /// probe points around the candidate.
    pub min_offshore_km: Option<f64>,
}

impl Default for EmissionSettings {
    fn default() -> Self {
        Self {
            sigma_km: 30.0,
            max_attempts: 1000,
            min_offshore_km: None,
        }
    }
}

/// Dense fixed-capacity particle storage.
///
/// Emission takes the first vacant slot; there is no per-step
/// allocation. The pool owns all particle records and hands out slices;
/// active counts are recomputed by scanning, which keeps retirement a
/// plain flag write.
pub struct ParticlePool {
    particles: Vec<Particle>,
    ref_lon: f64,
    ref_lat: f64,
    units_per_particle: f64,
    emission: EmissionSettings,
    next_id: u32,
}

impl ParticlePool {
    pub fn new(
        capacity: usize,
        ref_lon: f64,
        ref_lat: f64,
        units_per_particle: f64,
        species: &'static TracerDescriptor,
        emission: EmissionSettings,
    ) -> Self {
        Self {
            particles: vec![Particle::vacant(species); capacity],
            ref_lon,
            ref_lat,
            units_per_particle,
            emission,
            next_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    pub fn units_per_particle(&self) -> f64 {
        self.units_per_particle
    }

    /// Release-point reference coordinates, degrees.
    pub fn reference(&self) -> (f64, f64) {
        (self.ref_lon, self.ref_lat)
    }

    pub fn to_lonlat(&self, position: &Vector3<f64>) -> (f64, f64) {
        (
            self.ref_lon + position.x / KM_PER_DEG_LON,
            self.ref_lat + position.y / KM_PER_DEG_LAT,
        )
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Emit one particle near the release point.
    ///
    /// Samples a normal cloud (clipped at ±3σ) around the reference
    /// point and rejects land positions, resampling up to the attempt
    /// budget. Returns false when the pool is full or no ocean position
    /// was found; the caller keeps the unreleased fraction.
    pub fn emit(
        &mut self,
        flow: &dyn OceanFlow,
        date: NaiveDate,
        rng: &mut StdRng,
        initial_concentration: f64,
    ) -> bool {
        let Some(slot) = self.particles.iter().position(|p| !p.active) else {
            return false;
        };
        // per-axis degree conversions so the cloud is isotropic in km
        let sigma_lon_deg = self.emission.sigma_km / KM_PER_DEG_LON;
        let sigma_lat_deg = self.emission.sigma_km / KM_PER_DEG_LAT;

        for _ in 0..self.emission.max_attempts {
            let gx: f64 = rng.sample(StandardNormal);
            let gy: f64 = rng.sample(StandardNormal);
            let lon = self.ref_lon + gx.clamp(-3.0, 3.0) * sigma_lon_deg;
            let lat = self.ref_lat + gy.clamp(-3.0, 3.0) * sigma_lat_deg;

            if !flow.is_ocean(lon, lat, 0.0, date) {
                continue;
            }
            if let Some(clearance_km) = self.emission.min_offshore_km {
                let dlon = clearance_km / KM_PER_DEG_LON;
                let dlat = clearance_km / KM_PER_DEG_LAT;
                let clear = flow.is_ocean(lon + dlon, lat, 0.0, date)
                    && flow.is_ocean(lon - dlon, lat, 0.0, date)
                    && flow.is_ocean(lon, lat + dlat, 0.0, date)
                    && flow.is_ocean(lon, lat - dlat, 0.0, date);
                if !clear {
                    continue;
                }
            }

            let position = Vector3::new(
                (lon - self.ref_lon) * KM_PER_DEG_LON,
                (lat - self.ref_lat) * KM_PER_DEG_LAT,
                0.0,
            );
            let particle = &mut self.particles[slot];
            particle.id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            particle.active = true;
            particle.position = position;
            particle.age_days = 0.0;
            particle.mass = self.units_per_particle;
            particle.concentration = initial_concentration;
            particle.last_u = 0.0;
            particle.last_v = 0.0;
            particle.trail.clear();
            particle.push_trail(position);
            particle.scheme = SchemeTag::None;
            return true;
        }

        debug!(
            attempts = self.emission.max_attempts,
            "emission gave up: no ocean position near the release point"
        );
        false
    }

    /// Explicit reset: every slot becomes vacant.
    pub fn reset(&mut self) {
        for p in &mut self.particles {
            p.active = false;
            p.mass = 0.0;
            p.age_days = 0.0;
            p.trail.clear();
            p.scheme = SchemeTag::None;
        }
        self.next_id = 0;
    }
}
