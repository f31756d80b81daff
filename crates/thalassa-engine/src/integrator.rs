//! The Lagrangian step: advection, stochastic diffusion, land
//! rejection, vertical motion, mass loss, concentration and trails.
//!
//! Within one step every particle sees the same day's fields and the
//! same δt; particles are mutually independent. Processing order is
//! (depth layer, slot) so each layer's reads stay contiguous.

use chrono::{Datelike, NaiveDate};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use thalassa_core::fields::{EddyDiffusivity, OceanFlow, VelocitySample, K_FLOOR_M2_S};
use thalassa_core::geo::{
    KM_PER_DEG_LAT, KM_PER_DEG_LON, M_PER_S_TO_KM_PER_DAY, SECONDS_PER_DAY,
};
use thalassa_core::tracer::TracerDescriptor;

use crate::concentration;
use crate::decay::{self, MassOutcome};
use crate::particle::{ParticlePool, SchemeTag};

/// Ekman pumping, m/s, positive downward.
const EKMAN_PUMPING_M_S: f64 = 5e-6;
/// Winter convective mixing above 100 m, m/s downward.
const CONVECTIVE_MIXING_M_S: f64 = 2e-6;
/// Piecewise vertical diffusivity, m²/s.
const KZ_ABOVE_50M: f64 = 1e-2;
const KZ_50_TO_200M: f64 = 1e-4;
const KZ_BELOW_200M: f64 = 5e-5;
/// Depth clamp, km.
const MAX_DEPTH_KM: f64 = 1.0;
/// Trail appends only after horizontal moves beyond this distance, km.
const TRAIL_MOVE_KM: f64 = 1.0;

/// Adaptive RK4 substep settings. The substep is
/// `clamp(safety / (|v| + ε), min_step, min(max_step, δt))`.
#[derive(Debug, Clone, Copy)]
pub struct Rk4Settings {
    /// Target advection distance per substep, km.
    pub safety_km: f64,
    /// Substep bounds, days.
    pub min_step_days: f64,
    pub max_step_days: f64,
}

impl Default for Rk4Settings {
    fn default() -> Self {
        Self {
            safety_km: 2.0,
            min_step_days: 1.0 / 96.0,
            max_step_days: 0.25,
        }
    }
}

/// Advection policy for the whole run.
#[derive(Debug, Clone, Copy)]
pub enum AdvectionScheme {
    Euler,
    Rk4(Rk4Settings),
}

/// Per-run integrator settings.
#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    pub scheme: AdvectionScheme,
    /// User multiplier on horizontal diffusivity.
    pub diffusivity_scale: f64,
    pub vertical_mixing: bool,
    /// Spiral search radius for land rescue, bucket steps.
    pub max_land_search_radius: usize,
    /// Push toward the nearest ocean cell, km/day.
    pub coastal_push_km_day: f64,
}

impl Default for Integrator {
    fn default() -> Self {
        Self {
            scheme: AdvectionScheme::Rk4(Rk4Settings::default()),
            diffusivity_scale: 1.0,
            vertical_mixing: true,
            max_land_search_radius: 10,
            coastal_push_km_day: 3.0,
        }
    }
}

/// What one step did, for the run counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutcome {
    pub moved: usize,
    /// Particles frozen with no ocean cell in rescue range.
    pub on_land: usize,
    pub retired: usize,
    /// Mass removed by decay, evaporation and retirements.
    pub lost_mass: f64,
    pub max_concentration: f64,
}

/// Northern-hemisphere winter window for convective mixing.
fn is_winter(date: NaiveDate) -> bool {
    let doy = date.ordinal();
    doy >= 335 || doy <= 90
}

fn nearest_layer(levels: &[f64], depth_m: f64) -> usize {
    let mut best = 0usize;
    let mut best_d = f64::INFINITY;
    for (k, &layer) in levels.iter().enumerate() {
        let d = (depth_m - layer).abs();
        if d < best_d {
            best_d = d;
            best = k;
        }
    }
    best
}

impl Integrator {
    /// Advance every active particle by `dt_days`.
    ///
    /// The caller has already made `date` resident in both fields; all
    /// lookups here are synchronous.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &self,
        pool: &mut ParticlePool,
        tracer: &'static TracerDescriptor,
        flow: &dyn OceanFlow,
        diffusivity: Option<&dyn EddyDiffusivity>,
        date: NaiveDate,
        dt_days: f64,
        rng: &mut StdRng,
    ) -> StepOutcome {
        let mut out = StepOutcome::default();
        let dt_s = dt_days * SECONDS_PER_DAY;
        let winter = is_winter(date);
        let (ref_lon, ref_lat) = pool.reference();
        let upp = pool.units_per_particle();

        // group by nearest depth layer so one layer's reads amortize
        let levels = flow.depth_levels();
        let mut order: Vec<(usize, usize)> = pool
            .particles()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.active)
            .map(|(i, p)| (nearest_layer(levels, p.position.z * 1000.0), i))
            .collect();
        order.sort_unstable();

        let particles = pool.particles_mut();
        for (_, idx) in order {
            let p = &mut particles[idx];
            let pre = p.position;
            let depth_m = pre.z * 1000.0;
            let lon = ref_lon + pre.x / KM_PER_DEG_LON;
            let lat = ref_lat + pre.y / KM_PER_DEG_LAT;

            // 1. advection; a lookup miss contributes zero and is not an
            // error
            let sample = flow.velocity_at(lon, lat, depth_m, date);
            if sample.found {
                p.last_u = sample.u;
                p.last_v = sample.v;
                match self.scheme {
                    AdvectionScheme::Euler => {
                        p.position.x += sample.u * M_PER_S_TO_KM_PER_DAY * dt_days;
                        p.position.y += sample.v * M_PER_S_TO_KM_PER_DAY * dt_days;
                        p.scheme = SchemeTag::Euler;
                    }
                    AdvectionScheme::Rk4(settings) => {
                        let (dx, dy, pure) = rk4_displacement(
                            flow, ref_lon, ref_lat, pre, depth_m, date, dt_days, settings, sample,
                        );
                        p.position.x += dx;
                        p.position.y += dy;
                        p.scheme = if pure { SchemeTag::Rk4 } else { SchemeTag::Euler };
                    }
                }
            }

            // 2. horizontal random walk; the draw happens regardless of
            // the scale so seeded streams stay aligned across configs
            let k = diffusivity
                .and_then(|d| d.k_at(lon, lat, date))
                .unwrap_or(K_FLOOR_M2_S);
            let step_km = (2.0
                * k
                * self.diffusivity_scale
                * tracer.behavior.diffusivity_multiplier
                * dt_s)
                .sqrt()
                / 1000.0;
            let xi_x: f64 = rng.sample(StandardNormal);
            let xi_y: f64 = rng.sample(StandardNormal);
            p.position.x += step_km * xi_x;
            p.position.y += step_km * xi_y;

            // 3. land rejection: revert all three coordinates, then push
            // toward the nearest ocean cell if one is in range
            let new_lon = ref_lon + p.position.x / KM_PER_DEG_LON;
            let new_lat = ref_lat + p.position.y / KM_PER_DEG_LAT;
            if !flow.is_ocean(new_lon, new_lat, p.position.z * 1000.0, date) {
                p.position = pre;
                match flow.nearest_ocean_cell(
                    new_lon,
                    new_lat,
                    depth_m,
                    date,
                    self.max_land_search_radius,
                ) {
                    Some((cell_lon, cell_lat)) => {
                        let tx = (cell_lon - lon) * KM_PER_DEG_LON;
                        let ty = (cell_lat - lat) * KM_PER_DEG_LAT;
                        let norm = (tx * tx + ty * ty).sqrt();
                        if norm > 1e-9 {
                            let push_km = self.coastal_push_km_day * dt_days;
                            let pushed = Vector3::new(
                                pre.x + tx / norm * push_km,
                                pre.y + ty / norm * push_km,
                                pre.z,
                            );
                            let push_lon = ref_lon + pushed.x / KM_PER_DEG_LON;
                            let push_lat = ref_lat + pushed.y / KM_PER_DEG_LAT;
                            if flow.is_ocean(push_lon, push_lat, pre.z * 1000.0, date) {
                                p.position = pushed;
                            }
                        }
                    }
                    None => {
                        out.on_land += 1;
                    }
                }
            }

            // 4. vertical motion
            if self.vertical_mixing {
                let depth_now_m = p.position.z * 1000.0;
                let kz = if depth_now_m < 50.0 {
                    KZ_ABOVE_50M
                } else if depth_now_m < 200.0 {
                    KZ_50_TO_200M
                } else {
                    KZ_BELOW_200M
                };
                let xi_z: f64 = rng.sample(StandardNormal);
                let mut dz_m = (2.0 * kz * dt_s).sqrt() * xi_z;
                dz_m += EKMAN_PUMPING_M_S * dt_s;
                if winter && depth_now_m < 100.0 {
                    dz_m += CONVECTIVE_MIXING_M_S * dt_s;
                }
                dz_m += tracer.behavior.settling_m_per_day * dt_days;
                p.position.z = (p.position.z + dz_m / 1000.0).clamp(0.0, MAX_DEPTH_KM);
            }

            // 5. decay / mass loss
            match decay::apply(tracer, &mut p.mass, dt_days, upp) {
                MassOutcome::Retired { lost } => {
                    out.lost_mass += lost;
                    out.retired += 1;
                    p.active = false;
                    continue;
                }
                MassOutcome::Alive { lost } => out.lost_mass += lost,
            }

            // 6. concentration
            p.concentration = concentration::concentration(tracer, p.mass, p.position.z);
            if p.concentration > out.max_concentration {
                out.max_concentration = p.concentration;
            }

            // 7. trail and age; the threshold is on the horizontal
            // displacement magnitude
            let moved = p.position - pre;
            if moved.x.hypot(moved.y) > TRAIL_MOVE_KM {
                let pos = p.position;
                p.push_trail(pos);
            }
            p.age_days += dt_days;
            out.moved += 1;
        }

        out
    }
}

/// Adaptive-substep RK4 displacement over `dt_days`, km.
///
/// Returns (dx, dy, pure): `pure` is false when any substep degraded to
/// first-order Euler because a slope sample was missing.
#[allow(clippy::too_many_arguments)]
fn rk4_displacement(
    flow: &dyn OceanFlow,
    ref_lon: f64,
    ref_lat: f64,
    start: Vector3<f64>,
    depth_m: f64,
    date: NaiveDate,
    dt_days: f64,
    settings: Rk4Settings,
    first: VelocitySample,
) -> (f64, f64, bool) {
    let speed_km_day = first.u.hypot(first.v) * M_PER_S_TO_KM_PER_DAY;
    let h = (settings.safety_km / (speed_km_day + 1e-6))
        .clamp(settings.min_step_days, settings.max_step_days.min(dt_days));
    let n = (dt_days / h).ceil().max(1.0) as usize;
    let h = dt_days / n as f64;

    let sample_at = |pos: &Vector3<f64>| -> Option<(f64, f64)> {
        let lon = ref_lon + pos.x / KM_PER_DEG_LON;
        let lat = ref_lat + pos.y / KM_PER_DEG_LAT;
        let s = flow.velocity_at(lon, lat, depth_m, date);
        s.found
            .then(|| (s.u * M_PER_S_TO_KM_PER_DAY, s.v * M_PER_S_TO_KM_PER_DAY))
    };

    let mut pos = start;
    let mut pure = true;
    for _ in 0..n {
        let Some(k1) = sample_at(&pos) else {
            // no data at the substep start: zero contribution
            pure = false;
            continue;
        };
        let k2 = sample_at(&(pos + Vector3::new(k1.0, k1.1, 0.0) * (h / 2.0)));
        let k3 = k2.and_then(|k| sample_at(&(pos + Vector3::new(k.0, k.1, 0.0) * (h / 2.0))));
        let k4 = k3.and_then(|k| sample_at(&(pos + Vector3::new(k.0, k.1, 0.0) * h)));
        match (k2, k3, k4) {
            (Some(k2), Some(k3), Some(k4)) => {
                pos.x += h * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0) / 6.0;
                pos.y += h * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1) / 6.0;
            }
            _ => {
                // slope left the data region: this substep is Euler
                pure = false;
                pos.x += k1.0 * h;
                pos.y += k1.1 * h;
            }
        }
    }
    (pos.x - start.x, pos.y - start.y, pure)
}
