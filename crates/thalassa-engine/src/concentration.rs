//! Per-particle concentration from remaining mass and the species'
//! plume geometry.

use thalassa_core::tracer::{TracerDescriptor, TracerKind};

/// Visualization multiplier applied to radionuclide concentrations; kept
/// in the core for compatibility with existing consumers.
pub const RADIONUCLIDE_SCALE: f64 = 1000.0;

/// Floor on the per-particle plume volume, m³.
pub const MIN_PLUME_VOLUME_M3: f64 = 1e9;

/// Assumed surface slick thickness for hydrocarbon areal density, m.
pub const SLICK_THICKNESS_M: f64 = 1e-3;

const WATER_DENSITY_KG_M3: f64 = 1000.0;

/// Gaussian plume volume (2π)^1.5 · σ_h² · σ_v, floored.
pub fn plume_volume_m3(tracer: &TracerDescriptor) -> f64 {
    let b = &tracer.behavior;
    let volume = (2.0 * std::f64::consts::PI).powf(1.5) * b.sigma_h_m * b.sigma_h_m * b.sigma_v_m;
    volume.max(MIN_PLUME_VOLUME_M3)
}

/// Concentration for `mass` (species base unit) at `depth_km`.
///
/// The unit depends on the taxon: Bq/m³ for radionuclides, kg/m²
/// (surface) or ppm for hydrocarbons, mg/L for particulates, ppb for
/// pollutants, organisms/m³ for biological tracers.
pub fn concentration(tracer: &TracerDescriptor, mass: f64, depth_km: f64) -> f64 {
    let volume = plume_volume_m3(tracer);
    match tracer.kind {
        TracerKind::Radionuclide => {
            // base unit is GBq
            let bq = mass * 1e9;
            (bq / volume * RADIONUCLIDE_SCALE).clamp(1e-6, 1e6)
        }
        TracerKind::Hydrocarbon => {
            if depth_km < 0.01 {
                // surface slick: kg/m² over the slick footprint
                let area_m2 = volume / SLICK_THICKNESS_M;
                mass / area_m2
            } else {
                mass / (volume * WATER_DENSITY_KG_M3) * 1e6 // ppm
            }
        }
        TracerKind::Particulate => mass / volume * 1000.0, // mg/L
        TracerKind::Pollutant => mass / (volume * WATER_DENSITY_KG_M3) * 1e9, // ppb
        TracerKind::Biological => mass / volume,
    }
}

/// Concentration assigned at emission.
pub fn initial(tracer: &TracerDescriptor, units_per_particle: f64) -> f64 {
    concentration(tracer, units_per_particle, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use thalassa_core::tracer;

    #[test]
    fn plume_volume_respects_the_floor() {
        for t in tracer::TRACERS {
            assert!(plume_volume_m3(t) >= MIN_PLUME_VOLUME_M3, "{}", t.id);
        }
    }

    #[test]
    fn radionuclide_concentration_is_clamped() {
        let cs = tracer::find("cs137").expect("registered");
        assert_eq!(concentration(cs, 1e12, 0.0), 1e6);
        assert_eq!(concentration(cs, 1e-30, 0.0), 1e-6);

        let volume = plume_volume_m3(cs);
        let mid = concentration(cs, 1.0, 0.0);
        assert!((mid - 1e9 / volume * RADIONUCLIDE_SCALE).abs() / mid < 1e-12);
    }

    #[test]
    fn hydrocarbon_switches_units_at_the_surface() {
        let oil = tracer::find("crude_oil").expect("registered");
        let volume = plume_volume_m3(oil);
        let surface = concentration(oil, 100.0, 0.0);
        assert!((surface - 100.0 * SLICK_THICKNESS_M / volume).abs() < 1e-15);

        let submerged = concentration(oil, 100.0, 0.2);
        assert!((submerged - 100.0 / (volume * 1000.0) * 1e6).abs() < 1e-12);
        assert!(surface != submerged);
    }

    #[test]
    fn per_taxon_formulas() {
        let volume_of = |id: &str| plume_volume_m3(tracer::find(id).expect("registered"));

        let plastic = tracer::find("microplastic").expect("registered");
        assert_eq!(
            concentration(plastic, 2.0, 0.5),
            2.0 / volume_of("microplastic") * 1000.0
        );

        let hg = tracer::find("mercury").expect("registered");
        assert_eq!(
            concentration(hg, 2.0, 0.5),
            2.0 / (volume_of("mercury") * 1000.0) * 1e9
        );

        let bio = tracer::find("plankton").expect("registered");
        assert_eq!(concentration(bio, 1e9, 0.5), 1e9 / volume_of("plankton"));
    }
}
