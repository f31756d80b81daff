//! Species-specific mass evolution: radioactive decay, evaporation, and
//! the retirement floor.

use thalassa_core::tracer::TracerDescriptor;

/// A particle is retired when its mass falls below this fraction of its
/// initial share.
pub const MASS_FLOOR_FRACTION: f64 = 1e-3;

/// Outcome of one step of mass evolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MassOutcome {
    Alive { lost: f64 },
    /// Fell below the floor; `lost` includes the written-off remainder
    /// so mass accounting stays closed.
    Retired { lost: f64 },
}

/// Apply decay and evaporation over `dt_days`.
pub fn apply(
    tracer: &TracerDescriptor,
    mass: &mut f64,
    dt_days: f64,
    initial_mass: f64,
) -> MassOutcome {
    let before = *mass;

    if tracer.behavior.decay_enabled {
        if let Some(half_life_days) = tracer.half_life_days {
            *mass *= 2f64.powf(-dt_days / half_life_days);
        }
    }
    if let Some(rate) = tracer.behavior.evaporation_per_day {
        *mass *= (-rate * dt_days / 30.0).exp();
    }

    if *mass < MASS_FLOOR_FRACTION * initial_mass {
        *mass = 0.0;
        MassOutcome::Retired { lost: before }
    } else {
        MassOutcome::Alive {
            lost: before - *mass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thalassa_core::tracer;

    #[test]
    fn one_half_life_halves_the_mass() {
        let cs = tracer::find("cs137").expect("registered");
        let half_life = cs.half_life_days.expect("radionuclide");
        let mut mass = 1.0;
        let outcome = apply(cs, &mut mass, half_life, 1.0);
        assert!(matches!(outcome, MassOutcome::Alive { .. }));
        assert!((mass - 0.5).abs() < 1e-12, "mass = {}", mass);
    }

    #[test]
    fn stepped_decay_matches_closed_form() {
        let cs = tracer::find("cs137").expect("registered");
        let half_life = cs.half_life_days.expect("radionuclide");
        let mut mass = 1.0;
        let dt = 0.25;
        let steps = 4000;
        for _ in 0..steps {
            apply(cs, &mut mass, dt, 1.0);
        }
        let expected = 2f64.powf(-(dt * steps as f64) / half_life);
        assert!((mass - expected).abs() < 1e-9);
    }

    #[test]
    fn evaporation_drains_hydrocarbons() {
        let oil = tracer::find("crude_oil").expect("registered");
        let mut mass = 1.0;
        apply(oil, &mut mass, 30.0, 1.0);
        let rate = oil.behavior.evaporation_per_day.expect("evaporating");
        let expected = (-rate * 30.0 / 30.0).exp();
        assert!((mass - expected).abs() < 1e-12);
    }

    #[test]
    fn stable_species_lose_nothing() {
        let plastic = tracer::find("microplastic").expect("registered");
        let mut mass = 3.5;
        let outcome = apply(plastic, &mut mass, 100.0, 3.5);
        assert_eq!(outcome, MassOutcome::Alive { lost: 0.0 });
        assert_eq!(mass, 3.5);
    }

    #[test]
    fn floor_retires_and_writes_off_the_remainder() {
        let cs = tracer::find("cs137").expect("registered");
        let mut mass = 1.0005e-3;
        let outcome = apply(cs, &mut mass, 365.0, 1.0);
        match outcome {
            MassOutcome::Retired { lost } => {
                assert_eq!(lost, 1.0005e-3);
                assert_eq!(mass, 0.0);
            }
            other => panic!("expected retirement, got {:?}", other),
        }
    }
}
