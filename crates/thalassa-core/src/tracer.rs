use serde::{Deserialize, Serialize};

/// Taxonomic class of a transported tracer. Selects the concentration
/// formula and which mass-loss terms apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracerKind {
    Radionuclide,
    Hydrocarbon,
    Particulate,
    Pollutant,
    Biological,
}

impl TracerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracerKind::Radionuclide => "radionuclide",
            TracerKind::Hydrocarbon => "hydrocarbon",
            TracerKind::Particulate => "particulate",
            TracerKind::Pollutant => "pollutant",
            TracerKind::Biological => "biological",
        }
    }
}

/// Release quantity units accepted by the control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseUnit {
    Bq,
    Gbq,
    Tbq,
    Pbq,
    Kg,
    Tons,
    Units,
}

impl ReleaseUnit {
    /// Multiplier into the species base unit (GBq for activity, kg for
    /// mass, organisms for biological releases).
    pub fn to_base(&self) -> f64 {
        match self {
            ReleaseUnit::Bq => 1e-9,
            ReleaseUnit::Gbq => 1.0,
            ReleaseUnit::Tbq => 1e3,
            ReleaseUnit::Pbq => 1e6,
            ReleaseUnit::Kg => 1.0,
            ReleaseUnit::Tons => 1e3,
            ReleaseUnit::Units => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseUnit::Bq => "Bq",
            ReleaseUnit::Gbq => "GBq",
            ReleaseUnit::Tbq => "TBq",
            ReleaseUnit::Pbq => "PBq",
            ReleaseUnit::Kg => "kg",
            ReleaseUnit::Tons => "tons",
            ReleaseUnit::Units => "units",
        }
    }
}

/// Transport behavior shared by the integrator and the concentration
/// model.
#[derive(Debug, Clone, Copy)]
pub struct TracerBehavior {
    /// Multiplier on the horizontal eddy diffusivity.
    pub diffusivity_multiplier: f64,
    /// Vertical settling velocity in m/day; positive sinks, negative
    /// rises.
    pub settling_m_per_day: f64,
    /// First-order surface mass-loss (evaporation) rate, 1/day.
    pub evaporation_per_day: Option<f64>,
    /// Horizontal plume sigma, meters.
    pub sigma_h_m: f64,
    /// Vertical plume sigma, meters.
    pub sigma_v_m: f64,
    pub decay_enabled: bool,
}

/// Registry entry for one species. Process-wide constant data.
#[derive(Debug, Clone, Copy)]
pub struct TracerDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: TracerKind,
    /// Half-life in days; radionuclides only.
    pub half_life_days: Option<f64>,
    pub base_unit: &'static str,
    pub default_total: f64,
    pub default_unit: ReleaseUnit,
    pub behavior: TracerBehavior,
}

/// Cs-137 half-life (30.17 years).
pub const CS137_HALF_LIFE_DAYS: f64 = 30.17 * 365.25;

/// Static species catalog.
pub static TRACERS: &[TracerDescriptor] = &[
    TracerDescriptor {
        id: "cs137",
        name: "Caesium-137",
        kind: TracerKind::Radionuclide,
        half_life_days: Some(CS137_HALF_LIFE_DAYS),
        base_unit: "GBq",
        default_total: 16.2,
        default_unit: ReleaseUnit::Pbq,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.0,
            settling_m_per_day: 0.0,
            evaporation_per_day: None,
            sigma_h_m: 2000.0,
            sigma_v_m: 50.0,
            decay_enabled: true,
        },
    },
    TracerDescriptor {
        id: "i131",
        name: "Iodine-131",
        kind: TracerKind::Radionuclide,
        half_life_days: Some(8.0252),
        base_unit: "GBq",
        default_total: 0.5,
        default_unit: ReleaseUnit::Pbq,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.0,
            settling_m_per_day: 0.0,
            evaporation_per_day: None,
            sigma_h_m: 1500.0,
            sigma_v_m: 30.0,
            decay_enabled: true,
        },
    },
    TracerDescriptor {
        id: "cs134",
        name: "Caesium-134",
        kind: TracerKind::Radionuclide,
        half_life_days: Some(754.3),
        base_unit: "GBq",
        default_total: 9.0,
        default_unit: ReleaseUnit::Pbq,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.0,
            settling_m_per_day: 0.0,
            evaporation_per_day: None,
            sigma_h_m: 2000.0,
            sigma_v_m: 50.0,
            decay_enabled: true,
        },
    },
    TracerDescriptor {
        id: "crude_oil",
        name: "Crude oil",
        kind: TracerKind::Hydrocarbon,
        half_life_days: None,
        base_unit: "kg",
        default_total: 5000.0,
        default_unit: ReleaseUnit::Tons,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.2,
            settling_m_per_day: -8.0,
            evaporation_per_day: Some(0.15),
            sigma_h_m: 1200.0,
            sigma_v_m: 10.0,
            decay_enabled: false,
        },
    },
    TracerDescriptor {
        id: "microplastic",
        name: "Microplastic",
        kind: TracerKind::Particulate,
        half_life_days: None,
        base_unit: "kg",
        default_total: 120.0,
        default_unit: ReleaseUnit::Tons,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.0,
            settling_m_per_day: 1.5,
            evaporation_per_day: None,
            sigma_h_m: 1000.0,
            sigma_v_m: 40.0,
            decay_enabled: false,
        },
    },
    TracerDescriptor {
        id: "mercury",
        name: "Dissolved mercury",
        kind: TracerKind::Pollutant,
        half_life_days: None,
        base_unit: "kg",
        default_total: 80.0,
        default_unit: ReleaseUnit::Tons,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.0,
            settling_m_per_day: 0.3,
            evaporation_per_day: None,
            sigma_h_m: 1800.0,
            sigma_v_m: 60.0,
            decay_enabled: false,
        },
    },
    TracerDescriptor {
        id: "plankton",
        name: "Plankton bloom",
        kind: TracerKind::Biological,
        half_life_days: None,
        base_unit: "organisms",
        default_total: 1.0e12,
        default_unit: ReleaseUnit::Units,
        behavior: TracerBehavior {
            diffusivity_multiplier: 1.5,
            settling_m_per_day: -0.5,
            evaporation_per_day: None,
            sigma_h_m: 2500.0,
            sigma_v_m: 80.0,
            decay_enabled: false,
        },
    },
];

/// Look up a species by id.
pub fn find(id: &str) -> Option<&'static TracerDescriptor> {
    TRACERS.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let cs = find("cs137").expect("cs137 registered");
        assert_eq!(cs.kind, TracerKind::Radionuclide);
        assert!(cs.behavior.decay_enabled);
        assert!(find("unobtanium").is_none());
    }

    #[test]
    fn unit_conversion_table() {
        assert_eq!(ReleaseUnit::Bq.to_base(), 1e-9);
        assert_eq!(ReleaseUnit::Tbq.to_base(), 1e3);
        assert_eq!(ReleaseUnit::Pbq.to_base(), 1e6);
        assert_eq!(ReleaseUnit::Tons.to_base(), 1e3);
    }

    #[test]
    fn radionuclides_carry_half_lives() {
        for t in TRACERS {
            if t.kind == TracerKind::Radionuclide {
                assert!(t.half_life_days.is_some(), "{} missing half-life", t.id);
            }
        }
    }
}
