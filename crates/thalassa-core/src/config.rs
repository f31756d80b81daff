use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::EngineError;
use crate::tracer::{self, ReleaseUnit};

/// Full configuration for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Release site.
    pub release: ReleaseSite,

    /// First simulated calendar day.
    pub start_date: NaiveDate,

    /// Last simulated calendar day (exclusive bound of the run).
    pub end_date: NaiveDate,

    /// Species id from the tracer registry.
    pub tracer: String,

    /// Particle pool capacity.
    pub particle_capacity: usize,

    /// Release phases, days relative to `start_date`.
    pub phases: Vec<PhaseConfig>,

    /// Adaptive RK4 advection; Euler when false.
    pub rk4_enabled: bool,

    /// User multiplier on the horizontal eddy diffusivity.
    pub diffusivity_scale: f64,

    /// Simulated days per real second in interactive mode.
    pub simulation_speed: f64,

    /// PRNG seed; omitted = fresh entropy per run.
    pub seed: Option<u64>,

    /// Archive locations.
    pub archives: ArchiveConfig,

    /// Pre-render stepping.
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Release location in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReleaseSite {
    pub lat: f64,
    pub lon: f64,
}

/// One release phase: `total` in `unit`, released at a uniform rate over
/// [start_day, end_day).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub start_day: f64,
    pub end_day: f64,
    pub total: f64,
    pub unit: ReleaseUnit,
}

/// On-disk archive locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory of daily current files plus `metadata.json`.
    pub currents_dir: PathBuf,

    /// Directory of daily EKE files, `eke_coords.bin` and
    /// `metadata.json`. Omitted = 20 m²/s fallback diffusivity.
    pub eke_dir: Option<PathBuf>,
}

/// Pre-render stepping parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Fixed step, simulation days.
    pub step_days: f64,

    /// Snapshot cadence, simulation days.
    pub record_interval_days: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            step_days: 0.1,
            record_interval_days: 1.0,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            release: ReleaseSite {
                lat: 37.42,
                lon: 141.31,
            },
            start_date: NaiveDate::from_ymd_opt(2011, 3, 11).expect("valid literal date"),
            end_date: NaiveDate::from_ymd_opt(2013, 3, 11).expect("valid literal date"),
            tracer: "cs137".to_string(),
            particle_capacity: 10_000,
            phases: vec![PhaseConfig {
                start_day: 0.0,
                end_day: 731.0,
                total: 16.2,
                unit: ReleaseUnit::Pbq,
            }],
            rk4_enabled: true,
            diffusivity_scale: 1.0,
            simulation_speed: 1.0,
            seed: None,
            archives: ArchiveConfig {
                currents_dir: PathBuf::from("./data/currents"),
                eke_dir: Some(PathBuf::from("./data/eke")),
            },
            playback: PlaybackConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from file with environment overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;

        if let Ok(dir) = std::env::var("THALASSA_CURRENTS_DIR") {
            config.archives.currents_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("THALASSA_EKE_DIR") {
            config.archives.eke_dir = Some(PathBuf::from(dir));
        }
        if let Ok(seed) = std::env::var("THALASSA_SEED") {
            if let Ok(s) = seed.parse() {
                config.seed = Some(s);
            }
        }

        Ok(config)
    }

    /// Run length in simulation days.
    pub fn total_days(&self) -> f64 {
        (self.end_date - self.start_date).num_days() as f64
    }

    /// Reject configurations the engine must not start with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.end_date <= self.start_date {
            return Err(EngineError::Configuration(format!(
                "date range not ascending: {} .. {}",
                self.start_date, self.end_date
            )));
        }
        if tracer::find(&self.tracer).is_none() {
            return Err(EngineError::Configuration(format!(
                "unknown tracer '{}'",
                self.tracer
            )));
        }
        if self.particle_capacity == 0 {
            return Err(EngineError::Configuration(
                "particle_capacity must be positive".into(),
            ));
        }
        if self.simulation_speed <= 0.0 {
            return Err(EngineError::Configuration(
                "simulation_speed must be positive".into(),
            ));
        }
        if !(self.diffusivity_scale >= 0.0) {
            return Err(EngineError::Configuration(
                "diffusivity_scale must be non-negative".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.release.lat) {
            return Err(EngineError::Configuration(format!(
                "release latitude {} out of range",
                self.release.lat
            )));
        }
        if self.phases.is_empty() {
            return Err(EngineError::Configuration(
                "at least one release phase is required".into(),
            ));
        }

        let mut sorted: Vec<&PhaseConfig> = self.phases.iter().collect();
        sorted.sort_by(|a, b| {
            a.start_day
                .partial_cmp(&b.start_day)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut prev_end = f64::NEG_INFINITY;
        for phase in sorted {
            if phase.end_day <= phase.start_day {
                return Err(EngineError::Configuration(format!(
                    "phase interval inverted: [{}, {}]",
                    phase.start_day, phase.end_day
                )));
            }
            if phase.total <= 0.0 {
                return Err(EngineError::Configuration(format!(
                    "phase total must be positive, got {}",
                    phase.total
                )));
            }
            if phase.start_day < prev_end {
                return Err(EngineError::Configuration(format!(
                    "phases overlap at day {}",
                    phase.start_day
                )));
            }
            prev_end = phase.end_day;
        }

        if self.playback.step_days <= 0.0 || self.playback.record_interval_days <= 0.0 {
            return Err(EngineError::Configuration(
                "playback intervals must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        RunConfig::default().validate().expect("default is valid");
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut c = RunConfig::default();
        c.end_date = c.start_date;
        assert!(matches!(
            c.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_unknown_tracer() {
        let mut c = RunConfig::default();
        c.tracer = "kryptonite".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_overlapping_phases() {
        let mut c = RunConfig::default();
        c.phases = vec![
            PhaseConfig {
                start_day: 0.0,
                end_day: 10.0,
                total: 1.0,
                unit: ReleaseUnit::Pbq,
            },
            PhaseConfig {
                start_day: 5.0,
                end_day: 15.0,
                total: 1.0,
                unit: ReleaseUnit::Pbq,
            },
        ];
        assert!(c.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = RunConfig::default();
        let text = serde_yaml::to_string(&config).expect("serialize");
        let back: RunConfig = serde_yaml::from_str(&text).expect("deserialize");
        assert_eq!(back.tracer, config.tracer);
        assert_eq!(back.particle_capacity, config.particle_capacity);
        assert_eq!(back.phases.len(), config.phases.len());
    }
}
