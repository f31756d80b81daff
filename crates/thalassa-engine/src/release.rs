//! Multi-phase release scheduling.
//!
//! A schedule is an ordered set of non-overlapping phases, each
//! releasing a fixed total at a uniform rate. Fractional emissions
//! accumulate across steps so total release is conserved for
//! arbitrarily small δt.

use thalassa_core::config::PhaseConfig;
use thalassa_core::tracer::ReleaseUnit;
use thalassa_core::EngineError;

/// One release phase in days relative to the run start.
#[derive(Debug, Clone, Copy)]
pub struct ReleasePhase {
    pub start_day: f64,
    pub end_day: f64,
    pub total: f64,
    pub unit: ReleaseUnit,
}

impl ReleasePhase {
    pub fn duration_days(&self) -> f64 {
        self.end_day - self.start_day
    }

    /// Phase total in the species base unit.
    pub fn total_base(&self) -> f64 {
        self.total * self.unit.to_base()
    }

    /// Uniform release rate, base units per day.
    pub fn rate_base_per_day(&self) -> f64 {
        self.total_base() / self.duration_days()
    }

    pub fn contains(&self, day: f64) -> bool {
        day >= self.start_day && day < self.end_day
    }
}

/// Phases plus the fractional particle accumulator.
pub struct ReleaseSchedule {
    phases: Vec<ReleasePhase>,
    capacity: usize,
    accumulator: f64,
    units_per_particle: f64,
}

impl ReleaseSchedule {
    pub fn new(capacity: usize) -> Self {
        Self {
            phases: Vec::new(),
            capacity: capacity.max(1),
            accumulator: 0.0,
            units_per_particle: 0.0,
        }
    }

    pub fn from_phases(phases: &[PhaseConfig], capacity: usize) -> Result<Self, EngineError> {
        let mut schedule = Self::new(capacity);
        for p in phases {
            schedule.add_phase(p.start_day, p.end_day, p.total, p.unit)?;
        }
        Ok(schedule)
    }

    /// Add a phase, rejecting inverted or overlapping intervals. Phases
    /// are kept sorted by start day.
    pub fn add_phase(
        &mut self,
        start_day: f64,
        end_day: f64,
        total: f64,
        unit: ReleaseUnit,
    ) -> Result<(), EngineError> {
        if end_day <= start_day {
            return Err(EngineError::Configuration(format!(
                "phase interval inverted: [{}, {}]",
                start_day, end_day
            )));
        }
        if total <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "phase total must be positive, got {}",
                total
            )));
        }
        for existing in &self.phases {
            if start_day < existing.end_day && existing.start_day < end_day {
                return Err(EngineError::Configuration(format!(
                    "phase [{}, {}] overlaps [{}, {}]",
                    start_day, end_day, existing.start_day, existing.end_day
                )));
            }
        }
        self.phases.push(ReleasePhase {
            start_day,
            end_day,
            total,
            unit,
        });
        self.phases.sort_by(|a, b| {
            a.start_day
                .partial_cmp(&b.start_day)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.units_per_particle = self.total_base() / self.capacity as f64;
        Ok(())
    }

    pub fn phases(&self) -> &[ReleasePhase] {
        &self.phases
    }

    /// Sum of all phase totals in the base unit.
    pub fn total_base(&self) -> f64 {
        self.phases.iter().map(|p| p.total_base()).sum()
    }

    /// Base units carried by one particle.
    pub fn units_per_particle(&self) -> f64 {
        self.units_per_particle
    }

    /// Release rate at `day` in base units per day, with the active
    /// phase if any.
    pub fn rate_at(&self, day: f64) -> (f64, Option<&ReleasePhase>) {
        match self.phases.iter().find(|p| p.contains(day)) {
            Some(phase) => (phase.rate_base_per_day(), Some(phase)),
            None => (0.0, None),
        }
    }

    /// Accumulate `rate · δt / units_per_particle` and return the whole
    /// particles now due; the fractional remainder stays banked.
    pub fn advance(&mut self, day: f64, delta_days: f64) -> u64 {
        if self.units_per_particle > 0.0 {
            let (rate, _) = self.rate_at(day);
            self.accumulator += rate * delta_days / self.units_per_particle;
        }
        let due = self.accumulator.floor();
        self.accumulator -= due;
        due as u64
    }

    /// Return unemitted whole particles to the accumulator (pool full,
    /// or emission sampling exhausted).
    pub fn refund(&mut self, n: u64) {
        self.accumulator += n as f64;
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Current fractional remainder, for conservation checks.
    pub fn residual(&self) -> f64 {
        self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_and_inversion() {
        let mut s = ReleaseSchedule::new(100);
        s.add_phase(0.0, 10.0, 1.0, ReleaseUnit::Pbq).expect("first");
        assert!(s.add_phase(5.0, 20.0, 1.0, ReleaseUnit::Pbq).is_err());
        assert!(s.add_phase(30.0, 30.0, 1.0, ReleaseUnit::Pbq).is_err());
        assert!(s.add_phase(10.0, 20.0, 2.0, ReleaseUnit::Pbq).is_ok());
    }

    #[test]
    fn rate_uses_the_base_unit_table() {
        let mut s = ReleaseSchedule::new(100);
        s.add_phase(0.0, 10.0, 2.0, ReleaseUnit::Pbq).expect("add");
        let (rate, phase) = s.rate_at(5.0);
        // 2 PBq = 2e6 GBq over 10 days
        assert_eq!(rate, 2.0e5);
        assert!(phase.is_some());
        let (rate, phase) = s.rate_at(10.0);
        assert_eq!(rate, 0.0);
        assert!(phase.is_none());
    }

    #[test]
    fn fractional_accumulation_conserves_count() {
        // one phase whose total is exactly the pool's worth of particles
        let capacity = 1000;
        let mut s = ReleaseSchedule::new(capacity);
        s.add_phase(0.0, 73.1, 16.2, ReleaseUnit::Pbq).expect("add");

        let dt = 0.013;
        let mut day = 0.0;
        let mut emitted: u64 = 0;
        while day < 73.1 + 1.0 {
            emitted += s.advance(day, dt);
            day += dt;
        }
        assert_eq!(emitted, capacity as u64);
        assert!(s.residual() < 1.0);
    }

    #[test]
    fn multi_phase_rates_differ() {
        let mut s = ReleaseSchedule::new(10_000);
        s.add_phase(0.0, 5.0, 10.0, ReleaseUnit::Pbq).expect("a");
        s.add_phase(100.0, 300.0, 6.2, ReleaseUnit::Pbq).expect("b");
        let (early, _) = s.rate_at(1.0);
        let (late, _) = s.rate_at(150.0);
        assert!(early > late);
        let (gap, _) = s.rate_at(50.0);
        assert_eq!(gap, 0.0);
    }

    #[test]
    fn refund_banks_whole_particles() {
        let mut s = ReleaseSchedule::new(10);
        s.add_phase(0.0, 1.0, 10.0, ReleaseUnit::Kg).expect("add");
        let due = s.advance(0.0, 0.5);
        assert_eq!(due, 5);
        s.refund(2);
        // refunded particles surface on the next advance
        let due = s.advance(0.9, 0.0);
        assert_eq!(due, 2);
    }
}
