//! Wall-clock to simulation-day mapping for interactive runs.

use std::time::Instant;

/// Monotonic mapping from real elapsed seconds to simulation days.
///
/// `step()` returns the per-step δt. Pause halts elapsed-time
/// integration; resume rebases the anchor at the resume instant, so no
/// catch-up delta is produced. Speed changes take effect on the next
/// step.
#[derive(Debug)]
pub struct SimulationClock {
    /// Simulated days per real second.
    speed: f64,
    anchor: Option<Instant>,
    sim_day: f64,
    paused: bool,
}

impl SimulationClock {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            anchor: None,
            sim_day: 0.0,
            paused: false,
        }
    }

    /// Advance and return δt in simulation days. The first call arms the
    /// anchor and returns 0; calls while paused return 0.
    pub fn step(&mut self) -> f64 {
        if self.paused {
            return 0.0;
        }
        let now = Instant::now();
        let dt = match self.anchor {
            Some(anchor) => now.duration_since(anchor).as_secs_f64() * self.speed,
            None => 0.0,
        };
        self.anchor = Some(now);
        self.sim_day += dt;
        dt
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.anchor = Some(Instant::now());
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Back to the configured start: day zero, disarmed anchor.
    pub fn reset(&mut self) {
        self.sim_day = 0.0;
        self.anchor = None;
        self.paused = false;
    }

    pub fn sim_day(&self) -> f64 {
        self.sim_day
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn first_step_arms_without_advancing() {
        let mut clock = SimulationClock::new(10.0);
        assert_eq!(clock.step(), 0.0);
        assert_eq!(clock.sim_day(), 0.0);
    }

    #[test]
    fn speed_scales_elapsed_time() {
        let mut clock = SimulationClock::new(100.0);
        clock.step();
        sleep(Duration::from_millis(50));
        let dt = clock.step();
        // 50 ms at 100 days/s ≈ 5 days, generous bounds for CI jitter
        assert!(dt > 2.0 && dt < 60.0, "dt = {}", dt);
        assert!((clock.sim_day() - dt).abs() < 1e-12);
    }

    #[test]
    fn pause_produces_no_delta_and_resume_rebases() {
        let mut clock = SimulationClock::new(100.0);
        clock.step();
        clock.pause();
        sleep(Duration::from_millis(30));
        assert_eq!(clock.step(), 0.0);

        clock.resume();
        let dt = clock.step();
        // the paused interval must not be caught up
        assert!(dt < 1.0, "caught-up dt = {}", dt);
    }

    #[test]
    fn reset_returns_to_day_zero() {
        let mut clock = SimulationClock::new(10.0);
        clock.step();
        sleep(Duration::from_millis(10));
        clock.step();
        clock.reset();
        assert_eq!(clock.sim_day(), 0.0);
        assert_eq!(clock.step(), 0.0);
    }
}
