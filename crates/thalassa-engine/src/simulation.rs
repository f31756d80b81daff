//! The run driver: configuration, the atomic step loop, interactive
//! start/pause/resume/reset, and batch pre-render.

use chrono::{NaiveDate, Utc, DateTime, Duration as ChronoDuration, TimeZone};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use thalassa_core::fields::{EddyDiffusivity, OceanFlow};
use thalassa_core::tracer::{self, TracerDescriptor};
use thalassa_core::{
    EngineError, EngineEvent, EventBus, ParticleRecord, RunConfig, SnapshotFrame, SummaryStats,
};

use crate::clock::SimulationClock;
use crate::concentration;
use crate::framebuffer::FrameBuffer;
use crate::integrator::{AdvectionScheme, Integrator, Rk4Settings};
use crate::particle::{EmissionSettings, ParticlePool};
use crate::release::ReleaseSchedule;

/// Interactive loop idle tick.
const FRAME_TICK: Duration = Duration::from_millis(50);

/// Cumulative run counters.
///
/// Conservation invariant: `released = active + decayed + stuck_retired`
/// at every step boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub released: u64,
    pub decayed: u64,
    /// Reserved for particles retired after being stuck beyond rescue;
    /// the current rescue policy freezes rather than retires, so this
    /// stays zero unless that policy changes.
    pub stuck_retired: u64,
    /// Gauge: particles frozen on land in the last step.
    pub on_land: usize,
    /// Mass removed by decay, evaporation and retirement write-offs.
    pub lost_mass: f64,
    pub max_concentration: f64,
}

/// One simulation run over archive-backed (or synthetic) fields.
pub struct Simulation {
    config: RunConfig,
    tracer: &'static TracerDescriptor,
    flow: Arc<dyn OceanFlow>,
    diffusivity: Option<Arc<dyn EddyDiffusivity>>,
    pool: ParticlePool,
    schedule: ReleaseSchedule,
    integrator: Integrator,
    clock: SimulationClock,
    rng: StdRng,
    stats: RunStats,
    bus: EventBus,
    cancel: CancellationToken,
    run_id: Uuid,
    sim_day: f64,
}

impl Simulation {
    /// Validate the configuration and assemble a run. Errors here carry
    /// exit code 2 and the run never starts.
    pub fn new(
        config: RunConfig,
        flow: Arc<dyn OceanFlow>,
        diffusivity: Option<Arc<dyn EddyDiffusivity>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let tracer = tracer::find(&config.tracer).ok_or_else(|| {
            EngineError::Configuration(format!("unknown tracer '{}'", config.tracer))
        })?;
        let schedule = ReleaseSchedule::from_phases(&config.phases, config.particle_capacity)?;
        let pool = ParticlePool::new(
            config.particle_capacity,
            config.release.lon,
            config.release.lat,
            schedule.units_per_particle(),
            tracer,
            EmissionSettings::default(),
        );
        let integrator = Integrator {
            scheme: if config.rk4_enabled {
                AdvectionScheme::Rk4(Rk4Settings::default())
            } else {
                AdvectionScheme::Euler
            },
            diffusivity_scale: config.diffusivity_scale,
            ..Integrator::default()
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let clock = SimulationClock::new(config.simulation_speed);

        info!(
            tracer = tracer.id,
            capacity = config.particle_capacity,
            phases = config.phases.len(),
            rk4 = config.rk4_enabled,
            total_days = config.total_days(),
            "simulation configured"
        );

        Ok(Self {
            config,
            tracer,
            flow,
            diffusivity,
            pool,
            schedule,
            integrator,
            clock,
            rng,
            stats: RunStats::default(),
            bus: EventBus::default(),
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
            sim_day: 0.0,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Token for external cancellation; checked between steps and
    /// between recorded frames.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn sim_day(&self) -> f64 {
        self.sim_day
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    fn current_date(&self) -> NaiveDate {
        self.config.start_date + ChronoDuration::days(self.sim_day.floor() as i64)
    }

    fn current_datetime(&self) -> DateTime<Utc> {
        let midnight =
            Utc.from_utc_datetime(&self.config.start_date.and_time(chrono::NaiveTime::MIN));
        midnight + ChronoDuration::seconds((self.sim_day * 86_400.0) as i64)
    }

    /// One atomic step: day residency, emissions, integration, counters.
    ///
    /// Nothing mutates until the required day is resident, so an I/O
    /// failure halts the run at the last completed step.
    pub async fn step(&mut self, dt_days: f64) -> Result<(), EngineError> {
        if dt_days <= 0.0 {
            return Ok(());
        }
        let started = Instant::now();
        let date = self.current_date();

        self.flow.ensure_day(date).await?;
        if let Some(diffusivity) = &self.diffusivity {
            diffusivity.ensure_day(date).await?;
        }

        // emissions
        let due = self.schedule.advance(self.sim_day, dt_days);
        if due > 0 {
            let initial = concentration::initial(self.tracer, self.pool.units_per_particle());
            let mut emitted: u64 = 0;
            for _ in 0..due {
                if self
                    .pool
                    .emit(self.flow.as_ref(), date, &mut self.rng, initial)
                {
                    emitted += 1;
                } else {
                    break;
                }
            }
            if emitted < due {
                self.schedule.refund(due - emitted);
            }
            self.stats.released += emitted;
            metrics::counter!("thalassa_particles_released_total").increment(emitted);
        }

        // physics
        let outcome = self.integrator.step(
            &mut self.pool,
            self.tracer,
            self.flow.as_ref(),
            self.diffusivity.as_deref(),
            date,
            dt_days,
            &mut self.rng,
        );
        self.stats.decayed += outcome.retired as u64;
        self.stats.lost_mass += outcome.lost_mass;
        self.stats.on_land = outcome.on_land;
        if outcome.max_concentration > self.stats.max_concentration {
            self.stats.max_concentration = outcome.max_concentration;
        }
        self.sim_day += dt_days;

        metrics::counter!("thalassa_particles_decayed_total").increment(outcome.retired as u64);
        metrics::gauge!("thalassa_particles_on_land").set(outcome.on_land as f64);
        metrics::gauge!("thalassa_particles_active").set(self.pool.active_count() as f64);
        metrics::histogram!("thalassa_step_seconds").record(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Read-only view of the active particles plus aggregates.
    pub fn snapshot(&self) -> SnapshotFrame {
        let mut max_depth_m = 0.0f64;
        let particles: Vec<ParticleRecord> = self
            .pool
            .particles()
            .iter()
            .filter(|p| p.active)
            .map(|p| {
                max_depth_m = max_depth_m.max(p.position.z * 1000.0);
                ParticleRecord {
                    id: p.id,
                    x_km: p.position.x,
                    y_km: p.position.y,
                    depth_km: p.position.z,
                    concentration: p.concentration,
                    age_days: p.age_days,
                    mass: p.mass,
                    active: p.active,
                    species_id: p.species.id.to_string(),
                    trail: p.trail.iter().map(|t| [t.x, t.y, t.z]).collect(),
                }
            })
            .collect();

        SnapshotFrame {
            stats: SummaryStats {
                sim_day: self.sim_day,
                date_utc: self.current_datetime(),
                released_total: self.stats.released,
                decayed_total: self.stats.decayed,
                active_count: particles.len(),
                particles_on_land: self.stats.on_land,
                max_depth_m,
                max_concentration: self.stats.max_concentration,
            },
            particles,
        }
    }

    /// Interactive loop: wall-clock driven, publishing a frame after
    /// every completed step, until end_date or cancellation.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn run(&mut self) -> Result<(), EngineError> {
        let total = self.config.total_days();
        info!(total_days = total, "interactive run started");

        while self.sim_day < total {
            if self.cancel.is_cancelled() {
                warn!("run cancelled");
                return Err(EngineError::Cancelled);
            }
            let dt = self.clock.step();
            if dt > 0.0 {
                let dt = dt.min(total - self.sim_day);
                if let Err(e) = self.step(dt).await {
                    self.bus.publish(EngineEvent::Halted {
                        run_id: self.run_id,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
                self.bus
                    .publish(EngineEvent::FrameReady(Arc::new(self.snapshot())));
            }
            tokio::time::sleep(FRAME_TICK).await;
        }
        info!(sim_day = self.sim_day, "interactive run finished");
        Ok(())
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    /// Back to the configured start. A seeded run replays identically
    /// after reset; an unseeded one draws fresh entropy.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.schedule.reset();
        self.clock.reset();
        self.stats = RunStats::default();
        self.sim_day = 0.0;
        self.rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
    }

    /// Batch pre-render: fixed-step loop to end_date, recording at the
    /// configured cadence, with progress events at 5% granularity and
    /// cancellation checks between recorded frames.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn prerender(&mut self) -> Result<FrameBuffer, EngineError> {
        let started = Instant::now();
        let total = self.config.total_days();
        let step_days = self.config.playback.step_days;
        let mut buffer = FrameBuffer::new(self.config.playback.record_interval_days);
        let mut last_bucket: i32 = -1;

        buffer.record(self.snapshot());

        while self.sim_day + 1e-9 < total {
            let dt = step_days.min(total - self.sim_day);
            if let Err(e) = self.step(dt).await {
                self.bus.publish(EngineEvent::Halted {
                    run_id: self.run_id,
                    error: e.to_string(),
                });
                return Err(e);
            }

            if buffer.due(self.sim_day) {
                if self.cancel.is_cancelled() {
                    warn!("pre-render cancelled");
                    return Err(EngineError::Cancelled);
                }
                buffer.record(self.snapshot());

                let percent = ((self.sim_day / total) * 100.0).min(100.0) as u8;
                let bucket = (percent / 5) as i32;
                if bucket != last_bucket {
                    last_bucket = bucket;
                    self.bus.publish(EngineEvent::Progress {
                        percent,
                        message: format!("day {:.0} of {:.0}", self.sim_day, total),
                    });
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            frames = buffer.len(),
            released = self.stats.released,
            decayed = self.stats.decayed,
            elapsed_ms,
            "pre-render complete"
        );
        self.bus.publish(EngineEvent::Complete {
            run_id: self.run_id,
            frames: buffer.len(),
            elapsed_ms,
        });
        Ok(buffer)
    }
}
