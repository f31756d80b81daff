use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Events published on the engine bus.
///
/// `FrameReady` fires after every completed interactive step; the
/// pre-render path emits `Progress` at coarse percentages and `Complete`
/// when the batch finishes.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A step finished; the frame is the snapshot as of that step.
    FrameReady(Arc<SnapshotFrame>),

    /// Pre-render progress update.
    Progress { percent: u8, message: String },

    /// Pre-render finished.
    Complete {
        run_id: Uuid,
        frames: usize,
        elapsed_ms: u64,
    },

    /// The run halted on an error after the last completed step.
    Halted { run_id: Uuid, error: String },
}

/// Read-only view of one particle, as handed to external consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub id: u32,
    /// Eastward offset from the release point, km.
    pub x_km: f64,
    /// Northward offset from the release point, km.
    pub y_km: f64,
    /// Depth below the surface, km, in [0, 1].
    pub depth_km: f64,
    pub concentration: f64,
    pub age_days: f64,
    /// Remaining mass/activity in the species base unit.
    pub mass: f64,
    pub active: bool,
    pub species_id: String,
    /// Most recent positions, oldest first, (x_km, y_km, depth_km).
    pub trail: Vec<[f64; 3]>,
}

/// Aggregates for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    pub sim_day: f64,
    pub date_utc: DateTime<Utc>,
    pub released_total: u64,
    pub decayed_total: u64,
    pub active_count: usize,
    /// Particles frozen on land this step (gauge, not cumulative).
    pub particles_on_land: usize,
    pub max_depth_m: f64,
    pub max_concentration: f64,
}

/// One recorded frame: aggregate stats plus the active particle records.
///
/// Frames within a run are strictly ordered by `stats.sim_day`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFrame {
    pub stats: SummaryStats,
    pub particles: Vec<ParticleRecord>,
}
