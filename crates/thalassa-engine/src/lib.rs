pub mod clock;
pub mod concentration;
pub mod decay;
pub mod framebuffer;
pub mod integrator;
pub mod particle;
pub mod release;
pub mod simulation;

pub use clock::SimulationClock;
pub use framebuffer::{FrameBuffer, Seek};
pub use integrator::{AdvectionScheme, Integrator, Rk4Settings, StepOutcome};
pub use particle::{EmissionSettings, Particle, ParticlePool, SchemeTag};
pub use release::{ReleasePhase, ReleaseSchedule};
pub use simulation::{RunStats, Simulation};
