pub mod binary;
pub mod cache;
pub mod currents;
pub mod diffusivity;
pub mod f16;
pub mod index;
pub mod metadata;

pub use binary::{CoordsFile, CurrentFile, DiffusivityFile, F32View, U16View};
pub use cache::DayCache;
pub use currents::CurrentField;
pub use diffusivity::DiffusivityField;
pub use index::SpatialIndex;
pub use metadata::ArchiveMetadata;
