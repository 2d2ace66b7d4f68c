//! Persistence for pathogen model records and their artifact files.

mod artifacts;
mod generic_model;
mod memory;
mod repository;

pub use artifacts::{ArtifactKind, ArtifactStore};
pub use generic_model::PgModelRepository;
pub use memory::MemoryModelRepository;
pub use repository::ModelRepository;
