//! Common structs for pathogen model metadata shared across crates.

mod identity;
mod model;

pub use identity::*;
pub use model::*;
