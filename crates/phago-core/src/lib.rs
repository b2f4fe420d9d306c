#![deny(missing_docs)]
#![doc = "Shared types for the phago simulation sweep workspace: the structured error family, run seed derivation and provenance descriptors."]

pub mod errors;
pub mod provenance;
pub mod seed;

pub use errors::{ErrorInfo, SweepError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use seed::derive_run_seed;
