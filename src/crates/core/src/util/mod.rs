//! Utility layer - shared data model and errors

pub mod errors;
pub mod types;

pub use errors::{NexusError, NexusResult};
