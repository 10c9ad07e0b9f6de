//! Dermascan Core
//!
//! Core types and utilities shared across Dermascan components.
//!
//! This crate provides:
//! - The error taxonomy and `Result` alias used throughout the workspace
//! - The `Diagnosis` label and its fixed suggestion mapping
//! - The `PredictionRecord` data model persisted for every screening

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Diagnosis, PredictionRecord};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{Diagnosis, PredictionRecord};
}
