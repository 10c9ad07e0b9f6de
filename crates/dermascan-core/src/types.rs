//! Core data model shared across Dermascan components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categorical outcome of the binary screening model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnosis {
    /// Lesion classified as malignant
    Cancer,
    /// Lesion classified as benign
    #[serde(rename = "Non-cancer")]
    NonCancer,
}

impl Diagnosis {
    /// Fixed client-facing suggestion text for each label.
    ///
    /// The messages are part of the public API contract and must not change
    /// between releases.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Cancer => "Segera periksa ke dokter!",
            Self::NonCancer => "Penyakit kanker tidak terdeteksi.",
        }
    }
}

impl std::fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancer => write!(f, "Cancer"),
            Self::NonCancer => write!(f, "Non-cancer"),
        }
    }
}

/// One persisted classification outcome.
///
/// Created once per successful prediction and immutable thereafter. The
/// camelCase field names are the wire format consumed by existing clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    /// Opaque unique identifier (UUID v4)
    pub id: String,

    /// Classification label
    pub result: Diagnosis,

    /// Suggestion text matching the label
    pub suggestion: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Build a record for a fresh diagnosis, stamping id and timestamp.
    pub fn new(result: Diagnosis) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            result,
            suggestion: result.suggestion().to_string(),
            created_at: Utc::now(),
        }
    }
}
