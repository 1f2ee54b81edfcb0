//! # Core Type Definitions
//!
//! This module contains the value types shared by every Meridian component:
//! - Provenance description (`SourceDescriptor`)
//! - Provenance-tagged time series (`SourceSeries`)
//! - Error taxonomy (`MeridianError`)
//!
//! ## Determinism Guarantees
//!
//! - Series observations are kept in a `BTreeMap`, so iteration follows the
//!   lexicographic order of the date strings.
//! - Observation values are carried but never computed on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// SOURCE DESCRIPTOR
// =============================================================================

/// Identifies the provenance of one series or observation.
///
/// Only `import_name`, `measurement_method` and `observation_period` take
/// part in score resolution; the remaining fields are tie-breakers.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub import_name: String,
    #[serde(default)]
    pub measurement_method: String,
    #[serde(default)]
    pub observation_period: String,
    #[serde(default)]
    pub scaling_factor: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub provenance_url: String,
}

impl SourceDescriptor {
    /// Create a descriptor with only the rank-relevant fields set.
    #[must_use]
    pub fn new(
        import_name: impl Into<String>,
        measurement_method: impl Into<String>,
        observation_period: impl Into<String>,
    ) -> Self {
        Self {
            import_name: import_name.into(),
            measurement_method: measurement_method.into(),
            observation_period: observation_period.into(),
            ..Self::default()
        }
    }

    /// Set the scaling factor.
    #[must_use]
    pub fn with_scaling_factor(mut self, scaling_factor: impl Into<String>) -> Self {
        self.scaling_factor = scaling_factor.into();
        self
    }

    /// Set the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the provenance URL.
    #[must_use]
    pub fn with_provenance_url(mut self, url: impl Into<String>) -> Self {
        self.provenance_url = url.into();
        self
    }
}

// =============================================================================
// SOURCE SERIES
// =============================================================================

/// One provenance-tagged time series for a statistical variable and place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSeries {
    #[serde(flatten)]
    pub descriptor: SourceDescriptor,
    /// Observation date -> value.
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl SourceSeries {
    /// Create an empty series for the given provenance.
    #[must_use]
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self {
            descriptor,
            values: BTreeMap::new(),
        }
    }

    /// Add an observation, replacing any previous value for the same date.
    #[must_use]
    pub fn with_value(mut self, date: impl Into<String>, value: f64) -> Self {
        self.values.insert(date.into(), value);
        self
    }

    /// The lexicographically greatest observation date, if any.
    #[must_use]
    pub fn latest_date(&self) -> Option<&str> {
        self.values.keys().next_back().map(String::as_str)
    }

    /// Number of observations in the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Meridian.
///
/// - No silent failures
/// - Use `Result<T, MeridianError>` for fallible operations
/// - The CORE never panics; all errors are recoverable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeridianError {
    /// Empty or malformed entity list, bad page budget, or malformed token.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The entity does not exist in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A partition fetch failed in transport.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Cursor state is inconsistent with the store topology.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The request deadline elapsed before every entity was merged.
    #[error("Deadline exceeded after {0} ms")]
    DeadlineExceeded(u64),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl MeridianError {
    /// Stable status code, suitable for mapping onto an RPC status.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
            Self::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            Self::SerializationError(_) | Self::IoError(_) => "INTERNAL",
        }
    }

    /// Whether a caller may reasonably retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::DeadlineExceeded(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
