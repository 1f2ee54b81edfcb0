//! # Configuration
//!
//! TOML configuration for the scan driver, the fan-out filter and the
//! ranking table.
//!
//! ```toml
//! [scan]
//! concurrency_limit = 32
//! page_budget = 500
//! deadline_ms = 2000
//!
//! [filter]
//! triple_limit = 50
//!
//! [ranking]
//! include_builtin = true
//!
//! [[ranking.entries]]
//! import_name = "CensusPEP"
//! measurement_method = "CensusPEPSurvey"
//! score = 0
//! ```
//!
//! ## Environment Variables
//!
//! - `MERIDIAN_CONFIG`: config file path when `--config` is not given
//! - `MERIDIAN_CONCURRENCY`: overrides `scan.concurrency_limit`
//! - `MERIDIAN_PAGE_BUDGET`: overrides `scan.page_budget`
//! - `MERIDIAN_DEADLINE_MS`: overrides `scan.deadline_ms` (0 disables)

use meridian_core::primitives::{DEFAULT_PAGE_BUDGET, WILDCARD};
use meridian_core::{
    FanOutFilter, MeridianError, RankEntry, RankKey, RankingEngine, RankingTable, validate_budget,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for concurrent store calls per scan.
pub const MAX_CONCURRENCY_LIMIT: usize = 4096;

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// `[scan]`: merge-scan driver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    /// Maximum number of store calls in flight.
    pub concurrency_limit: usize,
    /// Items returned per entity when a request names no budget.
    pub page_budget: usize,
    /// Whole-call deadline; `None` waits indefinitely.
    pub deadline_ms: Option<u64>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 32,
            page_budget: DEFAULT_PAGE_BUDGET,
            deadline_ms: None,
        }
    }
}

impl ScanSettings {
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// `[filter]`: relation fan-out cap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    /// Per-bucket cap; 0 means unbounded.
    pub triple_limit: usize,
}

/// One `[[ranking.entries]]` row. Method and period default to `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingOverride {
    pub import_name: String,
    #[serde(default = "wildcard")]
    pub measurement_method: String,
    #[serde(default = "wildcard")]
    pub observation_period: String,
    pub score: i32,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

impl From<&RankingOverride> for RankEntry {
    fn from(row: &RankingOverride) -> Self {
        RankEntry {
            key: RankKey::new(
                row.import_name.as_str(),
                row.measurement_method.as_str(),
                row.observation_period.as_str(),
            ),
            score: row.score,
        }
    }
}

/// `[ranking]`: preference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingSettings {
    /// Start from the curated table before applying `entries`.
    pub include_builtin: bool,
    pub entries: Vec<RankingOverride>,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            include_builtin: true,
            entries: Vec::new(),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scan: ScanSettings,
    pub filter: FilterSettings,
    pub ranking: RankingSettings,
}

impl Config {
    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, MeridianError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| MeridianError::SerializationError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, MeridianError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            MeridianError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(MeridianError::SerializationError(format!(
                "Config size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            MeridianError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the effective config: file (from `path` or `MERIDIAN_CONFIG`),
    /// then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, MeridianError> {
        let env_path = std::env::var("MERIDIAN_CONFIG").ok().map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(p) => {
                tracing::info!("Loading config from {}", p.display());
                Self::load(p)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MERIDIAN_*` overrides read through `lookup`, then re-validate.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), MeridianError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(limit) = parse_override(&lookup, "MERIDIAN_CONCURRENCY") {
            self.scan.concurrency_limit = limit;
        }
        if let Some(budget) = parse_override(&lookup, "MERIDIAN_PAGE_BUDGET") {
            self.scan.page_budget = budget;
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "MERIDIAN_DEADLINE_MS") {
            self.scan.deadline_ms = (ms > 0).then_some(ms);
        }
        self.validate()
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), MeridianError> {
        if self.scan.concurrency_limit == 0 || self.scan.concurrency_limit > MAX_CONCURRENCY_LIMIT {
            return Err(MeridianError::InvalidArgument(format!(
                "scan.concurrency_limit {} outside 1..={}",
                self.scan.concurrency_limit, MAX_CONCURRENCY_LIMIT
            )));
        }
        validate_budget(self.scan.page_budget)?;
        if self.scan.deadline_ms == Some(0) {
            return Err(MeridianError::InvalidArgument(
                "scan.deadline_ms must be positive; omit it to disable".to_string(),
            ));
        }
        if let Some(row) = self.ranking.entries.iter().find(|r| r.import_name.is_empty()) {
            return Err(MeridianError::InvalidArgument(format!(
                "ranking entry with score {} has an empty import_name",
                row.score
            )));
        }
        Ok(())
    }

    /// Build the ranking table described by `[ranking]`.
    #[must_use]
    pub fn ranking_table(&self) -> RankingTable {
        let base = if self.ranking.include_builtin {
            RankingTable::builtin()
        } else {
            RankingTable::new()
        };
        base.with_overrides(self.ranking.entries.iter().map(RankEntry::from))
    }

    /// A ranking engine over `ranking_table`.
    #[must_use]
    pub fn engine(&self) -> RankingEngine {
        RankingEngine::new(Arc::new(self.ranking_table()))
    }

    #[must_use]
    pub fn filter(&self) -> FanOutFilter {
        FanOutFilter::new(self.filter.triple_limit)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
