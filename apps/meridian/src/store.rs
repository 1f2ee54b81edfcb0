//! # Store Seam
//!
//! The merge-scan driver reads partitions through `PageSource`. Real store
//! clients implement it outside this crate; `MemoryStore` is the in-memory
//! implementation behind the CLI and the tests.
//!
//! ## Fixture format (JSON)
//!
//! ```json
//! {
//!   "page_size": 2,
//!   "entities": {
//!     "geoId/06": [
//!       [{"import_name": "CensusPEP", "values": {"2020": 39538223}}],
//!       [{"import_name": "WikidataPopulation", "values": {"2021": 39237836}}]
//!     ]
//!   },
//!   "triples": { "geoId/06": { "out_nodes": { "containedInPlace": { "entities": [] } } } },
//!   "failures": [{ "entity": "geoId/06", "partition": 1 }]
//! }
//! ```

use meridian_core::{MeridianError, RankingEngine, RawPage, Ranked, SourceSeries, Triples};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

/// Maximum fixture file size (100 MB).
const MAX_FIXTURE_FILE_SIZE: u64 = 100 * 1024 * 1024;

// =============================================================================
// PAGE SOURCE
// =============================================================================

/// Raw page access to a partitioned store.
///
/// Every partition of an entity is a pre-sorted stream cut into fixed-size
/// pages numbered from 0. Implementations never retry.
pub trait PageSource: Send + Sync + 'static {
    /// Item type carried by the pages.
    type Item: Ranked + Clone + Send + 'static;

    /// Number of partitions holding data for `entity`.
    ///
    /// `NotFound` is treated by the driver as zero partitions.
    fn partitions(&self, entity: &str) -> impl Future<Output = Result<u32, MeridianError>> + Send;

    /// Items of one page starting at `item`.
    ///
    /// Returns no items and no end flag when `item` sits past the last item
    /// of a page that is followed by more pages. The end of a partition is
    /// signalled by the end flag, or by a short page when the returned
    /// `RawPage` carries the page size.
    fn fetch(
        &self,
        entity: &str,
        partition: u32,
        page: u32,
        item: u32,
    ) -> impl Future<Output = Result<RawPage<Self::Item>, MeridianError>> + Send;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// A fetch that always fails with `Unavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePoint {
    pub entity: String,
    /// Failing partition; `None` fails the partition listing itself.
    #[serde(default)]
    pub partition: Option<u32>,
}

/// In-memory partitioned store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Set the end flag on a full page that is also the last one. Stores
    /// that cannot tell leave it unset and rely on page rollover.
    #[serde(default = "default_flag_full_final_page")]
    pub flag_full_final_page: bool,
    /// Entity -> partitions -> items.
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<Vec<SourceSeries>>>,
    /// Entity -> relations, for the fan-out filter.
    #[serde(default)]
    pub triples: BTreeMap<String, Triples>,
    #[serde(default)]
    pub failures: Vec<FailurePoint>,
}

fn default_page_size() -> u32 {
    100
}

fn default_flag_full_final_page() -> bool {
    true
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(default_page_size())
    }
}

impl MemoryStore {
    /// Create an empty store with the given page size.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            flag_full_final_page: default_flag_full_final_page(),
            entities: BTreeMap::new(),
            triples: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Add an entity with its partitions.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>, partitions: Vec<Vec<SourceSeries>>) -> Self {
        self.entities.insert(entity.into(), partitions);
        self
    }

    /// Add a failing fetch.
    #[must_use]
    pub fn with_failure(mut self, entity: impl Into<String>, partition: Option<u32>) -> Self {
        self.failures.push(FailurePoint {
            entity: entity.into(),
            partition,
        });
        self
    }

    /// Parse a JSON fixture.
    pub fn from_json(json: &str) -> Result<Self, MeridianError> {
        let store: Self = serde_json::from_str(json)
            .map_err(|e| MeridianError::SerializationError(format!("Invalid store fixture: {}", e)))?;
        if store.page_size == 0 {
            return Err(MeridianError::InvalidArgument(
                "store page_size must be at least 1".to_string(),
            ));
        }
        Ok(store)
    }

    /// Load a JSON fixture from disk.
    pub fn load(path: &Path) -> Result<Self, MeridianError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            MeridianError::IoError(format!("Cannot read fixture '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_FIXTURE_FILE_SIZE {
            return Err(MeridianError::SerializationError(format!(
                "Fixture size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_FIXTURE_FILE_SIZE
            )));
        }
        let json = std::fs::read_to_string(path).map_err(|e| {
            MeridianError::IoError(format!("Cannot read fixture '{}': {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Sort every partition into series order.
    ///
    /// Real stores serve pre-sorted partitions; fixtures may be written in
    /// any order.
    pub fn sort_partitions(&mut self, engine: &RankingEngine) {
        for partitions in self.entities.values_mut() {
            for items in partitions {
                engine.sort_series(items);
            }
        }
    }

    /// Relations of one entity.
    pub fn triples(&self, entity: &str) -> Result<Triples, MeridianError> {
        self.triples
            .get(entity)
            .cloned()
            .ok_or_else(|| MeridianError::NotFound(format!("no relations for '{}'", entity)))
    }

    fn check_failure(&self, entity: &str, partition: Option<u32>) -> Result<(), MeridianError> {
        if self
            .failures
            .iter()
            .any(|f| f.entity == entity && f.partition == partition)
        {
            let target = match partition {
                Some(p) => format!("partition {} of '{}'", p, entity),
                None => format!("partition listing of '{}'", entity),
            };
            return Err(MeridianError::Unavailable(format!("{} is unreachable", target)));
        }
        Ok(())
    }

    fn read_page(
        &self,
        entity: &str,
        partition: u32,
        page: u32,
        item: u32,
    ) -> Result<RawPage<SourceSeries>, MeridianError> {
        self.check_failure(entity, Some(partition))?;
        let items = self
            .entities
            .get(entity)
            .and_then(|partitions| partitions.get(partition as usize))
            .ok_or_else(|| {
                MeridianError::NotFound(format!("partition {} of '{}'", partition, entity))
            })?;

        let page_size = self.page_size as usize;
        let page_start = (page as usize).saturating_mul(page_size);
        let page_end = page_start.saturating_add(page_size);
        let start = page_start.saturating_add(item as usize).min(items.len());
        let stop = page_end.min(items.len());

        let page_items = items.get(start..stop).map(<[_]>::to_vec).unwrap_or_default();
        let end_of_partition = if self.flag_full_final_page {
            page_end >= items.len()
        } else {
            page_end > items.len()
        };
        Ok(RawPage::new(page_items, end_of_partition).with_page_size(self.page_size))
    }
}

impl PageSource for MemoryStore {
    type Item = SourceSeries;

    async fn partitions(&self, entity: &str) -> Result<u32, MeridianError> {
        self.check_failure(entity, None)?;
        let partitions = self
            .entities
            .get(entity)
            .ok_or_else(|| MeridianError::NotFound(format!("entity '{}'", entity)))?;
        u32::try_from(partitions.len())
            .map_err(|_| MeridianError::Internal(format!("too many partitions for '{}'", entity)))
    }

    async fn fetch(
        &self,
        entity: &str,
        partition: u32,
        page: u32,
        item: u32,
    ) -> Result<RawPage<SourceSeries>, MeridianError> {
        self.read_page(entity, partition, page, item)
    }
}

// =============================================================================
// TESTS
// =============================================================================
