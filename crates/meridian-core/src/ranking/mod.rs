//! # Ranking Engine
//!
//! Deterministic ordering of data from competing provenances.
//!
//! Source ranking uses these criteria, in order:
//! 1. More trusted source (lower table score) ranks higher
//! 2. Latest data ranks higher
//! 3. More data ranks higher
//! 4. Descriptor fields, compared lexicographically
//!
//! Anything still equal after that keeps its input order (stable sort), so
//! the merge output is the same for any permutation of distinct inputs.

mod table;

pub use table::{RankEntry, RankKey, RankingTable};

use crate::{SourceDescriptor, SourceSeries};
use std::cmp::Ordering;
use std::sync::Arc;

// =============================================================================
// RANKED TRAIT
// =============================================================================

/// Anything that can be ordered by provenance.
///
/// Store items implement this to take part in the merge. Only `descriptor`
/// is required; items without observation dates rank purely on score and
/// descriptor fields.
pub trait Ranked {
    /// The provenance of this item.
    fn descriptor(&self) -> &SourceDescriptor;

    /// Latest observation date, compared lexicographically.
    fn latest_date(&self) -> Option<&str> {
        None
    }

    /// Number of observations carried by the item.
    fn observation_count(&self) -> usize {
        0
    }
}

impl Ranked for SourceSeries {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn latest_date(&self) -> Option<&str> {
        SourceSeries::latest_date(self)
    }

    fn observation_count(&self) -> usize {
        self.len()
    }
}

impl Ranked for SourceDescriptor {
    fn descriptor(&self) -> &SourceDescriptor {
        self
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Resolves scores and orders ranked collections.
///
/// Cheap to clone; all clones share one immutable table.
#[derive(Debug, Clone)]
pub struct RankingEngine {
    table: Arc<RankingTable>,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new(Arc::new(RankingTable::builtin()))
    }
}

impl RankingEngine {
    /// Create an engine over an injected table.
    #[must_use]
    pub fn new(table: Arc<RankingTable>) -> Self {
        Self { table }
    }

    /// Preference score of a descriptor. Total; never fails.
    #[must_use]
    pub fn score(&self, descriptor: &SourceDescriptor) -> i32 {
        self.table.resolve(descriptor)
    }

    /// Order two series of the same variable/place across dates.
    ///
    /// `Ordering::Less` means `a` ranks ahead of `b`.
    pub fn compare_series<T: Ranked + ?Sized>(&self, a: &T, b: &T) -> Ordering {
        let (da, db) = (a.descriptor(), b.descriptor());
        self.score(da)
            .cmp(&self.score(db))
            // Missing dates compare as the empty string, below every date.
            .then_with(|| {
                b.latest_date()
                    .unwrap_or_default()
                    .cmp(a.latest_date().unwrap_or_default())
            })
            .then_with(|| b.observation_count().cmp(&a.observation_count()))
            .then_with(|| da.import_name.cmp(&db.import_name))
            .then_with(|| compare_descriptor_tail(da, db))
    }

    /// Order two members of a cohort (distinct series for one variable/place).
    pub fn compare_cohort<T: Ranked + ?Sized>(&self, a: &T, b: &T) -> Ordering {
        let (da, db) = (a.descriptor(), b.descriptor());
        self.score(da)
            .cmp(&self.score(db))
            .then_with(|| compare_descriptor_tail(da, db))
    }

    /// Stable sort by series ordering.
    pub fn sort_series<T: Ranked>(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare_series(a, b));
    }

    /// Stable sort by cohort ordering.
    pub fn sort_cohort<T: Ranked>(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare_cohort(a, b));
    }
}

/// Compare the descriptor fields after the import name.
fn compare_descriptor_tail(a: &SourceDescriptor, b: &SourceDescriptor) -> Ordering {
    a.measurement_method
        .cmp(&b.measurement_method)
        .then_with(|| a.observation_period.cmp(&b.observation_period))
        .then_with(|| a.scaling_factor.cmp(&b.scaling_factor))
        .then_with(|| a.unit.cmp(&b.unit))
        .then_with(|| a.provenance_url.cmp(&b.provenance_url))
}

// =============================================================================
// TESTS
// =============================================================================
