//! # Cursor Module
//!
//! Resumable read positions for paginated bulk reads.
//!
//! - `Cursor`: next unread item of one partition for one entity
//! - `CursorGroup`: every partition cursor of one entity
//! - `PaginationInfo`: every cursor group of one bulk request
//!
//! `PaginationInfo` is the opaque continuation token. The server produces
//! it, the caller hands it back unmodified, and the rules here decide what a
//! well-formed token looks like.
//!
//! ## Group states
//!
//! - no cursors: partitions not listed yet (listing failed on an earlier
//!   call); initialized fresh on the next call
//! - some live cursor: more pages may exist
//! - every cursor terminal: exhausted, dropped from the outgoing token

use crate::primitives::TERMINAL_ITEM;
use crate::MeridianError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// CURSOR
// =============================================================================

/// Position of the next unread item in one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Index of the import group (partition), from 0.
    pub partition: u32,
    /// Index of the page, from 0.
    pub page: u32,
    /// Position of the next unread item in the page, from 0.
    pub item: u32,
}

impl Cursor {
    /// A cursor at the start of a partition.
    #[must_use]
    pub const fn fresh(partition: u32) -> Self {
        Self {
            partition,
            page: 0,
            item: 0,
        }
    }

    /// Whether the partition has been fully read.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.item == TERMINAL_ITEM
    }

    /// Read position as a lexicographically ordered pair.
    #[must_use]
    pub const fn position(&self) -> (u32, u32) {
        (self.page, self.item)
    }

    /// Mark the partition as fully read.
    pub fn mark_terminal(&mut self) {
        self.item = TERMINAL_ITEM;
    }

    /// Move past `consumed` items on the current page.
    pub fn advance(&mut self, consumed: usize) -> Result<(), MeridianError> {
        if self.is_terminal() {
            return Err(MeridianError::Internal(format!(
                "cannot advance terminal cursor of partition {}",
                self.partition
            )));
        }
        let consumed = u32::try_from(consumed).map_err(|_| {
            MeridianError::Internal(format!("consumed count {} overflows cursor", consumed))
        })?;
        match self.item.checked_add(consumed) {
            Some(item) if item != TERMINAL_ITEM => {
                self.item = item;
                Ok(())
            }
            _ => Err(MeridianError::Internal(format!(
                "item index overflow in partition {}",
                self.partition
            ))),
        }
    }

    /// Move to the start of the next page.
    pub fn next_page(&mut self) -> Result<(), MeridianError> {
        if self.is_terminal() {
            return Err(MeridianError::Internal(format!(
                "cannot turn page of terminal cursor of partition {}",
                self.partition
            )));
        }
        self.page = self.page.checked_add(1).ok_or_else(|| {
            MeridianError::Internal(format!("page index overflow in partition {}", self.partition))
        })?;
        self.item = 0;
        Ok(())
    }
}

// =============================================================================
// CURSOR GROUP
// =============================================================================

/// Pagination state of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorGroup {
    /// Entity key that identifies the group.
    pub key: String,
    /// One cursor per partition, ascending partition index.
    pub cursors: Vec<Cursor>,
}

impl CursorGroup {
    /// Fresh state: one zero cursor per partition.
    #[must_use]
    pub fn fresh(key: impl Into<String>, partition_count: u32) -> Self {
        Self {
            key: key.into(),
            cursors: (0..partition_count).map(Cursor::fresh).collect(),
        }
    }

    /// A group whose partitions have not been listed yet.
    #[must_use]
    pub fn pending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cursors: Vec::new(),
        }
    }

    /// Whether the partitions still need to be listed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Whether every partition has been fully read.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.cursors.is_empty() && self.cursors.iter().all(Cursor::is_terminal)
    }

    /// Cursors that still have data to read.
    pub fn live_cursors(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.iter().filter(|c| !c.is_terminal())
    }

    /// Mutable access to the cursor of one partition.
    pub fn cursor_mut(&mut self, partition: u32) -> Option<&mut Cursor> {
        self.cursors.iter_mut().find(|c| c.partition == partition)
    }

    /// Check that the cursors cover exactly `partition_count` partitions.
    pub fn check_topology(&self, partition_count: u32) -> Result<(), MeridianError> {
        let matches = self.cursors.len() == partition_count as usize
            && self
                .cursors
                .iter()
                .zip(0..partition_count)
                .all(|(c, expected)| c.partition == expected);
        if matches {
            Ok(())
        } else {
            Err(MeridianError::Internal(format!(
                "cursor state for '{}' covers {} partitions, store reports {}",
                self.key,
                self.cursors.len(),
                partition_count
            )))
        }
    }

    /// Structural checks that do not need the store.
    fn validate(&self) -> Result<(), MeridianError> {
        for pair in self.cursors.windows(2) {
            if pair[0].partition >= pair[1].partition {
                return Err(MeridianError::InvalidArgument(format!(
                    "cursors of '{}' are not in ascending partition order",
                    self.key
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// PAGINATION INFO
// =============================================================================

/// Continuation state of one bulk request.
///
/// Holds one group per requested entity that may still have pages, in
/// request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub cursor_groups: Vec<CursorGroup>,
}

impl PaginationInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no entity has any page left.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor_groups.iter().all(CursorGroup::is_exhausted)
    }

    /// Look up the group of one entity.
    #[must_use]
    pub fn group(&self, key: &str) -> Option<&CursorGroup> {
        self.cursor_groups.iter().find(|g| g.key == key)
    }

    /// Validate a caller-supplied token against the request entity list.
    ///
    /// Group keys must be unique, present in the request, and appear in
    /// request order; each group's cursors must ascend by partition.
    pub fn validate_for(&self, entities: &[String]) -> Result<(), MeridianError> {
        let positions: BTreeMap<&str, usize> = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect();

        let mut previous: Option<usize> = None;
        for group in &self.cursor_groups {
            let Some(&position) = positions.get(group.key.as_str()) else {
                return Err(MeridianError::InvalidArgument(format!(
                    "token references entity '{}' that is not in the request",
                    group.key
                )));
            };
            if previous.is_some_and(|p| p >= position) {
                return Err(MeridianError::InvalidArgument(format!(
                    "token entity '{}' is out of request order or repeated",
                    group.key
                )));
            }
            previous = Some(position);
            group.validate()?;
        }
        Ok(())
    }

    /// Drop exhausted groups; `None` if nothing remains.
    #[must_use]
    pub fn into_continuation(self) -> Option<Self> {
        let cursor_groups: Vec<CursorGroup> = self
            .cursor_groups
            .into_iter()
            .filter(|g| !g.is_exhausted())
            .collect();
        if cursor_groups.is_empty() {
            None
        } else {
            Some(Self { cursor_groups })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
