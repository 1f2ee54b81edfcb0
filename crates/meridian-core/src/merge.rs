//! # Merge Module
//!
//! Rank-merges the pages fetched from one entity's partitions and advances
//! that entity's cursors by exactly what was consumed.
//!
//! Each partition stream is pre-sorted, so the merge is a k-way merge: at
//! every step the best-ranked head among the partitions is taken, ties going
//! to the lower partition index. Consumption from a partition is therefore
//! always a prefix of what was fetched from it, and
//! `item index += consumed` points at the first item not yet delivered.
//! Fetched but unconsumed items are dropped; the next call re-reads them.
//!
//! A partition ends when its fetch sets the end flag, or when the store
//! reports its page size and the fetch came back short of a full page. In
//! both cases the cursor only turns terminal once every fetched item was
//! consumed.

use crate::cursor::{Cursor, CursorGroup};
use crate::ranking::{Ranked, RankingEngine};
use crate::MeridianError;
use std::collections::VecDeque;

/// One raw page as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage<T> {
    /// Items of the page, starting at the requested item index.
    pub items: Vec<T>,
    /// Set when no item exists in the partition after the returned ones.
    pub end_of_partition: bool,
    /// Items per full page, when the store reports it.
    pub page_size: Option<u32>,
}

impl<T> RawPage<T> {
    #[must_use]
    pub fn new(items: Vec<T>, end_of_partition: bool) -> Self {
        Self {
            items,
            end_of_partition,
            page_size: None,
        }
    }

    /// Record the store's page size so short pages end the partition.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Empty page that ends the partition.
    #[must_use]
    pub fn end() -> Self {
        Self::new(Vec::new(), true)
    }

    /// Read at `item`, the page stops before a full page's worth of items.
    #[must_use]
    pub fn is_short(&self, item: u32) -> bool {
        self.page_size
            .is_some_and(|size| (item as usize).saturating_add(self.items.len()) < size as usize)
    }
}

/// A raw page together with the cursor position it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRead<T> {
    pub cursor: Cursor,
    pub page: RawPage<T>,
}

impl<T> PartitionRead<T> {
    #[must_use]
    pub fn new(cursor: Cursor, page: RawPage<T>) -> Self {
        Self { cursor, page }
    }

    /// Nothing follows the fetched items in this partition.
    #[must_use]
    pub fn ends_partition(&self) -> bool {
        self.page.end_of_partition || self.page.is_short(self.cursor.item)
    }

    /// Zero items, but more pages follow.
    #[must_use]
    pub fn is_page_boundary(&self) -> bool {
        self.page.items.is_empty() && !self.ends_partition()
    }
}

/// Merge one entity's partition reads into at most `budget` items and
/// advance `group` accordingly.
///
/// The group is only modified when the whole merge succeeds.
pub fn merge_into_group<T: Ranked>(
    engine: &RankingEngine,
    group: &mut CursorGroup,
    mut reads: Vec<PartitionRead<T>>,
    budget: usize,
) -> Result<Vec<T>, MeridianError> {
    reads.sort_by_key(|r| r.cursor.partition);
    for read in &reads {
        check_read(group, read)?;
    }
    if let Some(pair) = reads
        .windows(2)
        .find(|pair| pair[0].cursor.partition == pair[1].cursor.partition)
    {
        return Err(MeridianError::Internal(format!(
            "partition {} of '{}' was read twice",
            pair[0].cursor.partition, group.key
        )));
    }

    let mut starts = Vec::with_capacity(reads.len());
    let mut streams: Vec<VecDeque<T>> = Vec::with_capacity(reads.len());
    for read in reads {
        starts.push((read.cursor, read.page.items.len(), read.ends_partition()));
        streams.push(read.page.items.into());
    }

    let mut consumed = vec![0usize; streams.len()];
    let mut merged = Vec::with_capacity(budget.min(streams.iter().map(VecDeque::len).sum()));

    while merged.len() < budget {
        let Some(best) = best_head(engine, &streams) else {
            break;
        };
        if let Some(item) = streams[best].pop_front() {
            merged.push(item);
            consumed[best] += 1;
        }
    }

    let mut advanced = Vec::with_capacity(starts.len());
    for ((mut cursor, fetched, ends), used) in starts.into_iter().zip(consumed) {
        if used == fetched && ends {
            cursor.mark_terminal();
        } else if used > 0 {
            cursor.advance(used)?;
        }
        advanced.push(cursor);
    }

    for cursor in advanced {
        if let Some(slot) = group.cursor_mut(cursor.partition) {
            *slot = cursor;
        }
    }

    Ok(merged)
}

/// Index of the stream whose head ranks first; lowest index on ties.
fn best_head<T: Ranked>(engine: &RankingEngine, streams: &[VecDeque<T>]) -> Option<usize> {
    let mut best: Option<(usize, &T)> = None;
    for (index, stream) in streams.iter().enumerate() {
        let Some(head) = stream.front() else {
            continue;
        };
        match best {
            Some((_, current)) if engine.compare_series(head, current).is_ge() => {}
            _ => best = Some((index, head)),
        }
    }
    best.map(|(index, _)| index)
}

/// A read must target a live partition of the group at or past its cursor.
fn check_read<T>(group: &CursorGroup, read: &PartitionRead<T>) -> Result<(), MeridianError> {
    let partition = read.cursor.partition;
    let Some(current) = group.cursors.iter().find(|c| c.partition == partition) else {
        return Err(MeridianError::Internal(format!(
            "read from partition {} which '{}' does not have",
            partition, group.key
        )));
    };
    if current.is_terminal() || read.cursor.is_terminal() {
        return Err(MeridianError::Internal(format!(
            "read from terminal partition {} of '{}'",
            partition, group.key
        )));
    }
    if read.cursor.position() < current.position() {
        return Err(MeridianError::Internal(format!(
            "read position {:?} of partition {} is behind cursor {:?}",
            read.cursor.position(),
            partition,
            current.position()
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
