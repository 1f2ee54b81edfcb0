//! Synchronous partition fixture shared by the integration tests.
//!
//! Mirrors what the app's scan driver does for one entity, without async:
//! fetch every live cursor (rolling over page boundaries), then merge.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use meridian_core::{
    Cursor, CursorGroup, MeridianError, PartitionRead, RawPage, RankingEngine, SourceDescriptor,
    SourceSeries, merge_into_group,
};

/// One entity's partitions, each pre-sorted, served in fixed-size pages.
pub struct Partitions {
    pub parts: Vec<Vec<SourceSeries>>,
    pub page_size: usize,
    /// Set the end flag on a full page that happens to be the last one.
    pub flag_full_final_page: bool,
    /// Set the end flag at all; without it only short pages end a partition.
    pub end_flags: bool,
}

impl Partitions {
    pub fn new(parts: Vec<Vec<SourceSeries>>, page_size: usize) -> Self {
        Self {
            parts,
            page_size,
            flag_full_final_page: true,
            end_flags: true,
        }
    }

    /// Sort every partition by series order, as a real store would.
    pub fn sorted(mut self, engine: &RankingEngine) -> Self {
        for part in &mut self.parts {
            engine.sort_series(part);
        }
        self
    }

    pub fn count(&self) -> u32 {
        self.parts.len() as u32
    }

    pub fn fetch(&self, cursor: Cursor) -> RawPage<SourceSeries> {
        let part = &self.parts[cursor.partition as usize];
        let page_start = cursor.page as usize * self.page_size;
        let page_end = page_start + self.page_size;
        let start = (page_start + cursor.item as usize).min(part.len());
        let stop = page_end.min(part.len());
        let items = if start < stop {
            part[start..stop].to_vec()
        } else {
            Vec::new()
        };
        let end_of_partition = if !self.end_flags {
            false
        } else if self.flag_full_final_page {
            page_end >= part.len()
        } else {
            page_end > part.len()
        };
        RawPage::new(items, end_of_partition).with_page_size(self.page_size as u32)
    }

    /// Fetch with at most one rollover past a page boundary.
    pub fn read(&self, cursor: Cursor) -> PartitionRead<SourceSeries> {
        let read = PartitionRead::new(cursor, self.fetch(cursor));
        if !read.is_page_boundary() {
            return read;
        }
        let mut next = cursor;
        next.next_page().expect("next page");
        PartitionRead::new(next, self.fetch(next))
    }

    /// One scan call for the entity.
    pub fn scan_once(
        &self,
        engine: &RankingEngine,
        group: &mut CursorGroup,
        budget: usize,
    ) -> Result<Vec<SourceSeries>, MeridianError> {
        let reads = group.live_cursors().map(|c| self.read(*c)).collect();
        merge_into_group(engine, group, reads, budget)
    }

    /// Scan until the group is exhausted; returns every page delivered.
    pub fn drain(&self, engine: &RankingEngine, budget: usize) -> Vec<Vec<SourceSeries>> {
        let mut group = CursorGroup::fresh("entity", self.count());
        let mut pages = Vec::new();
        for _ in 0..10_000 {
            if group.is_exhausted() || group.cursors.is_empty() {
                return pages;
            }
            pages.push(self.scan_once(engine, &mut group, budget).expect("scan"));
        }
        panic!("scan did not terminate");
    }
}

/// A series with a unique tag in its unit field.
pub fn tagged(import: &str, tag: impl Into<String>, dates: &[&str]) -> SourceSeries {
    dates.iter().fold(
        SourceSeries::new(SourceDescriptor::new(import, "", "").with_unit(tag)),
        |s, d| s.with_value(*d, 1.0),
    )
}

pub fn tags(items: &[SourceSeries]) -> Vec<String> {
    items.iter().map(|s| s.descriptor.unit.clone()).collect()
}
