//! Integration tests for the merge-scan driver.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use meridian::config::ScanSettings;
use meridian::{MemoryStore, MergeScanner, PageSource, decode_token, encode_token};
use meridian_core::{
    BulkPage, BulkRequest, CursorGroup, MeridianError, PaginationInfo, RankEntry, RankKey,
    RankingEngine, RankingTable, RawPage, SourceDescriptor, SourceSeries,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// FIXTURES
// =============================================================================

fn engine() -> RankingEngine {
    RankingEngine::new(Arc::new(RankingTable::from_entries([
        RankEntry {
            key: RankKey::new("Gold", "*", "*"),
            score: 0,
        },
        RankEntry {
            key: RankKey::new("Silver", "*", "*"),
            score: 1,
        },
    ])))
}

fn series(import: &str, tag: &str) -> SourceSeries {
    SourceSeries::new(SourceDescriptor::new(import, "", "").with_unit(tag))
}

fn settings(concurrency_limit: usize) -> ScanSettings {
    ScanSettings {
        concurrency_limit,
        ..ScanSettings::default()
    }
}

fn scanner(store: MemoryStore) -> MergeScanner<MemoryStore> {
    MergeScanner::new(Arc::new(store), engine(), &settings(8))
}

fn tags(page: &BulkPage<SourceSeries>, entity: &str) -> Vec<String> {
    page.entity(entity)
        .unwrap()
        .items()
        .iter()
        .map(|s| s.descriptor.unit.clone())
        .collect()
}

/// Two partitions of two items each for `E1`.
fn two_by_two() -> MemoryStore {
    MemoryStore::new(2).with_entity(
        "E1",
        vec![
            vec![series("Gold", "g1"), series("Gold", "g2")],
            vec![series("Silver", "s1"), series("Silver", "s2")],
        ],
    )
}

/// Counts store calls in flight and optionally slows every fetch.
struct Instrumented {
    inner: MemoryStore,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Instrumented {
    fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl PageSource for Instrumented {
    type Item = SourceSeries;

    async fn partitions(&self, entity: &str) -> Result<u32, MeridianError> {
        self.inner.partitions(entity).await
    }

    async fn fetch(
        &self,
        entity: &str,
        partition: u32,
        page: u32,
        item: u32,
    ) -> Result<RawPage<SourceSeries>, MeridianError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.fetch(entity, partition, page, item).await
    }
}

/// Never sets the end flag; the end shows only as a short page.
struct ShortPagesOnly {
    inner: MemoryStore,
    fetches: AtomicUsize,
}

impl PageSource for ShortPagesOnly {
    type Item = SourceSeries;

    async fn partitions(&self, entity: &str) -> Result<u32, MeridianError> {
        self.inner.partitions(entity).await
    }

    async fn fetch(
        &self,
        entity: &str,
        partition: u32,
        page: u32,
        item: u32,
    ) -> Result<RawPage<SourceSeries>, MeridianError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut raw = self.inner.fetch(entity, partition, page, item).await?;
        raw.end_of_partition = false;
        Ok(raw)
    }
}

/// Panics while listing the partitions of `doomed`.
struct PanicsOn {
    inner: MemoryStore,
    doomed: &'static str,
}

impl PageSource for PanicsOn {
    type Item = SourceSeries;

    async fn partitions(&self, entity: &str) -> Result<u32, MeridianError> {
        if entity == self.doomed {
            panic!("store client crashed on '{}'", entity);
        }
        self.inner.partitions(entity).await
    }

    async fn fetch(
        &self,
        entity: &str,
        partition: u32,
        page: u32,
        item: u32,
    ) -> Result<RawPage<SourceSeries>, MeridianError> {
        self.inner.fetch(entity, partition, page, item).await
    }
}

// =============================================================================
// PAGINATION
// =============================================================================

#[tokio::test]
async fn budget_three_over_two_partitions() {
    let scanner = scanner(two_by_two());
    let request = BulkRequest::new(["E1"]).with_page_budget(3);

    let first = scanner.scan(&request).await.unwrap();
    assert_eq!(tags(&first, "E1"), vec!["g1", "g2", "s1"]);
    let token = first.pagination.clone().expect("more pages");
    let group = token.group("E1").unwrap();
    assert!(group.cursors[0].is_terminal());
    assert_eq!(group.cursors[1].position(), (0, 1));

    let second = scanner
        .scan(&request.clone().with_pagination(Some(token)))
        .await
        .unwrap();
    assert_eq!(tags(&second, "E1"), vec!["s2"]);
    assert!(second.pagination.is_none());
}

#[tokio::test]
async fn replay_never_redelivers() {
    let mut store = MemoryStore::new(3);
    for (entity, parts) in [("A", 3usize), ("B", 1), ("C", 4)] {
        let partitions = (0..parts)
            .map(|p| {
                (0..7)
                    .map(|i| series(if i % 2 == 0 { "Gold" } else { "Silver" }, &format!("{entity}{p}-{i}")))
                    .collect::<Vec<_>>()
            })
            .collect();
        store = store.with_entity(entity, partitions);
    }
    store.sort_partitions(&engine());
    let scanner = scanner(store);

    let mut delivered: Vec<String> = Vec::new();
    let mut token: Option<PaginationInfo> = None;
    for _ in 0..100 {
        let request = BulkRequest::new(["A", "B", "C"])
            .with_page_budget(4)
            .with_pagination(token.take());
        let page = scanner.scan(&request).await.unwrap();
        for entity in ["A", "B", "C"] {
            assert!(page.entity(entity).unwrap().items().len() <= 4);
            delivered.extend(tags(&page, entity));
        }
        match page.pagination {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    let unique: BTreeSet<&String> = delivered.iter().collect();
    assert_eq!(unique.len(), delivered.len(), "an item was delivered twice");
    assert_eq!(delivered.len(), (3 + 1 + 4) * 7);
}

#[tokio::test]
async fn exhausted_entity_leaves_token_and_replays_empty() {
    let store = two_by_two().with_entity("E2", vec![vec![series("Gold", "only")]]);
    let scanner = scanner(store);
    let request = BulkRequest::new(["E1", "E2"]).with_page_budget(1);

    let first = scanner.scan(&request).await.unwrap();
    assert_eq!(tags(&first, "E2"), vec!["only"]);
    let token = first.pagination.unwrap();
    assert!(token.group("E2").is_none());
    assert!(token.group("E1").is_some());

    let second = scanner
        .scan(&request.with_pagination(Some(token)))
        .await
        .unwrap();
    assert!(second.entity("E2").unwrap().outcome.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_entity_is_empty_not_an_error() {
    let page = scanner(two_by_two())
        .scan(&BulkRequest::new(["nowhere"]))
        .await
        .unwrap();
    assert!(page.entity("nowhere").unwrap().outcome.is_ok());
    assert!(page.pagination.is_none());
}

#[tokio::test]
async fn zero_partition_entity_is_immediately_exhausted() {
    let store = MemoryStore::new(2).with_entity("empty", Vec::new());
    let page = scanner(store).scan(&BulkRequest::new(["empty"])).await.unwrap();
    assert!(page.entity("empty").unwrap().items().is_empty());
    assert!(!page.has_more());
}

#[tokio::test]
async fn unflagged_full_final_page_ends_on_next_call() {
    let mut store = MemoryStore::new(2).with_entity("E", vec![vec![series("Gold", "a"), series("Gold", "b")]]);
    store.flag_full_final_page = false;
    let scanner = scanner(store);
    let request = BulkRequest::new(["E"]).with_page_budget(10);

    let first = scanner.scan(&request).await.unwrap();
    assert_eq!(tags(&first, "E"), vec!["a", "b"]);
    let token = first.pagination.expect("partition still open");

    let second = scanner
        .scan(&request.with_pagination(Some(token)))
        .await
        .unwrap();
    assert!(tags(&second, "E").is_empty());
    assert!(second.pagination.is_none());
}

#[tokio::test]
async fn short_page_ends_partition_without_end_flag() {
    let store = ShortPagesOnly {
        inner: MemoryStore::new(2).with_entity(
            "E",
            vec![vec![series("Gold", "a"), series("Gold", "b"), series("Gold", "c")]],
        ),
        fetches: AtomicUsize::new(0),
    };
    let store = Arc::new(store);
    let scanner = MergeScanner::new(Arc::clone(&store), engine(), &settings(4));
    let request = BulkRequest::new(["E"]).with_page_budget(10);

    let mut delivered = Vec::new();
    let mut pagination = None;
    let mut calls = 0;
    loop {
        calls += 1;
        assert!(calls <= 3, "partition never became terminal");
        let page = scanner
            .scan(&request.clone().with_pagination(pagination.take()))
            .await
            .unwrap();
        delivered.extend(tags(&page, "E"));
        match page.pagination {
            Some(next) => pagination = Some(next),
            None => break,
        }
    }

    assert_eq!(delivered, vec!["a", "b", "c"]);
    // Page 0 full and open, then page 1 short: two calls, no wasted rollovers.
    assert_eq!(calls, 2);
    assert!(store.fetches.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn wire_token_resumes_a_scan() {
    let scanner = scanner(two_by_two());
    let first = scanner
        .scan(&BulkRequest::new(["E1"]).with_page_budget(2))
        .await
        .unwrap();
    let wire = encode_token(first.pagination.as_ref().unwrap()).unwrap();

    let resumed = BulkRequest::new(["E1"])
        .with_page_budget(2)
        .with_pagination(Some(decode_token(&wire).unwrap()));
    let second = scanner.scan(&resumed).await.unwrap();
    assert_eq!(tags(&first, "E1"), vec!["g1", "g2"]);
    assert_eq!(tags(&second, "E1"), vec!["s1", "s2"]);
}

// =============================================================================
// FAILURE ISOLATION
// =============================================================================

#[tokio::test]
async fn unavailable_partition_fails_only_its_entity() {
    let store = two_by_two()
        .with_entity("E2", vec![vec![series("Gold", "ok")]])
        .with_failure("E1", Some(1));
    let page = scanner(store)
        .scan(&BulkRequest::new(["E1", "E2"]))
        .await
        .unwrap();

    assert!(matches!(
        page.entity("E1").unwrap().outcome,
        Err(MeridianError::Unavailable(_))
    ));
    assert_eq!(tags(&page, "E2"), vec!["ok"]);

    // E1 keeps its incoming (fresh) state so a retry starts from scratch.
    let token = page.pagination.unwrap();
    assert_eq!(token.group("E1"), Some(&CursorGroup::pending("E1")));

    let retry = scanner(two_by_two())
        .scan(&BulkRequest::new(["E1", "E2"]).with_pagination(Some(token)))
        .await
        .unwrap();
    assert_eq!(tags(&retry, "E1"), vec!["g1", "g2", "s1", "s2"]);
    assert!(retry.entity("E2").unwrap().items().is_empty());
}

#[tokio::test]
async fn failed_entity_carries_its_cursors_forward() {
    let healthy = scanner(two_by_two());
    let request = BulkRequest::new(["E1"]).with_page_budget(1);
    let first = healthy.scan(&request).await.unwrap();
    let token = first.pagination.unwrap();

    let broken = scanner(two_by_two().with_failure("E1", Some(0)));
    let failed = broken
        .scan(&request.clone().with_pagination(Some(token.clone())))
        .await
        .unwrap();
    assert!(failed.entity("E1").unwrap().outcome.is_err());
    assert_eq!(failed.pagination, Some(token));
}

#[tokio::test]
async fn listing_failure_keeps_entity_pending() {
    let store = two_by_two().with_failure("E1", None);
    let page = scanner(store).scan(&BulkRequest::new(["E1"])).await.unwrap();
    assert!(page.entity("E1").unwrap().outcome.is_err());
    assert!(page.pagination.unwrap().group("E1").unwrap().is_pending());
}

#[tokio::test]
async fn crashed_entity_task_fails_only_that_entity() {
    let store = PanicsOn {
        inner: two_by_two().with_entity("E2", vec![vec![series("Gold", "x")]]),
        doomed: "E1",
    };
    let scanner = MergeScanner::new(Arc::new(store), engine(), &settings(4));

    let page = scanner.scan(&BulkRequest::new(["E1", "E2"])).await.unwrap();
    assert!(matches!(
        page.entity("E1").unwrap().outcome,
        Err(MeridianError::Internal(_))
    ));
    assert_eq!(tags(&page, "E2"), vec!["x"]);
    let token = page.pagination.expect("E1 must stay resumable");
    assert!(token.group("E1").unwrap().is_pending());
    assert!(token.group("E2").is_none());
}

#[tokio::test]
async fn topology_mismatch_is_internal_for_that_entity() {
    let token = PaginationInfo {
        cursor_groups: vec![CursorGroup::fresh("E1", 3)],
    };
    let page = scanner(two_by_two())
        .scan(&BulkRequest::new(["E1"]).with_pagination(Some(token)))
        .await
        .unwrap();
    assert!(matches!(
        page.entity("E1").unwrap().outcome,
        Err(MeridianError::Internal(_))
    ));
}

#[tokio::test]
async fn malformed_request_fails_whole_call() {
    let s = scanner(two_by_two());

    let foreign = PaginationInfo {
        cursor_groups: vec![CursorGroup::fresh("other", 1)],
    };
    let result = s
        .scan(&BulkRequest::new(["E1"]).with_pagination(Some(foreign)))
        .await;
    assert!(matches!(result, Err(MeridianError::InvalidArgument(_))));

    let result = s.scan(&BulkRequest::new(["E1", "E1"])).await;
    assert!(matches!(result, Err(MeridianError::InvalidArgument(_))));

    let result = s.scan(&BulkRequest::new(["E1"]).with_page_budget(0)).await;
    assert!(matches!(result, Err(MeridianError::InvalidArgument(_))));
}

// =============================================================================
// RESOURCE BOUNDS
// =============================================================================

#[tokio::test]
async fn deadline_fails_without_token() {
    let store = Instrumented::new(two_by_two(), Duration::from_millis(500));
    let scanner = MergeScanner::new(Arc::new(store), engine(), &settings(8))
        .with_deadline(Some(Duration::from_millis(20)));

    let result = scanner.scan(&BulkRequest::new(["E1"])).await;
    assert!(matches!(result, Err(MeridianError::DeadlineExceeded(20))));
}

#[tokio::test]
async fn store_calls_respect_concurrency_limit() {
    let partitions = (0..6)
        .map(|p| vec![series("Gold", &format!("p{p}"))])
        .collect();
    let store = Arc::new(Instrumented::new(
        MemoryStore::new(4).with_entity("wide", partitions),
        Duration::from_millis(10),
    ));
    let scanner = MergeScanner::new(Arc::clone(&store), engine(), &settings(2));

    let page = scanner.scan(&BulkRequest::new(["wide"])).await.unwrap();
    assert_eq!(page.entity("wide").unwrap().items().len(), 6);
    let peak = store.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency {peak}");
}
