//! # Merge-Scan Driver
//!
//! Runs one bulk read against a `PageSource`.
//!
//! Per entity, in parallel with every other entity:
//! 1. list the entity's partitions (`NotFound` means none)
//! 2. fetch one page from every live partition cursor, in parallel
//! 3. wait for all of them, then rank-merge and advance the cursors
//!
//! A failure inside one entity fails only that entity's page; its incoming
//! cursor state is carried into the outgoing token unchanged, so a retry
//! loses nothing. Store calls share one semaphore, so the number of calls
//! in flight never exceeds the configured limit. Dropping the scan future
//! aborts every task it spawned.

use crate::config::ScanSettings;
use crate::store::PageSource;
use meridian_core::{
    BulkPage, BulkRequest, Cursor, CursorGroup, EntityPage, MeridianError, PaginationInfo,
    PartitionRead, RankingEngine, RawPage, merge_into_group,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Shared by every task of a scanner.
struct ScanContext<S> {
    store: Arc<S>,
    engine: RankingEngine,
    permits: Semaphore,
}

/// What one entity task hands back.
struct EntityScan<T> {
    page: EntityPage<T>,
    /// Cursor state for the outgoing token; `None` once exhausted.
    next: Option<CursorGroup>,
}

// =============================================================================
// SCANNER
// =============================================================================

/// Concurrent, deadline-bounded bulk reader.
pub struct MergeScanner<S> {
    context: Arc<ScanContext<S>>,
    deadline: Option<Duration>,
}

impl<S> Clone for MergeScanner<S> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            deadline: self.deadline,
        }
    }
}

impl<S: PageSource> MergeScanner<S> {
    /// Create a scanner over a store.
    #[must_use]
    pub fn new(store: Arc<S>, engine: RankingEngine, settings: &ScanSettings) -> Self {
        Self {
            context: Arc::new(ScanContext {
                store,
                engine,
                permits: Semaphore::new(settings.concurrency_limit.max(1)),
            }),
            deadline: settings.deadline(),
        }
    }

    /// Replace the whole-call deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run one bulk read.
    ///
    /// Fails as a whole only for a malformed request, a malformed token, or
    /// an elapsed deadline. No token is returned in those cases.
    pub async fn scan(&self, request: &BulkRequest) -> Result<BulkPage<S::Item>, MeridianError> {
        let groups = request.resume_groups()?;
        tracing::debug!(
            "Scanning {} entities (budget {}, resumed: {})",
            request.entities.len(),
            request.page_budget,
            request.pagination.is_some()
        );

        let page = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.scan_entities(request, groups))
                .await
                .map_err(|_| {
                    tracing::warn!("Bulk scan exceeded its {:?} deadline", deadline);
                    MeridianError::DeadlineExceeded(deadline.as_millis() as u64)
                })??,
            None => self.scan_entities(request, groups).await?,
        };

        let failed = page.entities.iter().filter(|p| p.outcome.is_err()).count();
        tracing::info!(
            "Bulk scan finished: {} entities, {} failed, more pages: {}",
            page.entities.len(),
            failed,
            page.has_more()
        );
        Ok(page)
    }

    async fn scan_entities(
        &self,
        request: &BulkRequest,
        groups: Vec<Option<CursorGroup>>,
    ) -> Result<BulkPage<S::Item>, MeridianError> {
        // A task that dies fails only its own entity, keeping its incoming state.
        let carried = groups.clone();
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(request.entities.len());
        for (index, (entity, group)) in request.entities.iter().zip(groups).enumerate() {
            let context = Arc::clone(&self.context);
            let entity = entity.clone();
            let budget = request.page_budget;
            let handle = tasks.spawn(scan_entity(context, entity, group, budget));
            owners.insert(handle.id(), index);
        }

        let mut results: Vec<Option<EntityScan<S::Item>>> =
            std::iter::repeat_with(|| None).take(request.entities.len()).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, scan)) => {
                    if let Some(&index) = owners.get(&id) {
                        results[index] = Some(scan);
                    }
                }
                Err(e) => {
                    let Some(&index) = owners.get(&e.id()) else {
                        continue;
                    };
                    let entity = request.entities[index].clone();
                    tracing::warn!("Entity task for '{}' failed: {}", entity, e);
                    results[index] = Some(EntityScan {
                        page: EntityPage::failed(
                            entity,
                            MeridianError::Internal(format!("entity task failed: {}", e)),
                        ),
                        next: carried[index].clone(),
                    });
                }
            }
        }

        let mut entities = Vec::with_capacity(results.len());
        let mut cursor_groups = Vec::new();
        for (entity, result) in request.entities.iter().zip(results) {
            let Some(scan) = result else {
                return Err(MeridianError::Internal(format!(
                    "no result for entity '{}'",
                    entity
                )));
            };
            entities.push(scan.page);
            cursor_groups.extend(scan.next);
        }

        Ok(BulkPage {
            entities,
            pagination: PaginationInfo { cursor_groups }.into_continuation(),
        })
    }
}

// =============================================================================
// PER-ENTITY WORK
// =============================================================================

async fn scan_entity<S: PageSource>(
    context: Arc<ScanContext<S>>,
    entity: String,
    group: Option<CursorGroup>,
    budget: usize,
) -> EntityScan<S::Item> {
    let Some(group) = group else {
        // Exhausted on an earlier call.
        return EntityScan {
            page: EntityPage::ok(entity, Vec::new()),
            next: None,
        };
    };

    match advance_entity(&context, &entity, group.clone(), budget).await {
        Ok((items, next)) => EntityScan {
            page: EntityPage::ok(entity, items),
            next,
        },
        Err(e) => {
            tracing::warn!(
                "Entity '{}' failed ({}, retryable: {}): {}",
                entity,
                e.code(),
                e.is_retryable(),
                e
            );
            EntityScan {
                page: EntityPage::failed(entity, e),
                next: Some(group),
            }
        }
    }
}

/// Fetch, merge and advance one entity. Returns the merged items and the
/// cursor state to carry forward.
async fn advance_entity<S: PageSource>(
    context: &Arc<ScanContext<S>>,
    entity: &str,
    group: CursorGroup,
    budget: usize,
) -> Result<(Vec<S::Item>, Option<CursorGroup>), MeridianError> {
    let partition_count = list_partitions(context, entity).await?;
    if partition_count == 0 && group.is_pending() {
        return Ok((Vec::new(), None));
    }

    let mut group = if group.is_pending() {
        CursorGroup::fresh(entity, partition_count)
    } else {
        group.check_topology(partition_count)?;
        group
    };

    let mut fetches = JoinSet::new();
    for cursor in group.live_cursors().copied() {
        let context = Arc::clone(context);
        let entity = entity.to_string();
        fetches.spawn(async move { read_partition(&context, &entity, cursor).await });
    }

    // Barrier: every fetch completes before anything is merged.
    let mut reads = Vec::with_capacity(fetches.len());
    let mut first_error = None;
    while let Some(joined) = fetches.join_next().await {
        let read = joined
            .map_err(|e| MeridianError::Internal(format!("partition task failed: {}", e)))
            .and_then(|r| r);
        match read {
            Ok(read) => reads.push(read),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let items = merge_into_group(&context.engine, &mut group, reads, budget)?;
    let next = (!group.is_exhausted()).then_some(group);
    Ok((items, next))
}

async fn list_partitions<S: PageSource>(
    context: &ScanContext<S>,
    entity: &str,
) -> Result<u32, MeridianError> {
    let _permit = context
        .permits
        .acquire()
        .await
        .map_err(|_| MeridianError::Internal("scan permits closed".to_string()))?;
    match context.store.partitions(entity).await {
        Err(MeridianError::NotFound(_)) => {
            tracing::debug!("Entity '{}' not found; treating as empty", entity);
            Ok(0)
        }
        other => other,
    }
}

/// Read one partition at its cursor, rolling over one page boundary.
async fn read_partition<S: PageSource>(
    context: &ScanContext<S>,
    entity: &str,
    cursor: Cursor,
) -> Result<PartitionRead<S::Item>, MeridianError> {
    let read = PartitionRead::new(cursor, fetch_page(context, entity, cursor).await?);
    if !read.is_page_boundary() {
        return Ok(read);
    }

    let mut next = cursor;
    next.next_page()?;
    tracing::debug!(
        "Partition {} of '{}' rolled over to page {}",
        cursor.partition,
        entity,
        next.page
    );
    let page = fetch_page(context, entity, next).await?;
    Ok(PartitionRead::new(next, page))
}

async fn fetch_page<S: PageSource>(
    context: &ScanContext<S>,
    entity: &str,
    cursor: Cursor,
) -> Result<RawPage<S::Item>, MeridianError> {
    let _permit = context
        .permits
        .acquire()
        .await
        .map_err(|_| MeridianError::Internal("scan permits closed".to_string()))?;
    context
        .store
        .fetch(entity, cursor.partition, cursor.page, cursor.item)
        .await
}
