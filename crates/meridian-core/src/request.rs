//! # Bulk Request Envelope
//!
//! Validation of bulk requests and the shape of their responses.
//!
//! A malformed entity list, budget or token fails the whole call before any
//! store access. Per-entity failures after that point are reported in the
//! entity's `EntityPage` and never affect other entities.

use crate::cursor::{CursorGroup, PaginationInfo};
use crate::primitives::{DEFAULT_PAGE_BUDGET, MAX_BULK_ENTITIES, MAX_ENTITY_KEY_LENGTH, MAX_PAGE_BUDGET};
use crate::MeridianError;
use std::collections::BTreeSet;

// =============================================================================
// VALIDATION
// =============================================================================

/// Check an entity list: non-empty, bounded, unique, well-formed keys.
pub fn validate_entities(entities: &[String]) -> Result<(), MeridianError> {
    if entities.is_empty() {
        return Err(MeridianError::InvalidArgument(
            "entity list is empty".to_string(),
        ));
    }
    if entities.len() > MAX_BULK_ENTITIES {
        return Err(MeridianError::InvalidArgument(format!(
            "{} entities requested, maximum is {}",
            entities.len(),
            MAX_BULK_ENTITIES
        )));
    }

    let mut seen = BTreeSet::new();
    for entity in entities {
        validate_entity_key(entity)?;
        if !seen.insert(entity.as_str()) {
            return Err(MeridianError::InvalidArgument(format!(
                "entity '{}' is requested more than once",
                entity
            )));
        }
    }
    Ok(())
}

fn validate_entity_key(entity: &str) -> Result<(), MeridianError> {
    if entity.is_empty() {
        return Err(MeridianError::InvalidArgument(
            "entity key is empty".to_string(),
        ));
    }
    if entity.len() > MAX_ENTITY_KEY_LENGTH {
        return Err(MeridianError::InvalidArgument(format!(
            "entity key of {} bytes exceeds maximum {}",
            entity.len(),
            MAX_ENTITY_KEY_LENGTH
        )));
    }
    if entity.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MeridianError::InvalidArgument(format!(
            "entity key {:?} contains whitespace or control characters",
            entity
        )));
    }
    Ok(())
}

/// Check a per-entity page budget.
pub fn validate_budget(budget: usize) -> Result<(), MeridianError> {
    if budget == 0 || budget > MAX_PAGE_BUDGET {
        return Err(MeridianError::InvalidArgument(format!(
            "page budget {} outside 1..={}",
            budget, MAX_PAGE_BUDGET
        )));
    }
    Ok(())
}

// =============================================================================
// REQUEST
// =============================================================================

/// One bulk read: a list of entities and an optional continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRequest {
    pub entities: Vec<String>,
    /// Maximum number of items returned per entity.
    pub page_budget: usize,
    /// Continuation from a previous response; `None` starts fresh.
    pub pagination: Option<PaginationInfo>,
}

impl BulkRequest {
    /// A fresh request with the default page budget.
    #[must_use]
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            page_budget: DEFAULT_PAGE_BUDGET,
            pagination: None,
        }
    }

    #[must_use]
    pub fn with_page_budget(mut self, page_budget: usize) -> Self {
        self.page_budget = page_budget;
        self
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: Option<PaginationInfo>) -> Self {
        self.pagination = pagination;
        self
    }

    /// Validate everything that can be checked without the store.
    pub fn validate(&self) -> Result<(), MeridianError> {
        validate_entities(&self.entities)?;
        validate_budget(self.page_budget)?;
        if let Some(pagination) = &self.pagination {
            pagination.validate_for(&self.entities)?;
        }
        Ok(())
    }

    /// Starting cursor state per entity, in request order.
    ///
    /// `None` marks an entity the token reports as exhausted. Without a
    /// token every entity starts pending, so its partitions get listed.
    pub fn resume_groups(&self) -> Result<Vec<Option<CursorGroup>>, MeridianError> {
        self.validate()?;
        let Some(pagination) = &self.pagination else {
            return Ok(self
                .entities
                .iter()
                .map(|e| Some(CursorGroup::pending(e.as_str())))
                .collect());
        };
        Ok(self
            .entities
            .iter()
            .map(|e| pagination.group(e).cloned())
            .collect())
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// The result of one entity within a bulk response.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPage<T> {
    pub entity: String,
    pub outcome: Result<Vec<T>, MeridianError>,
}

impl<T> EntityPage<T> {
    #[must_use]
    pub fn ok(entity: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            entity: entity.into(),
            outcome: Ok(items),
        }
    }

    #[must_use]
    pub fn failed(entity: impl Into<String>, error: MeridianError) -> Self {
        Self {
            entity: entity.into(),
            outcome: Err(error),
        }
    }

    /// Items delivered for the entity; empty when it failed.
    #[must_use]
    pub fn items(&self) -> &[T] {
        self.outcome.as_deref().unwrap_or_default()
    }
}

/// One page of a bulk read.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkPage<T> {
    /// One entry per requested entity, in request order.
    pub entities: Vec<EntityPage<T>>,
    /// Continuation token; `None` once every entity is exhausted.
    pub pagination: Option<PaginationInfo>,
}

impl<T> BulkPage<T> {
    /// Whether more pages may follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.pagination.is_some()
    }

    /// Look up the page of one entity.
    #[must_use]
    pub fn entity(&self, key: &str) -> Option<&EntityPage<T>> {
        self.entities.iter().find(|p| p.entity == key)
    }
}

// =============================================================================
// TESTS
// =============================================================================
