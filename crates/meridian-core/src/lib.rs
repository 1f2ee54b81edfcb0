//! # meridian-core
//!
//! The deterministic query-serving core for Meridian - THE LOGIC.
//!
//! Meridian answers bulk reads against a statistical knowledge graph whose
//! store is split into partitions ("import groups"). This crate holds the
//! pieces that must behave identically on every replica:
//! - source ranking (`ranking`)
//! - resumable cursor state (`cursor`) and its binary token form (`formats`)
//! - rank merge with exact cursor advancement (`merge`)
//! - per-bucket capping of relation results (`fanout`)
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never fetches: raw pages are handed in by the app layer
//! - The ranking table is injected, never global state

// =============================================================================
// MODULES
// =============================================================================

pub mod cursor;
pub mod fanout;
pub mod formats;
pub mod merge;
pub mod primitives;
pub mod ranking;
pub mod request;
pub mod triples;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{MeridianError, SourceDescriptor, SourceSeries};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use cursor::{Cursor, CursorGroup, PaginationInfo};
pub use fanout::FanOutFilter;
pub use merge::{PartitionRead, RawPage, merge_into_group};
pub use ranking::{RankEntry, RankKey, Ranked, RankingEngine, RankingTable};
pub use request::{BulkPage, BulkRequest, EntityPage, validate_budget, validate_entities};
pub use triples::{Direction, EntityInfo, EntityInfoCollection, Triple, Triples};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{TokenHeader, token_from_bytes, token_to_bytes};
