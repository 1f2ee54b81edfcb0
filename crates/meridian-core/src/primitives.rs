//! # Runtime Primitives
//!
//! Hardcoded constants for the Meridian CORE.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Anything that an operator may reasonably tune lives in the app config
//! instead; the limits here bound what the config may ask for.

/// Score assigned to any source that has no entry in the ranking table.
///
/// A preferred source gets a score below `BASE_RANK`, a disfavoured one a
/// score above it.
pub const BASE_RANK: i32 = 100;

/// Wildcard value for the measurement method and observation period of a
/// `RankKey`.
pub const WILDCARD: &str = "*";

/// Item index stored in a cursor once its partition has been fully read.
///
/// `u32::MAX` keeps the terminal state ordered after every real position, so
/// cursor positions stay monotonic.
pub const TERMINAL_ITEM: u32 = u32::MAX;

/// Bucket key for relation values that carry no type (plain literals).
pub const UNTYPED_BUCKET: &str = "_";

// =============================================================================
// TOKEN FORMAT
// =============================================================================

/// Magic bytes for the binary pagination token header.
///
/// - Token = Magic ("MRDN") + Version (u8) + Checksum (8 bytes) + payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MRDN";

/// Current pagination token format version.
///
/// Increment this when making breaking changes to the token layout.
pub const FORMAT_VERSION: u8 = 1;

/// Number of BLAKE3 digest bytes kept in the token header.
pub const TOKEN_CHECKSUM_LEN: usize = 8;

/// Maximum size of a binary pagination token.
///
/// Checked before deserialization so a forged token cannot force a large
/// allocation.
pub const MAX_TOKEN_SIZE: usize = 1024 * 1024;

// =============================================================================
// REQUEST LIMITS
// =============================================================================

/// Maximum number of entities in one bulk request.
pub const MAX_BULK_ENTITIES: usize = 10_000;

/// Maximum byte length of an entity key.
pub const MAX_ENTITY_KEY_LENGTH: usize = 512;

/// Upper bound for the per-entity page budget.
pub const MAX_PAGE_BUDGET: usize = 100_000;

/// Page budget used when a request does not carry one.
pub const DEFAULT_PAGE_BUDGET: usize = 500;
