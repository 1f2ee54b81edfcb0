//! # Token Wire Form
//!
//! Pagination tokens travel as URL-safe, unpadded base64 of the binary
//! token format. Callers treat the string as opaque.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use meridian_core::primitives::MAX_TOKEN_SIZE;
use meridian_core::{MeridianError, PaginationInfo, token_from_bytes, token_to_bytes};

/// Longest wire token that can decode to at most `MAX_TOKEN_SIZE` bytes.
const MAX_WIRE_TOKEN_LENGTH: usize = MAX_TOKEN_SIZE.saturating_mul(4) / 3 + 4;

/// Encode a continuation as a wire token.
pub fn encode_token(info: &PaginationInfo) -> Result<String, MeridianError> {
    Ok(URL_SAFE_NO_PAD.encode(token_to_bytes(info)?))
}

/// Decode a wire token. Any malformation is `InvalidArgument`.
pub fn decode_token(token: &str) -> Result<PaginationInfo, MeridianError> {
    let token = token.trim();
    // 4 base64 characters per 3 bytes.
    if token.len() > MAX_WIRE_TOKEN_LENGTH {
        return Err(MeridianError::InvalidArgument(format!(
            "pagination token of {} characters is too long",
            token.len()
        )));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| MeridianError::InvalidArgument(format!("pagination token is not base64: {}", e)))?;
    token_from_bytes(&bytes)
}

/// Decode an optional wire token; empty strings mean "no token".
pub fn decode_optional(token: Option<&str>) -> Result<Option<PaginationInfo>, MeridianError> {
    match token.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => decode_token(t).map(Some),
    }
}

// =============================================================================
// TESTS
// =============================================================================
