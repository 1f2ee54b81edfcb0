//! # Pagination Token Format
//!
//! Binary serialization for `PaginationInfo`.
//!
//! Format: Header (13 bytes) + postcard-serialized cursor groups.
//! - 4 bytes: Magic ("MRDN")
//! - 1 byte: Version
//! - 8 bytes: leading bytes of the BLAKE3 digest of the payload
//!
//! Tokens come back from callers, so every check here runs before the
//! payload is parsed:
//! - total size is bounded by `MAX_TOKEN_SIZE`
//! - header magic and version must match
//! - the payload must match its checksum
//!
//! Every failure is an `InvalidArgument`: a bad token is a caller error.

use crate::cursor::PaginationInfo;
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_TOKEN_SIZE, TOKEN_CHECKSUM_LEN};
use crate::MeridianError;

/// Header size: magic + version + checksum.
const HEADER_SIZE: usize = 4 + 1 + TOKEN_CHECKSUM_LEN;

// =============================================================================
// HEADER
// =============================================================================

/// The header that precedes every token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub checksum: [u8; TOKEN_CHECKSUM_LEN],
}

impl TokenHeader {
    /// Header for a payload at the current format version.
    #[must_use]
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
            checksum: checksum(payload),
        }
    }

    /// Check magic and version.
    pub fn validate(&self) -> Result<(), MeridianError> {
        if &self.magic != MAGIC_BYTES {
            return Err(MeridianError::InvalidArgument(
                "pagination token has invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(MeridianError::InvalidArgument(format!(
                "unsupported pagination token version {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Check the payload against the stored checksum.
    pub fn verify(&self, payload: &[u8]) -> Result<(), MeridianError> {
        if checksum(payload) != self.checksum {
            return Err(MeridianError::InvalidArgument(
                "pagination token checksum mismatch".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5..].copy_from_slice(&self.checksum);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeridianError> {
        if bytes.len() < HEADER_SIZE {
            return Err(MeridianError::InvalidArgument(format!(
                "pagination token too short: {} bytes, header needs {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let mut checksum = [0u8; TOKEN_CHECKSUM_LEN];
        checksum.copy_from_slice(&bytes[5..HEADER_SIZE]);
        Ok(Self {
            magic,
            version: bytes[4],
            checksum,
        })
    }
}

fn checksum(payload: &[u8]) -> [u8; TOKEN_CHECKSUM_LEN] {
    let digest = blake3::hash(payload);
    let mut out = [0u8; TOKEN_CHECKSUM_LEN];
    out.copy_from_slice(&digest.as_bytes()[..TOKEN_CHECKSUM_LEN]);
    out
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a token to bytes (header + payload).
pub fn token_to_bytes(info: &PaginationInfo) -> Result<Vec<u8>, MeridianError> {
    let payload =
        postcard::to_stdvec(info).map_err(|e| MeridianError::SerializationError(e.to_string()))?;
    let header = TokenHeader::for_payload(&payload);

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a caller-supplied token.
///
/// Structural checks against the request (`PaginationInfo::validate_for`)
/// are left to the caller, which knows the entity list.
pub fn token_from_bytes(bytes: &[u8]) -> Result<PaginationInfo, MeridianError> {
    if bytes.len() > MAX_TOKEN_SIZE {
        return Err(MeridianError::InvalidArgument(format!(
            "pagination token of {} bytes exceeds maximum {} bytes",
            bytes.len(),
            MAX_TOKEN_SIZE
        )));
    }

    let header = TokenHeader::from_bytes(bytes)?;
    header.validate()?;
    let payload = &bytes[HEADER_SIZE..];
    header.verify(payload)?;

    let (info, rest): (PaginationInfo, &[u8]) = postcard::take_from_bytes(payload)
        .map_err(|e| MeridianError::InvalidArgument(format!("malformed pagination token: {}", e)))?;
    if !rest.is_empty() {
        return Err(MeridianError::InvalidArgument(format!(
            "pagination token has {} trailing bytes",
            rest.len()
        )));
    }
    Ok(info)
}

// =============================================================================
// TESTS
// =============================================================================
