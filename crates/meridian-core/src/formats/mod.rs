//! # Formats
//!
//! Binary encodings owned by the CORE. Transport encodings (base64 and the
//! like) live in the app layer.

pub mod token;

pub use token::{TokenHeader, token_from_bytes, token_to_bytes};
