//! # meridian
//!
//! Async driver around `meridian-core`: concurrent merge-scans over a
//! partitioned store, configuration, the token wire form and the CLI.

pub mod cli;
pub mod config;
pub mod scan;
pub mod store;
pub mod token;

pub use config::Config;
pub use scan::MergeScanner;
pub use store::{FailurePoint, MemoryStore, PageSource};
pub use token::{decode_optional, decode_token, encode_token};
