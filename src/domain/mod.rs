//! Domain layer types and invariants.

pub mod cache_key;
pub mod catalog;
pub mod entities;
pub mod error;
pub mod fallback;
pub mod types;
