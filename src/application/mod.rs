//! Application services: caching, generation and batch orchestration.

pub mod batch;
pub mod cache_store;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod prompts;
pub mod repos;
pub mod retry;
