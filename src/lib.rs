//! Location-aware marketing copy: generated once per (locality, service),
//! cached with a long TTL and served with static fallbacks.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
