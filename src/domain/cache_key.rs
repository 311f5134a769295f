//! Deterministic cache keys for (locality, service) content slots.
//!
//! A locality is lowercased and its whitespace runs collapse into single
//! hyphens. Non-default services append `-{service-slug}-dynamic`; the
//! default service appends only `-dynamic`, so `("DFW", Residential)` maps
//! to `dfw-dynamic` and `("Plano", Commercial)` to
//! `plano-commercial-fencing-dynamic`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{error::DomainError, types::ServiceCategory};

const KEY_SUFFIX: &str = "dynamic";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(locality: &str, service: ServiceCategory) -> Result<Self, DomainError> {
        let locality = normalize_locality(locality)?;
        let key = if service.is_default() {
            format!("{locality}-{KEY_SUFFIX}")
        } else {
            format!("{locality}-{}-{KEY_SUFFIX}", service.key_slug())
        };
        Ok(Self(key))
    }

    /// Wrap a key read back from storage or supplied by an operator.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase the locality and join its words with hyphens.
pub fn normalize_locality(locality: &str) -> Result<String, DomainError> {
    let words: Vec<String> = locality
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();

    if words.is_empty() {
        return Err(DomainError::validation("locality must not be empty"));
    }

    Ok(words.join("-"))
}
