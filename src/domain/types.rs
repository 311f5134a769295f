//! Service categories offered on the site.
//!
//! Every place that needs a human label, a cache-key fragment or a prompt
//! lookup goes through [`ServiceCategory`], so renaming a label cannot shift
//! the cache keys already persisted.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Residential,
    Commercial,
    AccessControl,
    AutomaticGates,
    FenceRepair,
}

impl ServiceCategory {
    /// All categories in declaration order. Batch runs iterate in this order.
    pub const ALL: [ServiceCategory; 5] = [
        ServiceCategory::Residential,
        ServiceCategory::Commercial,
        ServiceCategory::AccessControl,
        ServiceCategory::AutomaticGates,
        ServiceCategory::FenceRepair,
    ];

    /// The category served when a page does not name one.
    pub const DEFAULT: ServiceCategory = ServiceCategory::Residential;

    pub fn display_label(self) -> &'static str {
        match self {
            ServiceCategory::Residential => "Residential Fencing",
            ServiceCategory::Commercial => "Commercial Fencing",
            ServiceCategory::AccessControl => "Access Control Systems",
            ServiceCategory::AutomaticGates => "Automatic Gates",
            ServiceCategory::FenceRepair => "Fence Repair",
        }
    }

    /// Fragment embedded in cache keys. Persisted data depends on these values.
    pub fn key_slug(self) -> &'static str {
        match self {
            ServiceCategory::Residential => "residential-fencing",
            ServiceCategory::Commercial => "commercial-fencing",
            ServiceCategory::AccessControl => "access-control",
            ServiceCategory::AutomaticGates => "automatic-gates",
            ServiceCategory::FenceRepair => "fence-repair",
        }
    }

    pub fn prompt_key(self) -> &'static str {
        match self {
            ServiceCategory::Residential => "residential",
            ServiceCategory::Commercial => "commercial",
            ServiceCategory::AccessControl => "access_control",
            ServiceCategory::AutomaticGates => "automatic_gates",
            ServiceCategory::FenceRepair => "fence_repair",
        }
    }

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

impl FromStr for ServiceCategory {
    type Err = DomainError;

    /// Accepts the key slug, the prompt key or the display label, ignoring case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| {
                needle.eq_ignore_ascii_case(category.key_slug())
                    || needle.eq_ignore_ascii_case(category.prompt_key())
                    || needle.eq_ignore_ascii_case(category.display_label())
            })
            .ok_or_else(|| DomainError::validation(format!("unknown service category `{value}`")))
    }
}
