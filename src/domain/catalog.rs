//! Built-in service area. Deployments may replace it through `[catalog]` settings.

use super::{cache_key::normalize_locality, error::DomainError, types::ServiceCategory};

/// Localities served out of the box, in the order batch runs visit them.
pub const DEFAULT_LOCALITIES: &[&str] = &[
    "DFW",
    "Dallas",
    "Fort Worth",
    "Arlington",
    "Plano",
    "Irving",
    "Garland",
    "Frisco",
    "McKinney",
    "Grand Prairie",
    "Mesquite",
    "Denton",
    "Carrollton",
    "Richardson",
    "Lewisville",
    "Allen",
    "Flower Mound",
    "North Richland Hills",
    "Mansfield",
    "Rowlett",
    "Euless",
    "DeSoto",
    "Grapevine",
    "Bedford",
    "Cedar Hill",
    "Wylie",
    "Keller",
    "Coppell",
    "Rockwall",
    "Haltom City",
    "The Colony",
    "Burleson",
    "Hurst",
    "Little Elm",
    "Lancaster",
    "Southlake",
    "Duncanville",
    "Prosper",
    "Waxahachie",
    "Cleburne",
    "Colleyville",
    "Watauga",
    "Celina",
    "Forney",
    "Sachse",
    "Saginaw",
    "Farmers Branch",
    "Midlothian",
    "Benbrook",
    "Murphy",
    "Weatherford",
    "Anna",
    "Seagoville",
    "Balch Springs",
    "Addison",
    "Princeton",
    "Highland Village",
    "Terrell",
    "Melissa",
    "Royse City",
    "Crowley",
    "Forest Hill",
    "Red Oak",
    "Trophy Club",
    "Fate",
    "Azle",
    "White Settlement",
    "Glenn Heights",
    "Corinth",
    "Lake Dallas",
    "Richland Hills",
    "Kennedale",
    "Everman",
    "Hickory Creek",
    "Argyle",
    "Aubrey",
    "Sanger",
    "Krum",
    "Justin",
    "Northlake",
    "Roanoke",
    "Haslet",
    "Westlake",
    "Lucas",
    "Parker",
    "Fairview",
    "Heath",
    "Sunnyvale",
    "Hutchins",
    "Wilmer",
    "Ovilla",
    "Ennis",
    "Kaufman",
    "Crandall",
    "Lavon",
    "Nevada",
    "Van Alstyne",
    "Gunter",
    "Aledo",
    "Willow Park",
    "Hudson Oaks",
    "Joshua",
    "Keene",
    "Granbury",
];

/// One (locality, service) slot, the unit of generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPair {
    pub locality: String,
    pub service: ServiceCategory,
}

impl ContentPair {
    pub fn new(locality: impl Into<String>, service: ServiceCategory) -> Self {
        Self {
            locality: locality.into(),
            service,
        }
    }
}

/// Cross product in batch order: localities outer, services inner.
pub fn cross_product(localities: &[String], services: &[ServiceCategory]) -> Vec<ContentPair> {
    localities
        .iter()
        .flat_map(|locality| {
            services
                .iter()
                .map(move |service| ContentPair::new(locality.clone(), *service))
        })
        .collect()
}

/// Trim the configured localities and reject blanks or duplicates by normalized name.
pub fn validate_localities(localities: &[String]) -> Result<Vec<String>, DomainError> {
    let mut seen = std::collections::HashSet::new();
    let mut validated = Vec::with_capacity(localities.len());

    for locality in localities {
        let normalized = normalize_locality(locality)?;
        if !seen.insert(normalized) {
            return Err(DomainError::validation(format!(
                "locality `{}` is listed more than once",
                locality.trim()
            )));
        }
        validated.push(locality.trim().to_string());
    }

    Ok(validated)
}

pub fn default_localities() -> Vec<String> {
    DEFAULT_LOCALITIES.iter().map(|name| name.to_string()).collect()
}
