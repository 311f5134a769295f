//! Static copy served when generation is unavailable.

use super::types::ServiceCategory;

/// Pre-written markdown for a pair. Always non-empty.
pub fn fallback_content(locality: &str, service: ServiceCategory) -> String {
    let locality = locality.trim();
    let label = service.display_label();
    let pitch = match service {
        ServiceCategory::Residential => {
            "From privacy fences to decorative iron, local crews build fences that fit your yard, your HOA and your budget."
        }
        ServiceCategory::Commercial => {
            "Perimeter security, chain link and ornamental steel for offices, warehouses and retail sites, installed on your schedule."
        }
        ServiceCategory::AccessControl => {
            "Keypads, card readers and intercom entry that keep your property secure without slowing down the people who belong there."
        }
        ServiceCategory::AutomaticGates => {
            "Slide and swing gate operators, installed and tuned for smooth, reliable daily use."
        }
        ServiceCategory::FenceRepair => {
            "Leaning posts, storm damage and broken pickets fixed fast, often the same week you call."
        }
    };

    format!(
        "## {label} in {locality}\n\n\
         {pitch}\n\n\
         We connect {locality} property owners with vetted, insured fence professionals. \
         Tell us about your project and get a free, no-obligation estimate."
    )
}
