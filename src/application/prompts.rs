//! Prompt templates keyed by [`ServiceCategory::prompt_key`].
//!
//! Templates use `{locality}` and `{service}` placeholders. Rendering happens
//! here, before a request reaches the generator.

use std::collections::HashMap;

use crate::domain::types::ServiceCategory;

const SHARED_GUIDANCE: &str = "Write in Markdown with two or three `##` sections and short paragraphs. \
Keep it between 250 and 400 words, speak to homeowners and property managers, \
mention {locality} naturally, and end with an invitation to request a free estimate. \
Do not invent prices, licenses, phone numbers or company names.";

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<&'static str, String>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        let templates = ServiceCategory::ALL
            .into_iter()
            .map(|service| (service.prompt_key(), default_template(service)))
            .collect();
        Self { templates }
    }

    /// Replace the template for one service, e.g. from a deployment override.
    pub fn with_template(mut self, service: ServiceCategory, template: impl Into<String>) -> Self {
        self.templates.insert(service.prompt_key(), template.into());
        self
    }

    pub fn template_for(&self, service: ServiceCategory) -> &str {
        self.templates
            .get(service.prompt_key())
            .map(String::as_str)
            .unwrap_or(SHARED_GUIDANCE)
    }

    pub fn render_for(&self, locality: &str, service: ServiceCategory) -> String {
        render(self.template_for(service), locality, service)
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render(template: &str, locality: &str, service: ServiceCategory) -> String {
    template
        .replace("{locality}", locality.trim())
        .replace("{service}", service.display_label())
}

fn default_template(service: ServiceCategory) -> String {
    let focus = match service {
        ServiceCategory::Residential => {
            "Write landing-page copy for residential fence installation in {locality}. \
             Cover privacy, wood, vinyl and ornamental iron options, HOA considerations and \
             how local soil and weather affect post setting."
        }
        ServiceCategory::Commercial => {
            "Write landing-page copy for {service} in {locality}. \
             Cover perimeter security, chain link and ornamental steel, project scheduling \
             around business hours and code compliance."
        }
        ServiceCategory::AccessControl => {
            "Write landing-page copy for {service} in {locality}. \
             Cover keypads, card readers, intercoms and integration with existing gates \
             for residential communities and commercial properties."
        }
        ServiceCategory::AutomaticGates => {
            "Write landing-page copy for {service} in {locality}. \
             Cover slide and swing operators, safety sensors, remote access and routine \
             maintenance."
        }
        ServiceCategory::FenceRepair => {
            "Write landing-page copy for {service} in {locality}. \
             Cover storm damage, leaning posts, rotted pickets and gate realignment, and \
             when repair beats replacement."
        }
    };
    format!("{focus} {SHARED_GUIDANCE}")
}
