use std::collections::BTreeMap;

use facet::Facet;

use crate::SourceLocation;

/// Longest text excerpt kept for an inspected element, in characters.
pub const TEXT_EXCERPT_MAX_CHARS: usize = 100;

/// Everything the inspector knows about one clicked element.
///
/// Built fresh per click and handed to the agent together with the user's
/// request; never cached past the inspection round-trip.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub location: SourceLocation,
    pub component_name: String,
    pub element_tag: String,
    pub text_excerpt: String,
    /// Element attributes minus `class`, `id` and `data-*`.
    pub attributes: BTreeMap<String, String>,
    pub computed_style: BTreeMap<String, String>,
    /// API endpoints referenced by the owning component's file, when known.
    #[facet(skip_unless_truthy)]
    pub apis: Vec<String>,
}

/// Truncates trimmed element text to [`TEXT_EXCERPT_MAX_CHARS`] characters.
pub fn text_excerpt(text: &str) -> String {
    text.trim().chars().take(TEXT_EXCERPT_MAX_CHARS).collect()
}

/// One finished inspection: the element plus what the user asked for.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct InspectionRecord {
    pub descriptor: ElementDescriptor,
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_is_trimmed_and_capped() {
        assert_eq!(text_excerpt("   Go  \n"), "Go");
        let long = "é".repeat(150);
        assert_eq!(text_excerpt(&long).chars().count(), TEXT_EXCERPT_MAX_CHARS);
    }
}
