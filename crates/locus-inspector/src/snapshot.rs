use std::collections::BTreeMap;

use locus_types::text_excerpt;

use crate::dom::DomElement;

/// Computed style properties captured for every inspected element.
pub const STYLE_PROPERTIES: &[&str] = &[
    "display",
    "position",
    "width",
    "height",
    "margin",
    "padding",
    "color",
    "background-color",
    "font-size",
    "font-weight",
    "font-family",
    "border",
    "border-radius",
    "flex-direction",
    "justify-content",
    "align-items",
    "gap",
];

/// DOM-side facts about an element, independent of how its source was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub element_tag: String,
    pub text_excerpt: String,
    pub attributes: BTreeMap<String, String>,
    pub computed_style: BTreeMap<String, String>,
}

pub fn snapshot<E: DomElement>(element: &E) -> ElementSnapshot {
    let attributes = element
        .attributes()
        .into_iter()
        .filter(|(name, _)| !is_structural_attribute(name))
        .collect();
    let computed_style = STYLE_PROPERTIES
        .iter()
        .filter_map(|property| {
            element
                .computed_style(property)
                .filter(|value| !value.is_empty())
                .map(|value| (property.to_string(), value))
        })
        .collect();
    ElementSnapshot {
        element_tag: element.tag_name(),
        text_excerpt: text_excerpt(&element.text_content()),
        attributes,
        computed_style,
    }
}

fn is_structural_attribute(name: &str) -> bool {
    name == "class" || name == "id" || name.starts_with("data-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fake::FakeElement;

    #[test]
    fn structural_attributes_are_dropped() {
        let root = FakeElement::root("body");
        let el = root.child(
            "BUTTON",
            &[
                ("class", "btn"),
                ("id", "go"),
                ("data-source", "a.tsx:1:0"),
                ("type", "submit"),
                ("aria-label", "Go"),
            ],
        );
        let snap = snapshot(&el);
        assert_eq!(snap.element_tag, "button");
        assert_eq!(
            snap.attributes.keys().collect::<Vec<_>>(),
            vec!["aria-label", "type"]
        );
        assert_eq!(snap.computed_style.get("display").map(String::as_str), Some("block"));
    }

    #[test]
    fn text_is_trimmed_and_truncated() {
        let root = FakeElement::root("body");
        let long = format!("  {}  ", "x".repeat(250));
        let snap = snapshot(&root.with_text("p", &long));
        assert_eq!(snap.text_excerpt.len(), 100);
    }
}
