//! Clicked element → source location.
//!
//! Two phases, first hit wins:
//!
//! 1. **Attribute walk**: the element and its ancestors are searched for a
//!    `data-source` attribute left by the build-time tagger. The component
//!    name is the clicked element's own tag, since the attribute does not
//!    say which component rendered it.
//! 2. **Owner walk**: the same chain is offered to the configured
//!    [`OwnerResolver`], which knows how to reach the framework's component
//!    instance from a DOM node. The component it names is looked up in the
//!    [`ComponentRegistry`].
//!
//! When both come up empty the descriptor carries the unknown location.
//! Resolution never fails.

use std::fmt;

use locus_types::{ElementDescriptor, LOCATION_ATTRIBUTE, SourceLocation};
use tracing::debug;

use crate::dom::{DomElement, ancestors};
use crate::registry::ComponentRegistry;
use crate::snapshot::{ElementSnapshot, snapshot};

/// How many elements (the clicked one included) each phase looks at.
/// Deeper portal or shadow structures resolve to the unknown location.
pub const MAX_ANCESTOR_DEPTH: usize = 20;

/// Name of a framework component, as it appears in the registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentId(pub String);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Framework-specific lookup of the component that rendered a DOM node.
pub trait OwnerResolver<E: DomElement> {
    fn resolve_owning_component(&self, node: &E) -> Option<ComponentId>;
}

impl<E: DomElement, R: OwnerResolver<E> + ?Sized> OwnerResolver<E> for &R {
    fn resolve_owning_component(&self, node: &E) -> Option<ComponentId> {
        (**self).resolve_owning_component(node)
    }
}

/// For pages whose framework is unknown or unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOwnerResolver;

impl<E: DomElement> OwnerResolver<E> for NoOwnerResolver {
    fn resolve_owning_component(&self, _node: &E) -> Option<ComponentId> {
        None
    }
}

/// Resolves clicked elements against one registry with one framework
/// resolver.
pub struct ElementResolver<'a, R> {
    registry: &'a ComponentRegistry,
    owner: R,
}

impl<'a, R> ElementResolver<'a, R> {
    pub fn new(registry: &'a ComponentRegistry, owner: R) -> Self {
        Self { registry, owner }
    }

    pub fn resolve<E>(&self, element: &E) -> ElementDescriptor
    where
        E: DomElement,
        R: OwnerResolver<E>,
    {
        let snap = snapshot(element);

        if let Some(location) = attribute_location(element) {
            let component_name = snap.element_tag.clone();
            return describe(snap, location, component_name, Vec::new());
        }

        if let Some(component) = ancestors(element, MAX_ANCESTOR_DEPTH)
            .find_map(|node| self.owner.resolve_owning_component(&node))
        {
            return match self.registry.get(&component.0) {
                Some(entry) => describe(
                    snap,
                    entry.location,
                    entry.component_name,
                    entry.referenced_api_urls,
                ),
                None => {
                    debug!(%component, "owning component is not registered");
                    describe(snap, SourceLocation::unknown(), component.0, Vec::new())
                }
            };
        }

        let component_name = snap.element_tag.clone();
        describe(snap, SourceLocation::unknown(), component_name, Vec::new())
    }
}

/// The nearest well-formed location attribute on the element or its
/// ancestors. Malformed values are skipped and the walk continues.
pub fn attribute_location<E: DomElement>(element: &E) -> Option<SourceLocation> {
    ancestors(element, MAX_ANCESTOR_DEPTH).find_map(|node| {
        let value = node.get_attribute(LOCATION_ATTRIBUTE)?;
        let parsed = SourceLocation::parse_attribute(&value);
        if parsed.is_none() {
            debug!(value = %value, "ignoring malformed location attribute");
        }
        parsed
    })
}

fn describe(
    snap: ElementSnapshot,
    location: SourceLocation,
    component_name: String,
    apis: Vec<String>,
) -> ElementDescriptor {
    ElementDescriptor {
        location,
        component_name,
        element_tag: snap.element_tag,
        text_excerpt: snap.text_excerpt,
        attributes: snap.attributes,
        computed_style: snap.computed_style,
        apis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fake::FakeElement;
    use locus_types::RegistryRecord;

    /// Reports the owner recorded on the fake node.
    struct FakeOwners;

    impl OwnerResolver<FakeElement> for FakeOwners {
        fn resolve_owning_component(&self, node: &FakeElement) -> Option<ComponentId> {
            node.owner().map(|name| ComponentId(name.to_string()))
        }
    }

    #[test]
    fn attribute_on_element_round_trips() {
        let registry = ComponentRegistry::new();
        let resolver = ElementResolver::new(&registry, NoOwnerResolver);
        let el = FakeElement::root("body").child("div", &[("data-source", "a/b.tsx:12:4")]);
        let descriptor = resolver.resolve(&el);
        assert_eq!(descriptor.location, SourceLocation::new("a/b.tsx", 12, 4));
        assert_eq!(descriptor.component_name, "div");
    }

    #[test]
    fn ancestor_attribute_is_used_with_clicked_tag_as_component() {
        let registry = ComponentRegistry::new();
        let resolver = ElementResolver::new(&registry, NoOwnerResolver);
        let clicked = FakeElement::root("body")
            .child("section", &[("data-source", "app.tsx:20:1")])
            .child("div", &[])
            .child("p", &[])
            .child("SPAN", &[]);
        let descriptor = resolver.resolve(&clicked);
        assert_eq!(descriptor.location, SourceLocation::new("app.tsx", 20, 1));
        assert_eq!(descriptor.component_name, "span");
        assert_eq!(descriptor.element_tag, "span");
    }

    #[test]
    fn malformed_attribute_is_skipped() {
        let registry = ComponentRegistry::new();
        let resolver = ElementResolver::new(&registry, NoOwnerResolver);
        let clicked = FakeElement::root("body")
            .child("main", &[("data-source", "app.tsx:3:0")])
            .child("div", &[("data-source", "app.tsx:oops:0")]);
        assert_eq!(
            resolver.resolve(&clicked).location,
            SourceLocation::new("app.tsx", 3, 0)
        );
    }

    #[test]
    fn attribute_beyond_depth_bound_is_not_found() {
        let mut node = FakeElement::root("body").child("div", &[("data-source", "deep.tsx:1:0")]);
        for _ in 0..MAX_ANCESTOR_DEPTH {
            node = node.child("div", &[]);
        }
        let registry = ComponentRegistry::new();
        let descriptor = ElementResolver::new(&registry, NoOwnerResolver).resolve(&node);
        assert!(descriptor.location.is_unknown());
        assert_eq!(descriptor.component_name, "div");
    }

    #[test]
    fn owner_walk_merges_registry_entry() {
        let registry = ComponentRegistry::new();
        registry.register_record(RegistryRecord {
            file: String::from("src/Cart.tsx"),
            component: String::from("Cart"),
            apis: vec![String::from("/api/cart")],
            line: 4,
            column: 17,
        });
        let clicked = FakeElement::root("body")
            .owned_by("div", "Cart")
            .child("button", &[]);
        let descriptor = ElementResolver::new(&registry, FakeOwners).resolve(&clicked);
        assert_eq!(descriptor.location, SourceLocation::new("src/Cart.tsx", 4, 17));
        assert_eq!(descriptor.component_name, "Cart");
        assert_eq!(descriptor.element_tag, "button");
        assert_eq!(descriptor.apis, vec![String::from("/api/cart")]);
    }

    #[test]
    fn unregistered_owner_yields_unknown_location_with_name() {
        let registry = ComponentRegistry::new();
        let clicked = FakeElement::root("body").owned_by("div", "Ghost");
        let descriptor = ElementResolver::new(&registry, FakeOwners).resolve(&clicked);
        assert!(descriptor.location.is_unknown());
        assert_eq!(descriptor.component_name, "Ghost");
    }

    #[test]
    fn nothing_found_yields_unknown_keyed_by_tag() {
        let registry = ComponentRegistry::new();
        let clicked = FakeElement::root("body").child("canvas", &[]);
        let descriptor = ElementResolver::new(&registry, FakeOwners).resolve(&clicked);
        assert!(descriptor.location.is_unknown());
        assert_eq!(descriptor.component_name, "canvas");
    }
}
