/// The slice of the DOM the resolver and snapshotter need.
///
/// Implemented for `web_sys::Element` on wasm; tests provide an in-memory tree.
pub trait DomElement: Clone {
    /// Lower-cased tag name (`div`, `my-widget`).
    fn tag_name(&self) -> String;
    fn get_attribute(&self, name: &str) -> Option<String>;
    fn parent(&self) -> Option<Self>;
    fn text_content(&self) -> String;
    /// All attributes in document order.
    fn attributes(&self) -> Vec<(String, String)>;
    /// Resolved value of one CSS property, if the environment computes styles.
    fn computed_style(&self, property: &str) -> Option<String>;
}

/// The element followed by its ancestors, nearest first, at most `max_depth`
/// elements in total.
pub fn ancestors<E: DomElement>(element: &E, max_depth: usize) -> impl Iterator<Item = E> {
    std::iter::successors(Some(element.clone()), |current| current.parent()).take(max_depth)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::DomElement;

    /// In-memory element with a shared parent chain.
    #[derive(Clone, Debug)]
    pub(crate) struct FakeElement(Rc<Node>);

    #[derive(Debug)]
    struct Node {
        tag: String,
        attributes: Vec<(String, String)>,
        text: String,
        style: BTreeMap<String, String>,
        owner: Option<String>,
        parent: Option<FakeElement>,
    }

    impl FakeElement {
        pub(crate) fn root(tag: &str) -> Self {
            Self::build(tag, None, &[], "", None)
        }

        pub(crate) fn child(&self, tag: &str, attributes: &[(&str, &str)]) -> Self {
            Self::build(tag, Some(self.clone()), attributes, "", None)
        }

        pub(crate) fn with_text(&self, tag: &str, text: &str) -> Self {
            Self::build(tag, Some(self.clone()), &[], text, None)
        }

        /// A child that a framework reports as rendered by `component`.
        pub(crate) fn owned_by(&self, tag: &str, component: &str) -> Self {
            Self::build(tag, Some(self.clone()), &[], "", Some(component))
        }

        pub(crate) fn owner(&self) -> Option<&str> {
            self.0.owner.as_deref()
        }

        fn build(
            tag: &str,
            parent: Option<FakeElement>,
            attributes: &[(&str, &str)],
            text: &str,
            owner: Option<&str>,
        ) -> Self {
            let mut style = BTreeMap::new();
            style.insert(String::from("display"), String::from("block"));
            Self(Rc::new(Node {
                tag: tag.to_string(),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text: text.to_string(),
                style,
                owner: owner.map(str::to_string),
                parent,
            }))
        }
    }

    impl DomElement for FakeElement {
        fn tag_name(&self) -> String {
            self.0.tag.to_lowercase()
        }

        fn get_attribute(&self, name: &str) -> Option<String> {
            self.0
                .attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        }

        fn parent(&self) -> Option<Self> {
            self.0.parent.clone()
        }

        fn text_content(&self) -> String {
            self.0.text.clone()
        }

        fn attributes(&self) -> Vec<(String, String)> {
            self.0.attributes.clone()
        }

        fn computed_style(&self, property: &str) -> Option<String> {
            self.0.style.get(property).cloned()
        }
    }
}
