use std::collections::HashMap;

use locus_types::{ComponentRegistryEntry, RegistryRecord};
use parking_lot::RwLock;
use tracing::debug;

/// Component name → declaration site.
///
/// Filled from the registration statements modules run at load time. One
/// writer per key: re-registering a name (hot reload, or two files exporting
/// the same name) replaces the previous entry. Entries are never purged.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: RwLock<HashMap<String, ComponentRegistryEntry>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, returning the one it replaced.
    pub fn register(&self, entry: ComponentRegistryEntry) -> Option<ComponentRegistryEntry> {
        let previous = self
            .entries
            .write()
            .insert(entry.component_name.clone(), entry);
        if let Some(previous) = &previous {
            debug!(
                component = %previous.component_name,
                file = %previous.location.file_path,
                "component re-registered"
            );
        }
        previous
    }

    pub fn register_record(&self, record: RegistryRecord) -> Option<ComponentRegistryEntry> {
        self.register(record.into())
    }

    pub fn get(&self, component_name: &str) -> Option<ComponentRegistryEntry> {
        self.entries.read().get(component_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered names, sorted.
    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(component: &str, file: &str) -> RegistryRecord {
        RegistryRecord {
            file: file.to_string(),
            component: component.to_string(),
            apis: vec![String::from("/api/cart")],
            line: 3,
            column: 17,
        }
    }

    #[test]
    fn last_write_wins() {
        let registry = ComponentRegistry::new();
        assert!(registry.register_record(record("Cart", "a/Cart.tsx")).is_none());
        let replaced = registry
            .register_record(record("Cart", "b/Cart.tsx"))
            .unwrap();
        assert_eq!(replaced.location.file_path, "a/Cart.tsx");

        let entry = registry.get("Cart").unwrap();
        assert_eq!(entry.location.file_path, "b/Cart.tsx");
        assert_eq!(entry.location.line, 3);
        assert_eq!(entry.referenced_api_urls, vec![String::from("/api/cart")]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let registry = ComponentRegistry::new();
        registry.register_record(record("Zed", "z.tsx"));
        registry.register_record(record("Alpha", "a.tsx"));
        assert_eq!(registry.component_names(), vec!["Alpha", "Zed"]);
    }
}
