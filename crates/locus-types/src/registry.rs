use facet::Facet;

use crate::SourceLocation;

/// Name of the browser global the injected registration statements write to.
pub const REGISTRY_GLOBAL: &str = "__LOCUS_COMPONENTS__";

/// Component name → declaration site, used when an element carries no
/// location attribute and the owning component has to be looked up instead.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct ComponentRegistryEntry {
    pub component_name: String,
    pub location: SourceLocation,
    /// API endpoints referenced from the component's file, first-seen order.
    pub referenced_api_urls: Vec<String>,
}

/// The object literal written into the browser global for one component.
///
/// Field names are part of the page-side contract and must stay short:
/// `{file, component, apis, line, column}`.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct RegistryRecord {
    pub file: String,
    pub component: String,
    pub apis: Vec<String>,
    pub line: u32,
    pub column: u32,
}

impl From<RegistryRecord> for ComponentRegistryEntry {
    fn from(record: RegistryRecord) -> Self {
        Self {
            location: SourceLocation::new(record.file, record.line, record.column),
            component_name: record.component,
            referenced_api_urls: record.apis,
        }
    }
}

impl From<&ComponentRegistryEntry> for RegistryRecord {
    fn from(entry: &ComponentRegistryEntry) -> Self {
        Self {
            file: entry.location.file_path.clone(),
            component: entry.component_name.clone(),
            apis: entry.referenced_api_urls.clone(),
            line: entry.location.line,
            column: entry.location.column,
        }
    }
}
