//! Build-time transforms that make rendered elements traceable to source.
//!
//! [`transform_module`] is what the dev server runs on every module the
//! bundler hands it: it tags markup with `data-source` attributes and, for
//! JSX modules, appends the component registration statement after the
//! imports. Both passes share one parse.

use arborium::tree_sitter;
use locus_types::normalize_relative_path;
use tracing::warn;

mod registry;
mod sourcemap;
mod syntax;
mod tagger;
mod vue;

pub use registry::{
    api_references, component_name, declaration_position, precise_declaration_position,
    registration_statement, registry_record,
};
pub use sourcemap::{Edit, SourceMap, apply_edits};
pub use syntax::SourceLanguage;
pub use tagger::tag_source;

/// A rewritten module and the map back to its original text.
#[derive(Clone, Debug)]
pub struct TransformOutput {
    pub code: String,
    pub map: SourceMap,
}

impl TransformOutput {
    fn from_edits(content: &str, path: &str, edits: Vec<Edit>) -> Self {
        let (code, map) = apply_edits(content, path, edits);
        Self { code, map }
    }
}

pub(crate) struct ParsedModule {
    pub(crate) language: SourceLanguage,
    /// Forward-slash, `./`-stripped form of the module path.
    pub(crate) path: String,
    pub(crate) tree: tree_sitter::Tree,
}

impl ParsedModule {
    /// `None` for unsupported extensions, markup-free text and parse failures.
    pub(crate) fn parse(content: &str, relative_path: &str) -> Option<Self> {
        let language = SourceLanguage::from_path(relative_path)?;
        if !content.contains('<') {
            return None;
        }
        let path = normalize_relative_path(relative_path);
        let Some(tree) = syntax::parse(content, language) else {
            warn!(path = %path, "parse failed, passing module through untouched");
            return None;
        };
        Some(Self {
            language,
            path,
            tree,
        })
    }
}

/// Tags the module's markup and registers its component.
///
/// Returns `None` when nothing changed, so callers can tell a no-op from a
/// byte-identical rewrite.
pub fn transform_module(content: &str, relative_path: &str) -> Option<TransformOutput> {
    let module = ParsedModule::parse(content, relative_path)?;
    let mut edits = tagger::location_edits(&module.tree, content, &module.path, module.language);
    if module.language.is_jsx()
        && has_markup(&module.tree)
        && let Some(edit) = registry::registration_edit(&module.tree, content, &module.path)
    {
        edits.push(edit);
    }
    if edits.is_empty() {
        return None;
    }
    Some(TransformOutput::from_edits(content, &module.path, edits))
}

fn has_markup(tree: &tree_sitter::Tree) -> bool {
    let mut found = false;
    syntax::visit(tree.root_node(), &mut |node| {
        found |= matches!(
            node.kind(),
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment"
        );
    });
    found
}

#[cfg(test)]
mod tests;
