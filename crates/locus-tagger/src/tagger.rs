//! JSX/TSX source tagging.
//!
//! Every opening tag that can carry attributes gets a
//! `data-source="path:line:column"` attribute right after its name (or after
//! its type arguments, for `<Select<T> …>`). Fragments, error nodes and tags
//! that already carry the attribute are left alone, which makes the pass
//! idempotent.

use arborium::tree_sitter;
use locus_types::{LOCATION_ATTRIBUTE, SourceLocation};
use tracing::debug;

use crate::sourcemap::Edit;
use crate::syntax::{SourceLanguage, char_column, children, node_text, visit};
use crate::{ParsedModule, TransformOutput};
use crate::vue;

/// Tree-sitter kinds for tags that open an element.
const OPENING_KINDS: &[&str] = &["jsx_opening_element", "jsx_self_closing_element"];

/// Named grouping constructs that render no DOM node and reject unknown props.
const NAMED_FRAGMENTS: &[&str] = &["Fragment", "React.Fragment"];

/// Node kinds that can stand in for a JSX element name.
const NAME_KINDS: &[&str] = &[
    "identifier",
    "member_expression",
    "nested_identifier",
    "jsx_namespace_name",
];

/// Tags every eligible element in `content`.
///
/// Returns `None` when the file is not markup-bearing, cannot be parsed, or
/// when nothing needed tagging.
pub fn tag_source(content: &str, relative_path: &str) -> Option<TransformOutput> {
    let module = ParsedModule::parse(content, relative_path)?;
    let edits = location_edits(&module.tree, content, &module.path, module.language);
    if edits.is_empty() {
        return None;
    }
    Some(TransformOutput::from_edits(content, &module.path, edits))
}

pub(crate) fn location_edits(
    tree: &tree_sitter::Tree,
    content: &str,
    path: &str,
    language: SourceLanguage,
) -> Vec<Edit> {
    match language {
        SourceLanguage::Vue => vue::location_edits(tree, content, path),
        SourceLanguage::Tsx | SourceLanguage::Jsx => jsx_location_edits(tree, content, path),
    }
}

fn jsx_location_edits(tree: &tree_sitter::Tree, content: &str, path: &str) -> Vec<Edit> {
    let mut edits = Vec::new();
    visit(tree.root_node(), &mut |node| {
        if !OPENING_KINDS.contains(&node.kind()) {
            return;
        }
        match opening_element_edit(node, content, path) {
            Ok(Some(edit)) => edits.push(edit),
            Ok(None) => {}
            Err(reason) => {
                debug!(
                    path,
                    line = node.start_position().row + 1,
                    reason,
                    "skipping element"
                );
            }
        }
    });
    edits
}

/// `Ok(None)` means the element is deliberately left alone; `Err` means it
/// could not be processed and was skipped.
fn opening_element_edit(
    node: tree_sitter::Node<'_>,
    content: &str,
    path: &str,
) -> Result<Option<Edit>, String> {
    if node.is_error() || node.is_missing() {
        return Err(String::from("element is an error node"));
    }
    // `<>` has no name and no attribute slot.
    let Some(name) = element_name(node) else {
        return Ok(None);
    };
    if name.has_error() || name.is_missing() {
        return Err(String::from("element name did not parse"));
    }
    if NAMED_FRAGMENTS.contains(&node_text(name, content)) {
        return Ok(None);
    }
    if has_location_attribute(node, content) {
        return Ok(None);
    }

    let line = u32::try_from(node.start_position().row + 1)
        .map_err(|_| String::from("line out of range"))?;
    let column = char_column(node, content).ok_or_else(|| String::from("no column"))?;
    let insert_at = children(node)
        .into_iter()
        .find(|child| child.kind() == "type_arguments")
        .map(|type_args| type_args.end_byte())
        .unwrap_or_else(|| name.end_byte());

    let location = SourceLocation::new(path, line, column);
    Ok(Some(Edit::insert(
        insert_at,
        format!(" {LOCATION_ATTRIBUTE}=\"{}\"", location.to_attribute()),
    )))
}

fn element_name(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    node.child_by_field_name("name").or_else(|| {
        children(node)
            .into_iter()
            .find(|child| NAME_KINDS.contains(&child.kind()))
    })
}

fn has_location_attribute(node: tree_sitter::Node<'_>, content: &str) -> bool {
    children(node)
        .into_iter()
        .filter(|child| child.kind() == "jsx_attribute")
        .filter_map(|attribute| attribute.child(0))
        .any(|attr_name| node_text(attr_name, content) == LOCATION_ATTRIBUTE)
}

