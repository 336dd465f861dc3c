//! Vue single-file component tagging.
//!
//! The SFC is parsed with the HTML grammar; only elements under the top-level
//! `<template>` block are tagged. `<script>` and `<style>` blocks are never
//! touched.

use arborium::tree_sitter;
use locus_types::{LOCATION_ATTRIBUTE, SourceLocation};
use tracing::debug;

use crate::sourcemap::Edit;
use crate::syntax::{char_column, children, node_text, visit};

const TAG_KINDS: &[&str] = &["start_tag", "self_closing_tag"];

/// Tags that render no element of their own.
const SKIPPED_TAGS: &[&str] = &["template", "slot"];

pub(crate) fn location_edits(tree: &tree_sitter::Tree, content: &str, path: &str) -> Vec<Edit> {
    let Some(template) = root_template(tree.root_node(), content) else {
        debug!(path, "no top-level <template> block");
        return Vec::new();
    };

    let mut edits = Vec::new();
    // The block's own start tag is a wrapper, not an element.
    for child in children(template) {
        if TAG_KINDS.contains(&child.kind()) {
            continue;
        }
        visit(child, &mut |node| {
            if !TAG_KINDS.contains(&node.kind()) {
                return;
            }
            match tag_edit(node, content, path) {
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
    }
    edits
}

fn root_template<'a>(root: tree_sitter::Node<'a>, content: &str) -> Option<tree_sitter::Node<'a>> {
    children(root).into_iter().find(|node| {
        node.kind() == "element"
            && children(*node)
                .into_iter()
                .find(|child| child.kind() == "start_tag")
                .and_then(|start| tag_name(start))
                .is_some_and(|name| node_text(name, content).eq_ignore_ascii_case("template"))
    })
}

fn tag_name(tag: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    children(tag)
        .into_iter()
        .find(|child| child.kind() == "tag_name")
}

fn tag_edit(
    node: tree_sitter::Node<'_>,
    content: &str,
    path: &str,
) -> Result<Option<Edit>, String> {
    if node.is_error() || node.is_missing() || node.has_error() {
        return Err(String::from("tag did not parse"));
    }
    let name = tag_name(node).ok_or_else(|| String::from("tag has no name"))?;
    let name_text = node_text(name, content);
    if SKIPPED_TAGS
        .iter()
        .any(|skipped| name_text.eq_ignore_ascii_case(skipped))
    {
        return Ok(None);
    }
    let already_tagged = children(node)
        .into_iter()
        .filter(|child| child.kind() == "attribute")
        .filter_map(|attribute| {
            children(attribute)
                .into_iter()
                .find(|part| part.kind() == "attribute_name")
        })
        .any(|attr_name| node_text(attr_name, content) == LOCATION_ATTRIBUTE);
    if already_tagged {
        return Ok(None);
    }

    let line = u32::try_from(node.start_position().row + 1)
        .map_err(|_| String::from("line out of range"))?;
    let column = char_column(node, content).ok_or_else(|| String::from("no column"))?;
    let location = SourceLocation::new(path, line, column);
    Ok(Some(Edit::insert(
        name.end_byte(),
        format!(" {LOCATION_ATTRIBUTE}=\"{}\"", location.to_attribute()),
    )))
}
