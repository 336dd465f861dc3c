//! Component registration injection.
//!
//! Each JSX module gets one statement that records its component name,
//! declaration site and referenced API endpoints in
//! `window.__LOCUS_COMPONENTS__`, so the page can map a component back to
//! source when an element carries no location attribute.
//!
//! Name extraction is textual. The declaration site is looked up in the
//! syntax tree first and falls back to a line scan.

use std::sync::LazyLock;

use arborium::tree_sitter;
use locus_types::{REGISTRY_GLOBAL, RegistryRecord};
use regex::Regex;
use tracing::warn;

use crate::sourcemap::Edit;
use crate::syntax::{char_column, children, node_text};

/// Words that can follow `export default` without naming anything.
const NON_NAME_KEYWORDS: &[&str] = &[
    "function", "class", "async", "new", "await", "typeof", "void", "null", "true", "false",
    "this",
];

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("registry pattern compiles")
}

static EXPORT_DEFAULT_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\bexport\s+default\s+function\s+([\w$]+)"));
static EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\bexport\s+default\s+([\w$]+)"));
static NAMED_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\bfunction\s+([\w$]+)\s*\("));
static CONST_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\bconst\s+([\w$]+)\s*=(?:[^=]|$)"));
static DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(?:function|const)\s+([\w$]+)"));

/// A quoted literal passed to `fetch(`, `.get/.post/.put/.patch/.delete(`,
/// `.request(`, or given as `url:`.
static API_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(concat!(
        r"(?:(?:^|[^\w$])fetch\(|\.(?:get|post|put|patch|delete|request)\(|(?:^|[^\w$])url:)",
        r#"\s*(?:'([^'\n]*)'|"([^"\n]*)"|`([^`\n]*)`)"#,
    ))
});

/// Best-effort component name for a module, first rule that matches wins:
/// `export default function NAME`, `export default NAME`, `function NAME(`,
/// `const NAME =`, then the file stem.
pub fn component_name(content: &str, relative_path: &str) -> String {
    let first = |re: &Regex| {
        re.captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|name| name.as_str())
            .find(|name| !NON_NAME_KEYWORDS.contains(name))
    };
    first(&*EXPORT_DEFAULT_FUNCTION)
        .or_else(|| first(&*EXPORT_DEFAULT))
        .or_else(|| first(&*NAMED_FUNCTION))
        .or_else(|| first(&*CONST_ASSIGNMENT))
        .unwrap_or_else(|| file_stem(relative_path))
        .to_string()
}

fn file_stem(relative_path: &str) -> &str {
    let file_name = relative_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(relative_path);
    match file_name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// `(line, column)` of the first line that declares `name`, both 1-based.
/// The column is where `name` first occurs on that line. Defaults to `(1, 1)`.
pub fn declaration_position(content: &str, name: &str) -> (u32, u32) {
    for (index, line) in content.lines().enumerate() {
        let declares = DECLARATION
            .captures_iter(line)
            .any(|caps| caps.get(1).is_some_and(|declared| declared.as_str() == name))
            || (line.contains("export default") && line.contains(name));
        if !declares {
            continue;
        }
        let Some(byte_offset) = line.find(name) else {
            continue;
        };
        let column = line[..byte_offset].chars().count() + 1;
        return (
            u32::try_from(index + 1).unwrap_or(u32::MAX),
            u32::try_from(column).unwrap_or(u32::MAX),
        );
    }
    (1, 1)
}

/// Exact `(line, column)` of the top-level declaration of `name`, both
/// 1-based, pointing at the declared identifier.
pub fn precise_declaration_position(
    tree: &tree_sitter::Tree,
    content: &str,
    name: &str,
) -> Option<(u32, u32)> {
    let ident = children(tree.root_node())
        .into_iter()
        .find_map(|node| declared_identifier(node, content, name))?;
    let line = u32::try_from(ident.start_position().row + 1).ok()?;
    let column = char_column(ident, content)?.checked_add(1)?;
    Some((line, column))
}

fn declared_identifier<'a>(
    node: tree_sitter::Node<'a>,
    content: &str,
    name: &str,
) -> Option<tree_sitter::Node<'a>> {
    let matches = |candidate: &tree_sitter::Node<'a>| node_text(*candidate, content) == name;
    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "class_declaration" => {
            node.child_by_field_name("name").filter(matches)
        }
        "lexical_declaration" | "variable_declaration" => children(node)
            .into_iter()
            .filter(|child| child.kind() == "variable_declarator")
            .filter_map(|declarator| declarator.child_by_field_name("name"))
            .find(matches),
        "export_statement" => node
            .child_by_field_name("declaration")
            .and_then(|declaration| declared_identifier(declaration, content, name))
            .or_else(|| {
                node.child_by_field_name("value")
                    .filter(|value| value.kind() == "identifier")
                    .filter(matches)
            }),
        _ => None,
    }
}

/// String literals passed to `fetch(…)`, `.get/.post/.put/.patch/.delete(…)`,
/// `.request(…)` or given as `url: …`. Deduplicated, in order of appearance.
/// Empty literals and template literals with interpolation are skipped.
pub fn api_references(content: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for caps in API_LITERAL.captures_iter(content) {
        let literal = match (caps.get(1).or_else(|| caps.get(2)), caps.get(3)) {
            (Some(quoted), _) => quoted.as_str(),
            (None, Some(template)) if !template.as_str().contains("${") => template.as_str(),
            _ => continue,
        };
        if !literal.is_empty() && !urls.iter().any(|seen| seen == literal) {
            urls.push(literal.to_string());
        }
    }
    urls
}

/// The browser-guarded registration statement for one component.
pub fn registration_statement(record: &RegistryRecord) -> Option<String> {
    let key = match facet_json::to_string(&record.component) {
        Ok(key) => key,
        Err(e) => {
            warn!(component = %record.component, %e, "failed to encode component name");
            return None;
        }
    };
    let value = match facet_json::to_string(record) {
        Ok(value) => value,
        Err(e) => {
            warn!(component = %record.component, %e, "failed to encode registry record");
            return None;
        }
    };
    Some(format!(
        "if (typeof window !== 'undefined') {{ {prelude}; window.{REGISTRY_GLOBAL}[{key}] = {value}; }}",
        prelude = registry_prelude(),
    ))
}

fn registry_prelude() -> String {
    format!("window.{REGISTRY_GLOBAL} = window.{REGISTRY_GLOBAL} || {{}}")
}

/// Builds the registry record for a module.
pub fn registry_record(
    tree: Option<&tree_sitter::Tree>,
    content: &str,
    path: &str,
) -> RegistryRecord {
    let component = component_name(content, path);
    let (line, column) = tree
        .and_then(|tree| precise_declaration_position(tree, content, &component))
        .unwrap_or_else(|| declaration_position(content, &component));
    RegistryRecord {
        file: path.to_string(),
        component,
        apis: api_references(content),
        line,
        column,
    }
}

/// The insertion that registers the module's component, or `None` when the
/// module already registers itself.
pub(crate) fn registration_edit(
    tree: &tree_sitter::Tree,
    content: &str,
    path: &str,
) -> Option<Edit> {
    if content.contains(&registry_prelude()) {
        return None;
    }
    let record = registry_record(Some(tree), content, path);
    let statement = registration_statement(&record)?;
    Some(match import_block_end(tree, content) {
        Some(offset) if offset < content.len() || content.ends_with('\n') => {
            Edit::insert(offset, format!("{statement}\n"))
        }
        Some(offset) => Edit::insert(offset, format!("\n{statement}\n")),
        None => Edit::insert(0, format!("{statement}\n")),
    })
}

/// Byte offset just past the line holding the last statement of the leading
/// import block. Directive prologues (`'use client'`) and comments count as
/// part of the block so the statement never lands above them.
fn import_block_end(tree: &tree_sitter::Tree, content: &str) -> Option<usize> {
    let mut last_end = None;
    for node in children(tree.root_node()) {
        match node.kind() {
            "import_statement" => last_end = Some(node.end_byte()),
            "comment" | "hash_bang_line" => {}
            "expression_statement" if is_directive(node) => last_end = Some(node.end_byte()),
            _ => break,
        }
    }
    let end = last_end?;
    Some(match content[end..].find('\n') {
        Some(newline) => end + newline + 1,
        None => content.len(),
    })
}

fn is_directive(statement: tree_sitter::Node<'_>) -> bool {
    statement
        .named_child(0)
        .is_some_and(|expression| expression.kind() == "string")
        && statement.named_child_count() == 1
}
