use arborium::tree_sitter;

/// Source dialects the tagger understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceLanguage {
    /// TypeScript with JSX.
    Tsx,
    /// JavaScript with JSX.
    Jsx,
    /// Vue single-file component; only the top-level `<template>` is tagged.
    Vue,
}

impl SourceLanguage {
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext {
            "tsx" => Some(Self::Tsx),
            "jsx" | "js" | "mjs" => Some(Self::Jsx),
            "vue" => Some(Self::Vue),
            _ => None,
        }
    }

    fn grammar_name(self) -> &'static str {
        match self {
            Self::Tsx => "tsx",
            Self::Jsx => "javascript",
            Self::Vue => "html",
        }
    }

    pub fn is_jsx(self) -> bool {
        matches!(self, Self::Tsx | Self::Jsx)
    }
}

/// Error-recovering parse. Only fails when the grammar is unavailable or the
/// parser gives up entirely; syntax errors become `ERROR` nodes in the tree.
pub(crate) fn parse(content: &str, language: SourceLanguage) -> Option<tree_sitter::Tree> {
    let ts_lang = arborium::get_language(language.grammar_name())?;
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&ts_lang).ok()?;
    parser.parse(content.as_bytes(), None)
}

pub(crate) fn node_text<'a>(node: tree_sitter::Node<'_>, content: &'a str) -> &'a str {
    content.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

pub(crate) fn children<'a>(node: tree_sitter::Node<'a>) -> Vec<tree_sitter::Node<'a>> {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .collect()
}

/// Column of `node`'s first character, counted in characters (not bytes)
/// from the start of its line.
pub(crate) fn char_column(node: tree_sitter::Node<'_>, content: &str) -> Option<u32> {
    let start = node.start_byte();
    let line_start = start.checked_sub(node.start_position().column)?;
    let prefix = content.get(line_start..start)?;
    u32::try_from(prefix.chars().count()).ok()
}

/// Depth-first, document-order visit of every node under `root`.
pub(crate) fn visit<'a>(root: tree_sitter::Node<'a>, f: &mut impl FnMut(tree_sitter::Node<'a>)) {
    f(root);
    for child in children(root) {
        visit(child, f);
    }
}
