use super::*;
use std::path::Path;

fn run_fixture(path: &Path, contents: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or("fixture has no file name")?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("fixture");
    let relative_path = format!("src/{file_name}");

    let output = transform_module(contents, &relative_path)
        .ok_or("fixture produced no changes")?
        .code;
    insta::assert_snapshot!(stem, output);

    // Running again over our own output must be a no-op.
    if let Some(again) = transform_module(&output, &relative_path) {
        return Err(format!("second pass changed the module:\n{}", again.code).into());
    }
    Ok(())
}

datatest_mini::harness! {
    { test = run_fixture, root = "tests/fixtures", pattern = r"^[^/]+\.(tsx|jsx|vue)$" },
}

const TOOLBAR: &str = r#"import { Button } from "./button";

export function Toolbar({ x }) {
  return (
  <Button onClick={x}>Go</Button>
  );
}
"#;

#[test]
fn tags_element_with_line_and_column() {
    let output = tag_source(TOOLBAR, "file.tsx").unwrap();
    assert!(
        output
            .code
            .contains(r#"<Button data-source="file.tsx:5:2" onClick={x}>Go</Button>"#),
        "{}",
        output.code
    );
}

#[test]
fn tagging_is_idempotent() {
    let once = tag_source(TOOLBAR, "file.tsx").unwrap();
    assert!(tag_source(&once.code, "file.tsx").is_none());
}

#[test]
fn markup_free_and_unsupported_files_are_untouched() {
    assert!(tag_source("export const answer = 42;\n", "answer.ts").is_none());
    assert!(tag_source("export const answer = 42;\n", "answer.tsx").is_none());
    assert!(transform_module("export const answer = 42;\n", "answer.jsx").is_none());
    assert!(tag_source("<div></div>", "notes.md").is_none());
}

#[test]
fn paths_are_normalized_in_attributes() {
    let output = tag_source("const a = <div />;\n", r".\src\a.jsx").unwrap();
    assert!(output.code.contains(r#"<div data-source="src/a.jsx:1:10" />"#), "{}", output.code);
    assert_eq!(output.map.sources, vec![String::from("src/a.jsx")]);
}

#[test]
fn columns_count_characters_not_bytes() {
    let output = tag_source("const é = <b />;\n", "a.jsx").unwrap();
    assert!(output.code.contains(r#"<b data-source="a.jsx:1:10" />"#), "{}", output.code);
}

#[test]
fn broken_element_is_skipped_and_siblings_are_still_tagged() {
    for broken in ["< />", "<div><span></div>"] {
        let source = format!("const ok = <section />;\nconst bad = {broken};\n");
        let output = tag_source(&source, "a.tsx").unwrap();
        assert!(
            output.code.contains(r#"<section data-source="a.tsx:1:11" />"#),
            "{}",
            output.code
        );
        if broken == "< />" {
            let bad_line = output.code.lines().nth(1).unwrap();
            assert!(!bad_line.contains("data-source"), "{}", output.code);
        }
    }

    let garbage = transform_module("<<<<>>>>{{{{", "broken.jsx");
    assert!(garbage.is_none_or(|output| !output.code.contains("data-source=")));
}

#[test]
fn vue_without_template_is_untouched() {
    assert!(tag_source("<script setup>\nconst a = 1 < 2;\n</script>\n", "a.vue").is_none());
}

#[test]
fn component_name_rules_apply_in_order() {
    assert_eq!(
        component_name("export default function Card() {}\nfunction Other() {}", "x.tsx"),
        "Card"
    );
    assert_eq!(
        component_name("function Inner() {}\nexport default Outer;", "x.tsx"),
        "Outer"
    );
    assert_eq!(
        component_name("export default function () {}\nfunction Helper() {}", "x.tsx"),
        "Helper"
    );
    assert_eq!(component_name("const Panel = () => null;", "x.tsx"), "Panel");
    assert_eq!(
        component_name("export default () => null;", "src/widgets/Gauge.tsx"),
        "Gauge"
    );
}

#[test]
fn heuristic_position_points_at_declaring_line() {
    let source = "import x from 'x';\n\nexport const  Banner = () => null;\n";
    assert_eq!(declaration_position(source, "Banner"), (3, 15));
    assert_eq!(declaration_position(source, "Missing"), (1, 1));
}

#[test]
fn precise_position_ignores_mentions_in_comments() {
    let source = "// const Widget = placeholder\nconst Widget = () => <div />;\n";
    assert_eq!(declaration_position(source, "Widget"), (1, 10));

    let tree = syntax::parse(source, SourceLanguage::Jsx).unwrap();
    assert_eq!(
        precise_declaration_position(&tree, source, "Widget"),
        Some((2, 7))
    );
}

#[test]
fn api_references_are_deduplicated_in_order() {
    let source = r#"
        const a = () => fetch('/api/a');
        client.get("/api/b");
        client.request(`/api/c`);
        const cfg = { url: '/api/d' };
        fetch('/api/a');
        fetch(`/api/${id}`);
        refetch('/not-a-fetch');
        api.delete("");
        api.delete( "/api/e" );
    "#;
    assert_eq!(
        api_references(source),
        vec!["/api/a", "/api/b", "/api/c", "/api/d", "/api/e"]
    );
}

#[test]
fn registration_is_byte_identical_across_runs() {
    let first = transform_module(TOOLBAR, "src/Toolbar.jsx").unwrap();
    let second = transform_module(TOOLBAR, "src/Toolbar.jsx").unwrap();
    assert_eq!(first.code, second.code);
    assert_eq!(first.map, second.map);
}

#[test]
fn registration_lands_after_directives_when_no_imports() {
    let source = "'use client';\nexport default function Tile() {\n  return <div />;\n}\n";
    let output = transform_module(source, "Tile.jsx").unwrap();
    let mut lines = output.code.lines();
    assert_eq!(lines.next(), Some("'use client';"));
    let statement = lines.next().unwrap();
    assert!(statement.starts_with("if (typeof window !== 'undefined')"));
    assert!(statement.contains(r#"window.__LOCUS_COMPONENTS__["Tile"] = {"file":"Tile.jsx","component":"Tile","apis":[],"line":2,"column":25}"#));
}

#[test]
fn registration_is_prepended_without_imports() {
    let output = transform_module("const Dot = () => <i />;\n", "Dot.jsx").unwrap();
    assert!(output.code.starts_with("if (typeof window !== 'undefined')"));
    assert!(output.code.ends_with("const Dot = () => <i data-source=\"Dot.jsx:1:18\" />;\n"));
}

#[test]
fn registry_record_falls_back_to_heuristics_without_tree() {
    let record = registry_record(None, "// nothing\nconst Chip = 1;\n", "ui/Chip.tsx");
    assert_eq!(record.component, "Chip");
    assert_eq!((record.line, record.column), (2, 7));
    assert_eq!(record.file, "ui/Chip.tsx");
}
