//! Text handed to the agent for an inspected element.

use std::fmt::Write;

use locus_types::{ElementDescriptor, InspectionRecord};

/// Markdown block describing one inspection: where the element lives, what
/// it looks like, and what the user asked for.
pub fn render_inspection(record: &InspectionRecord) -> String {
    let mut out = String::new();
    write_descriptor(&mut out, &record.descriptor);
    let _ = writeln!(out);
    let _ = writeln!(out, "### Request");
    let _ = writeln!(out, "{}", record.feedback.trim());
    out
}

/// Every queued inspection, numbered, oldest first.
pub fn render_inspections(records: &[InspectionRecord]) -> String {
    if records.is_empty() {
        return String::from("No inspected elements yet.\n");
    }
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        if index > 0 {
            let _ = writeln!(out, "\n---\n");
        }
        let _ = writeln!(out, "## Element {}", index + 1);
        out.push_str(&render_inspection(record));
    }
    out
}

fn write_descriptor(out: &mut String, descriptor: &ElementDescriptor) {
    let location = &descriptor.location;
    let _ = writeln!(out, "### Element `<{}>`", descriptor.element_tag);
    if location.is_unknown() {
        let _ = writeln!(out, "- source: unknown");
    } else {
        let _ = writeln!(
            out,
            "- source: `{}` line {} column {}",
            location.file_path, location.line, location.column
        );
    }
    let _ = writeln!(out, "- component: `{}`", descriptor.component_name);
    if !descriptor.text_excerpt.is_empty() {
        let _ = writeln!(out, "- text: {:?}", descriptor.text_excerpt);
    }
    if !descriptor.attributes.is_empty() {
        let _ = writeln!(out, "- attributes:");
        for (name, value) in &descriptor.attributes {
            let _ = writeln!(out, "  - `{name}` = {value:?}");
        }
    }
    if !descriptor.computed_style.is_empty() {
        let _ = writeln!(out, "- computed style:");
        for (property, value) in &descriptor.computed_style {
            let _ = writeln!(out, "  - `{property}: {value}`");
        }
    }
    if !descriptor.apis.is_empty() {
        let _ = writeln!(out, "- APIs used by this component:");
        for api in &descriptor.apis {
            let _ = writeln!(out, "  - `{api}`");
        }
    }
}
