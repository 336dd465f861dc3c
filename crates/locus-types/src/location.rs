use facet::Facet;
use std::fmt;

/// Markup attribute carrying `path:line:column` for an element.
pub const LOCATION_ATTRIBUTE: &str = "data-source";

/// File path used when an element could not be traced back to source.
pub const UNKNOWN_FILE: &str = "unknown";

/// Where a markup element was written.
///
/// `line` is 1-based, `column` is 0-based (characters from the start of the
/// line to the opening `<`). `file_path` is project-relative and always uses
/// forward slashes.
#[derive(Facet, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file_path: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            column,
        }
    }

    /// The location reported when neither the attribute nor the framework
    /// introspection found anything.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_FILE, 0, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.file_path == UNKNOWN_FILE && self.line == 0 && self.column == 0
    }

    /// Parses an attribute value of the form `path:line:column`.
    ///
    /// Splits from the right: the last two segments are column and line, and
    /// whatever precedes them is the path, which may itself contain `:`
    /// (drive letters, odd file names).
    pub fn parse_attribute(value: &str) -> Option<Self> {
        let mut parts = value.rsplitn(3, ':');
        let column = parts.next()?.trim().parse::<u32>().ok()?;
        let line = parts.next()?.trim().parse::<u32>().ok()?;
        let file_path = parts.next()?;
        if file_path.is_empty() {
            return None;
        }
        Some(Self::new(file_path, line, column))
    }

    /// The attribute value written by the tagger.
    pub fn to_attribute(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.line, self.column)
    }
}

/// Normalizes a project-relative path for use in location attributes:
/// backslashes become forward slashes and a leading `./` is dropped.
pub fn normalize_relative_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut trimmed = normalized.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_round_trips_through_display() {
        let location = SourceLocation::parse_attribute("a/b.tsx:12:4").unwrap();
        assert_eq!(location, SourceLocation::new("a/b.tsx", 12, 4));
        assert_eq!(location.to_attribute(), "a/b.tsx:12:4");
    }

    #[test]
    fn path_with_colons_splits_from_the_right() {
        let location = SourceLocation::parse_attribute("c:/weird:path.tsx:7:2").unwrap();
        assert_eq!(location.file_path, "c:/weird:path.tsx");
        assert_eq!(location.line, 7);
        assert_eq!(location.column, 2);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(SourceLocation::parse_attribute("").is_none());
        assert!(SourceLocation::parse_attribute("app.tsx").is_none());
        assert!(SourceLocation::parse_attribute("app.tsx:12").is_none());
        assert!(SourceLocation::parse_attribute("app.tsx:x:1").is_none());
        assert!(SourceLocation::parse_attribute(":1:2").is_none());
    }

    #[test]
    fn unknown_location_is_recognized() {
        assert!(SourceLocation::unknown().is_unknown());
        assert!(!SourceLocation::new("unknown", 1, 0).is_unknown());
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        assert_eq!(normalize_relative_path("src\\app\\page.tsx"), "src/app/page.tsx");
        assert_eq!(normalize_relative_path("./src/App.tsx"), "src/App.tsx");
        assert_eq!(normalize_relative_path("src/App.tsx"), "src/App.tsx");
    }

    #[test]
    fn location_serializes_with_snake_case_fields() {
        let json = facet_json::to_string(&SourceLocation::new("app.tsx", 20, 1)).unwrap();
        assert!(json.contains("\"file_path\":\"app.tsx\""));
        assert!(json.contains("\"line\":20"));
    }
}
