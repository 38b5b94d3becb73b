//! Shared types used across pipeline stages.
//!
//! These types are serialized to JSON between stages (fetch → parse →
//! translate → build) and stored on the project record.

use serde::{Deserialize, Serialize};

/// Source format of a page, chosen by file extension unless the fetcher
/// supplies one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    Markdown,
    Html,
    #[serde(rename = "rst")]
    ReStructuredText,
    #[serde(rename = "text")]
    PlainText,
}

impl FormatHint {
    /// Format implied by a path's extension. Unknown extensions are plain text.
    pub fn from_path(path: &str) -> Self {
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let ext = match file.rfind('.') {
            Some(0) | None => "",
            Some(dot) => &file[dot + 1..],
        };
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "mdown" | "mkd" | "mdx" => FormatHint::Markdown,
            "html" | "htm" | "xhtml" => FormatHint::Html,
            "rst" | "rest" => FormatHint::ReStructuredText,
            _ => FormatHint::PlainText,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatHint::Markdown => "markdown",
            FormatHint::Html => "html",
            FormatHint::ReStructuredText => "rst",
            FormatHint::PlainText => "text",
        }
    }
}

/// A fetched page before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    /// Source-relative path, forward slashes
    pub source_path: String,
    pub content: String,
    /// Explicit format; falls back to the path's extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatHint>,
}

impl RawPage {
    pub fn new(source_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            content: content.into(),
            format: None,
        }
    }

    pub fn format(&self) -> FormatHint {
        self.format
            .unwrap_or_else(|| FormatHint::from_path(&self.source_path))
    }
}

/// A page that failed a stage, reported alongside the pages that succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub source_path: String,
    pub error: String,
}

/// Navigation tree item.
///
/// Directory groups carry an empty `path` and list their pages as children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}

impl NavItem {
    pub fn is_group(&self) -> bool {
        self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(FormatHint::from_path("a/b.md"), FormatHint::Markdown);
        assert_eq!(FormatHint::from_path("A.MARKDOWN"), FormatHint::Markdown);
        assert_eq!(FormatHint::from_path("api.htm"), FormatHint::Html);
        assert_eq!(FormatHint::from_path("notes.rst"), FormatHint::ReStructuredText);
        assert_eq!(FormatHint::from_path("CHANGELOG"), FormatHint::PlainText);
        assert_eq!(FormatHint::from_path("v1.0/notes.txt"), FormatHint::PlainText);
        assert_eq!(FormatHint::from_path(".md"), FormatHint::PlainText);
    }

    #[test]
    fn explicit_format_wins() {
        let mut page = RawPage::new("docs/page", "<p>x</p>");
        assert_eq!(page.format(), FormatHint::PlainText);
        page.format = Some(FormatHint::Html);
        assert_eq!(page.format(), FormatHint::Html);
    }

    #[test]
    fn format_serializes_short_names() {
        let json = serde_json::to_string(&FormatHint::ReStructuredText).unwrap();
        assert_eq!(json, "\"rst\"");
        let back: FormatHint = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(back, FormatHint::PlainText);
    }
}
