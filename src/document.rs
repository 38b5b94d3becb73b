//! Document model shared by every pipeline stage.
//!
//! A [`Document`] is one source page represented as an ordered sequence of
//! [`Segment`]s. Each segment has a [`SegmentKind`] drawn from a closed set;
//! parser, translator and builder all dispatch on that kind with exhaustive
//! matches, so adding a kind is a compile error everywhere it matters.
//!
//! ## Leaves and containers
//!
//! | Kind | Shape | Translatable |
//! |------|-------|--------------|
//! | `PlainText` | leaf, text | yes |
//! | `Image` | leaf, text = alt | yes (alt only) |
//! | `InlineCode`, `CodeBlock`, `RawHtml` | leaf, text | never |
//! | `LineBreak`, `Rule` | leaf, no text | n/a |
//! | `Heading`, `Paragraph`, `ListItem`, `Link`, `Emphasis`, `Strong`, `Strikethrough`, `BlockQuote`, `Table`, `TableRow`, `TableCell` | children only | via children |
//!
//! Attributes of a kind (`href`, `src`, code `language`, titles) are never
//! translatable. Autolinks, whose visible text *is* the URL, are not
//! translatable either.
//!
//! ## Lifecycle
//!
//! Created by the parser, cloned and rewritten (segment `text` only) by the
//! translator, read by the builder. [`validate`] checks the containment rules
//! after parsing.

use crate::types::FormatHint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Metadata key under which a page-level parse failure is recorded.
pub const PARSE_ERROR_KEY: &str = "parse_error";

/// Metadata keys accepted as an explicit navigation ordering hint.
pub const ORDER_KEYS: &[&str] = &["order", "weight", "nav_order"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("{path}: {parent} cannot contain {child}")]
    DisallowedChild {
        path: String,
        parent: &'static str,
        child: &'static str,
    },
    #[error("{path}: {kind} is a leaf and cannot have children")]
    LeafWithChildren { path: String, kind: &'static str },
    #[error("{path}: {kind} is missing required field `{field}`")]
    MissingField {
        path: String,
        kind: &'static str,
        field: &'static str,
    },
    #[error("{path}: {kind} must not carry text")]
    UnexpectedText { path: String, kind: &'static str },
    #[error("{path}: heading level {level} is outside 1-6")]
    InvalidHeadingLevel { path: String, level: u8 },
}

/// Marker of a list item: bullet, or the item's number in an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMarker {
    Bullet,
    Ordered(u64),
}

impl ListMarker {
    pub fn is_ordered(&self) -> bool {
        matches!(self, ListMarker::Ordered(_))
    }
}

/// Horizontal alignment of a table column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlign {
    #[default]
    None,
    Left,
    Center,
    Right,
}

impl ColumnAlign {
    /// CSS `text-align` value, if any.
    pub fn css(&self) -> Option<&'static str> {
        match self {
            ColumnAlign::None => None,
            ColumnAlign::Left => Some("left"),
            ColumnAlign::Center => Some("center"),
            ColumnAlign::Right => Some("right"),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The closed set of segment kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentKind {
    Heading {
        level: u8,
    },
    Paragraph,
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    InlineCode,
    Link {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        autolink: bool,
    },
    Image {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    ListItem {
        depth: u8,
        marker: ListMarker,
    },
    Table {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        alignments: Vec<ColumnAlign>,
    },
    TableRow {
        #[serde(default, skip_serializing_if = "is_false")]
        header: bool,
    },
    TableCell,
    BlockQuote,
    Emphasis,
    Strong,
    Strikethrough,
    LineBreak,
    Rule,
    RawHtml,
    PlainText,
}

impl SegmentKind {
    /// Short stable name, used in error messages and kind sequences.
    pub fn name(&self) -> &'static str {
        match self {
            SegmentKind::Heading { .. } => "heading",
            SegmentKind::Paragraph => "paragraph",
            SegmentKind::CodeBlock { .. } => "code_block",
            SegmentKind::InlineCode => "inline_code",
            SegmentKind::Link { .. } => "link",
            SegmentKind::Image { .. } => "image",
            SegmentKind::ListItem { .. } => "list_item",
            SegmentKind::Table { .. } => "table",
            SegmentKind::TableRow { .. } => "table_row",
            SegmentKind::TableCell => "table_cell",
            SegmentKind::BlockQuote => "block_quote",
            SegmentKind::Emphasis => "emphasis",
            SegmentKind::Strong => "strong",
            SegmentKind::Strikethrough => "strikethrough",
            SegmentKind::LineBreak => "line_break",
            SegmentKind::Rule => "rule",
            SegmentKind::RawHtml => "raw_html",
            SegmentKind::PlainText => "plain_text",
        }
    }

    /// Whether text carried by this segment (or its descendants) may be translated.
    pub fn is_translatable(&self) -> bool {
        match self {
            SegmentKind::CodeBlock { .. }
            | SegmentKind::InlineCode
            | SegmentKind::RawHtml
            | SegmentKind::LineBreak
            | SegmentKind::Rule => false,
            SegmentKind::Link { autolink, .. } => !autolink,
            SegmentKind::Heading { .. }
            | SegmentKind::Paragraph
            | SegmentKind::Image { .. }
            | SegmentKind::ListItem { .. }
            | SegmentKind::Table { .. }
            | SegmentKind::TableRow { .. }
            | SegmentKind::TableCell
            | SegmentKind::BlockQuote
            | SegmentKind::Emphasis
            | SegmentKind::Strong
            | SegmentKind::Strikethrough
            | SegmentKind::PlainText => true,
        }
    }

    /// Leaves never have children.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            SegmentKind::PlainText
                | SegmentKind::InlineCode
                | SegmentKind::CodeBlock { .. }
                | SegmentKind::RawHtml
                | SegmentKind::Image { .. }
                | SegmentKind::LineBreak
                | SegmentKind::Rule
        )
    }

    /// Leaves whose content lives in `text`.
    pub fn carries_text(&self) -> bool {
        matches!(
            self,
            SegmentKind::PlainText
                | SegmentKind::InlineCode
                | SegmentKind::CodeBlock { .. }
                | SegmentKind::RawHtml
                | SegmentKind::Image { .. }
        )
    }

    /// Kinds that may appear inside a run of inline content.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            SegmentKind::PlainText
                | SegmentKind::InlineCode
                | SegmentKind::Link { .. }
                | SegmentKind::Image { .. }
                | SegmentKind::Emphasis
                | SegmentKind::Strong
                | SegmentKind::Strikethrough
                | SegmentKind::LineBreak
                | SegmentKind::RawHtml
        )
    }
}

/// Atomic classified unit of page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Segment>,
}

impl Segment {
    pub fn leaf(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    pub fn container(kind: SegmentKind, children: Vec<Segment>) -> Self {
        Self {
            kind,
            text: None,
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::leaf(SegmentKind::PlainText, text)
    }

    pub fn inline_code(code: impl Into<String>) -> Self {
        Self::leaf(SegmentKind::InlineCode, code)
    }

    pub fn code_block(language: Option<String>, code: impl Into<String>) -> Self {
        Self::leaf(SegmentKind::CodeBlock { language }, code)
    }

    pub fn raw_html(html: impl Into<String>) -> Self {
        Self::leaf(SegmentKind::RawHtml, html)
    }

    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self::leaf(
            SegmentKind::Image {
                src: src.into(),
                title: None,
            },
            alt,
        )
    }

    pub fn heading(level: u8, children: Vec<Segment>) -> Self {
        Self::container(SegmentKind::Heading { level }, children)
    }

    pub fn paragraph(children: Vec<Segment>) -> Self {
        Self::container(SegmentKind::Paragraph, children)
    }

    pub fn link(href: impl Into<String>, children: Vec<Segment>) -> Self {
        Self::container(
            SegmentKind::Link {
                href: href.into(),
                title: None,
                autolink: false,
            },
            children,
        )
    }

    pub fn list_item(depth: u8, marker: ListMarker, children: Vec<Segment>) -> Self {
        Self::container(SegmentKind::ListItem { depth, marker }, children)
    }

    pub fn line_break() -> Self {
        Self::container(SegmentKind::LineBreak, Vec::new())
    }

    pub fn rule() -> Self {
        Self::container(SegmentKind::Rule, Vec::new())
    }

    pub fn translatable(&self) -> bool {
        self.kind.is_translatable()
    }

    /// Human-readable text of this segment and its descendants.
    ///
    /// Used for titles, heading anchors and summaries. Raw HTML is skipped;
    /// inline code and image alt text are included.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text_content(&mut out);
        out
    }

    fn push_text_content(&self, out: &mut String) {
        match &self.kind {
            SegmentKind::RawHtml | SegmentKind::Rule => {}
            SegmentKind::LineBreak => out.push(' '),
            _ => {
                if let Some(text) = &self.text {
                    out.push_str(text);
                }
                for child in &self.children {
                    child.push_text_content(out);
                }
            }
        }
    }

    /// Depth-first visit of this segment and all descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Segment)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

/// One source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_path: String,
    pub title: String,
    pub format: FormatHint,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Heading ids in reading order, slugged from the source-language text
    /// so fragment links survive translation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
}

impl Document {
    /// Empty document titled from its file name.
    pub fn new(source_path: impl Into<String>, format: FormatHint) -> Self {
        let source_path = source_path.into();
        Self {
            title: crate::naming::title_from_path(&source_path),
            source_path,
            format,
            segments: Vec::new(),
            metadata: BTreeMap::new(),
            anchors: Vec::new(),
        }
    }

    /// Empty document recording a page-level parse failure.
    pub fn failed(source_path: impl Into<String>, format: FormatHint, message: &str) -> Self {
        let mut doc = Self::new(source_path, format);
        doc.metadata
            .insert(PARSE_ERROR_KEY.to_string(), message.to_string());
        doc
    }

    pub fn parse_error(&self) -> Option<&str> {
        self.metadata.get(PARSE_ERROR_KEY).map(String::as_str)
    }

    /// First top-level heading of the given level.
    pub fn first_heading(&self, level: u8) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.kind == SegmentKind::Heading { level })
    }

    /// Explicit navigation ordering hint from metadata, if any.
    pub fn order_hint(&self) -> Option<i64> {
        ORDER_KEYS
            .iter()
            .find_map(|key| self.metadata.get(*key)?.trim().parse().ok())
    }

    /// Unique ids for every heading, in reading order.
    ///
    /// Duplicates get `-1`, `-2`, … suffixes in order of appearance.
    pub fn heading_ids(&self) -> Vec<String> {
        let mut used = HashSet::new();
        let mut ids = Vec::new();
        self.visit(&mut |seg| {
            if let SegmentKind::Heading { .. } = seg.kind {
                let base = crate::naming::slugify(seg.text_content().trim());
                let mut id = base.clone();
                let mut n = 0;
                while used.contains(&id) {
                    n += 1;
                    id = format!("{base}-{n}");
                }
                used.insert(id.clone());
                ids.push(id);
            }
        });
        ids
    }

    /// Kind names of the top-level segments, in order.
    pub fn kind_sequence(&self) -> Vec<&'static str> {
        self.segments.iter().map(|s| s.kind.name()).collect()
    }

    /// Depth-first visit of every segment in the document.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Segment)) {
        for segment in &self.segments {
            segment.visit(f);
        }
    }

    /// Number of segments, counting nested ones.
    pub fn segment_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }
}

/// Check segment nesting and required fields.
pub fn validate(document: &Document) -> Result<(), StructuralError> {
    for (i, segment) in document.segments.iter().enumerate() {
        let path = format!("segments[{i}]");
        if !child_allowed(None, &segment.kind) {
            return Err(StructuralError::DisallowedChild {
                path,
                parent: "document",
                child: segment.kind.name(),
            });
        }
        validate_segment(segment, &path)?;
    }
    Ok(())
}

fn validate_segment(segment: &Segment, path: &str) -> Result<(), StructuralError> {
    let kind = segment.kind.name();
    match &segment.kind {
        SegmentKind::Heading { level } if !(1..=6).contains(level) => {
            return Err(StructuralError::InvalidHeadingLevel {
                path: path.to_string(),
                level: *level,
            });
        }
        SegmentKind::Link { href, .. } if href.is_empty() => {
            return Err(StructuralError::MissingField {
                path: path.to_string(),
                kind,
                field: "href",
            });
        }
        SegmentKind::Image { src, .. } if src.is_empty() => {
            return Err(StructuralError::MissingField {
                path: path.to_string(),
                kind,
                field: "src",
            });
        }
        _ => {}
    }

    if segment.kind.carries_text() && segment.text.is_none() {
        return Err(StructuralError::MissingField {
            path: path.to_string(),
            kind,
            field: "text",
        });
    }
    if !segment.kind.carries_text() && segment.text.is_some() {
        return Err(StructuralError::UnexpectedText {
            path: path.to_string(),
            kind,
        });
    }
    if segment.kind.is_leaf() && !segment.children.is_empty() {
        return Err(StructuralError::LeafWithChildren {
            path: path.to_string(),
            kind,
        });
    }

    for (i, child) in segment.children.iter().enumerate() {
        let child_path = format!("{path}.children[{i}]");
        if !child_allowed(Some(&segment.kind), &child.kind) {
            return Err(StructuralError::DisallowedChild {
                path: child_path,
                parent: kind,
                child: child.kind.name(),
            });
        }
        validate_segment(child, &child_path)?;
    }
    Ok(())
}

/// Containment table. `parent == None` is the document's top level.
fn child_allowed(parent: Option<&SegmentKind>, child: &SegmentKind) -> bool {
    let table_part = matches!(child, SegmentKind::TableRow { .. } | SegmentKind::TableCell);
    match parent {
        None => !table_part,
        Some(SegmentKind::Table { .. }) => matches!(child, SegmentKind::TableRow { .. }),
        Some(SegmentKind::TableRow { .. }) => matches!(child, SegmentKind::TableCell),
        Some(SegmentKind::Link { .. }) => {
            child.is_inline() && !matches!(child, SegmentKind::Link { .. })
        }
        Some(
            SegmentKind::Heading { .. }
            | SegmentKind::Emphasis
            | SegmentKind::Strong
            | SegmentKind::Strikethrough
            | SegmentKind::TableCell,
        ) => child.is_inline(),
        Some(SegmentKind::Paragraph) => {
            child.is_inline() || matches!(child, SegmentKind::CodeBlock { .. })
        }
        Some(SegmentKind::ListItem { .. } | SegmentKind::BlockQuote) => !table_part,
        Some(
            SegmentKind::PlainText
            | SegmentKind::InlineCode
            | SegmentKind::CodeBlock { .. }
            | SegmentKind::RawHtml
            | SegmentKind::Image { .. }
            | SegmentKind::LineBreak
            | SegmentKind::Rule,
        ) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(segments: Vec<Segment>) -> Document {
        let mut d = Document::new("guide/intro.md", FormatHint::Markdown);
        d.segments = segments;
        d
    }

    #[test]
    fn translatable_is_derived_from_kind() {
        assert!(Segment::text("hello").translatable());
        assert!(Segment::heading(1, vec![]).translatable());
        assert!(Segment::image("a.png", "alt").translatable());
        assert!(!Segment::code_block(None, "x").translatable());
        assert!(!Segment::inline_code("x").translatable());
        assert!(!Segment::raw_html("<div></div>").translatable());
    }

    #[test]
    fn autolink_is_not_translatable() {
        let link = Segment::container(
            SegmentKind::Link {
                href: "https://example.com".into(),
                title: None,
                autolink: true,
            },
            vec![Segment::text("https://example.com")],
        );
        assert!(!link.translatable());
        assert!(Segment::link("x.html", vec![Segment::text("x")]).translatable());
    }

    #[test]
    fn text_content_flattens_inline_runs() {
        let heading = Segment::heading(
            1,
            vec![
                Segment::text("The "),
                Segment::inline_code("parse"),
                Segment::text(" function"),
            ],
        );
        assert_eq!(heading.text_content(), "The parse function");
    }

    #[test]
    fn text_content_skips_raw_html() {
        let p = Segment::paragraph(vec![
            Segment::text("a"),
            Segment::raw_html("<span>"),
            Segment::text("b"),
        ]);
        assert_eq!(p.text_content(), "ab");
    }

    #[test]
    fn valid_document_passes() {
        let d = doc(vec![
            Segment::heading(1, vec![Segment::text("Title")]),
            Segment::paragraph(vec![
                Segment::text("See "),
                Segment::link("other.md", vec![Segment::inline_code("other")]),
            ]),
            Segment::code_block(Some("py".into()), "print('hi')"),
            Segment::list_item(
                0,
                ListMarker::Bullet,
                vec![
                    Segment::text("item"),
                    Segment::code_block(None, "x = 1"),
                    Segment::list_item(1, ListMarker::Ordered(1), vec![Segment::text("n")]),
                ],
            ),
        ]);
        assert_eq!(validate(&d), Ok(()));
    }

    #[test]
    fn code_block_with_children_is_rejected() {
        let mut code = Segment::code_block(None, "x");
        code.children.push(Segment::text("nested"));
        let err = validate(&doc(vec![code])).unwrap_err();
        assert!(matches!(err, StructuralError::LeafWithChildren { kind: "code_block", .. }));
    }

    #[test]
    fn link_without_href_is_rejected() {
        let d = doc(vec![Segment::paragraph(vec![Segment::link(
            "",
            vec![Segment::text("x")],
        )])]);
        let err = validate(&d).unwrap_err();
        assert_eq!(
            err,
            StructuralError::MissingField {
                path: "segments[0].children[0]".into(),
                kind: "link",
                field: "href",
            }
        );
    }

    #[test]
    fn image_without_src_is_rejected() {
        let d = doc(vec![Segment::paragraph(vec![Segment::image("", "alt")])]);
        assert!(matches!(
            validate(&d),
            Err(StructuralError::MissingField { field: "src", .. })
        ));
    }

    #[test]
    fn heading_level_out_of_range_is_rejected() {
        let d = doc(vec![Segment::heading(7, vec![Segment::text("x")])]);
        assert!(matches!(
            validate(&d),
            Err(StructuralError::InvalidHeadingLevel { level: 7, .. })
        ));
    }

    #[test]
    fn code_block_inside_heading_is_rejected() {
        let d = doc(vec![Segment::heading(
            2,
            vec![Segment::code_block(None, "x")],
        )]);
        assert!(matches!(
            validate(&d),
            Err(StructuralError::DisallowedChild {
                parent: "heading",
                child: "code_block",
                ..
            })
        ));
    }

    #[test]
    fn nested_links_are_rejected() {
        let d = doc(vec![Segment::paragraph(vec![Segment::link(
            "a",
            vec![Segment::link("b", vec![Segment::text("x")])],
        )])]);
        assert!(matches!(
            validate(&d),
            Err(StructuralError::DisallowedChild { parent: "link", child: "link", .. })
        ));
    }

    #[test]
    fn table_only_holds_rows_and_cells() {
        let good = Segment::container(
            SegmentKind::Table { alignments: vec![] },
            vec![Segment::container(
                SegmentKind::TableRow { header: true },
                vec![Segment::container(SegmentKind::TableCell, vec![Segment::text("h")])],
            )],
        );
        assert_eq!(validate(&doc(vec![good])), Ok(()));

        let bad = Segment::container(
            SegmentKind::Table { alignments: vec![] },
            vec![Segment::paragraph(vec![Segment::text("x")])],
        );
        assert!(validate(&doc(vec![bad])).is_err());

        let stray_row = Segment::container(SegmentKind::TableRow { header: false }, vec![]);
        assert!(validate(&doc(vec![stray_row])).is_err());
    }

    #[test]
    fn container_with_text_is_rejected() {
        let mut p = Segment::paragraph(vec![]);
        p.text = Some("oops".into());
        assert!(matches!(
            validate(&doc(vec![p])),
            Err(StructuralError::UnexpectedText { kind: "paragraph", .. })
        ));
    }

    #[test]
    fn failed_document_records_error() {
        let d = Document::failed("broken.md", FormatHint::Markdown, "bad frontmatter");
        assert!(d.segments.is_empty());
        assert_eq!(d.parse_error(), Some("bad frontmatter"));
        assert_eq!(d.title, "Broken");
    }

    #[test]
    fn order_hint_reads_known_keys() {
        let mut d = doc(vec![]);
        assert_eq!(d.order_hint(), None);
        d.metadata.insert("weight".into(), " 20 ".into());
        assert_eq!(d.order_hint(), Some(20));
        d.metadata.insert("order".into(), "-1".into());
        assert_eq!(d.order_hint(), Some(-1));
    }

    #[test]
    fn unparsable_order_falls_back_to_weight() {
        let mut d = doc(vec![]);
        d.metadata.insert("order".into(), "abc".into());
        d.metadata.insert("weight".into(), "7".into());
        assert_eq!(d.order_hint(), Some(7));
    }

    #[test]
    fn heading_ids_are_unique() {
        let d = doc(vec![
            Segment::heading(1, vec![Segment::text("Setup")]),
            Segment::heading(2, vec![Segment::text("Setup")]),
            Segment::heading(2, vec![Segment::text("Next Steps")]),
        ]);
        assert_eq!(d.heading_ids(), vec!["setup", "setup-1", "next-steps"]);
    }

    #[test]
    fn document_survives_json_storage() {
        let d = doc(vec![
            Segment::heading(1, vec![Segment::text("Title")]),
            Segment::list_item(0, ListMarker::Ordered(3), vec![Segment::text("three")]),
        ]);
        let json = serde_json::to_string(&d).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
