//! Segment → HTML markup.
//!
//! One rule per [`SegmentKind`], matched exhaustively:
//!
//! | Kind | Markup |
//! |------|--------|
//! | `Heading` | `h1`–`h6` with a stable `id` |
//! | `Paragraph` | `p` (a `div.paragraph` when it holds a code block) |
//! | `CodeBlock` | `pre > code.language-*`, whitespace preserved |
//! | `ListItem` runs | `ul`/`ol` (with `start`) of `li` |
//! | `Table` | `table` with `thead` for header rows, column alignment inline |
//! | `Link` | `a` with the original href, or the page it points to inside the site |
//! | `RawHtml` | emitted verbatim |
//!
//! Consecutive list items of the same depth and marker type form one list;
//! nested lists are already children of their parent item.

use crate::document::{ColumnAlign, Document, ListMarker, Segment, SegmentKind};
use crate::naming;
use maud::{Markup, PreEscaped, html};
use std::collections::{HashMap, HashSet};

/// Maps links between documents of one site to page paths.
#[derive(Debug, Default, Clone)]
pub struct LinkMap {
    by_source: HashMap<String, String>,
    pages: HashSet<String>,
}

impl LinkMap {
    pub fn new<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut map = Self::default();
        for doc in documents {
            let page = naming::page_path(&doc.source_path);
            let (source, _) = naming::resolve_link("", &doc.source_path);
            map.by_source.insert(source, page.clone());
            map.pages.insert(page);
        }
        map
    }

    /// Page a link inside `from_source` points to, as an href relative to
    /// `from_page`. `None` for external links and links to files that are
    /// not pages of the site.
    pub fn rewrite(&self, from_source: &str, from_page: &str, href: &str) -> Option<String> {
        if !naming::is_relative_link(href) {
            return None;
        }
        let (target, fragment) = naming::resolve_link(from_source, href);
        let page = match self.by_source.get(&target) {
            Some(page) => page.clone(),
            None => {
                let page = naming::page_path(&target);
                if !self.pages.contains(&page) {
                    return None;
                }
                page
            }
        };
        let mut out = naming::relative_href(from_page, &page);
        if let Some(fragment) = fragment {
            out.push('#');
            out.push_str(fragment);
        }
        Some(out)
    }
}

/// A heading of a page and its anchor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingAnchor {
    pub level: u8,
    pub text: String,
    pub id: String,
}

/// Every heading of the document in reading order, with unique ids.
///
/// Ids recorded at parse time win, so a translated page keeps the ids of
/// its source; otherwise they are slugged from the current text.
pub fn heading_anchors(doc: &Document) -> Vec<HeadingAnchor> {
    let mut headings = Vec::new();
    doc.visit(&mut |seg| {
        if let SegmentKind::Heading { level } = seg.kind {
            headings.push((level, seg.text_content().trim().to_string()));
        }
    });
    let ids = if doc.anchors.len() == headings.len() {
        doc.anchors.clone()
    } else {
        doc.heading_ids()
    };
    headings
        .into_iter()
        .zip(ids)
        .map(|((level, text), id)| HeadingAnchor { level, text, id })
        .collect()
}

enum Run<'s> {
    Single(&'s Segment),
    List(&'s [Segment]),
}

fn runs(segments: &[Segment]) -> Vec<Run<'_>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < segments.len() {
        let SegmentKind::ListItem { depth, marker } = segments[i].kind else {
            out.push(Run::Single(&segments[i]));
            i += 1;
            continue;
        };
        let end = segments[i..]
            .iter()
            .position(|s| match s.kind {
                SegmentKind::ListItem {
                    depth: d,
                    marker: m,
                } => d != depth || m.is_ordered() != marker.is_ordered(),
                _ => true,
            })
            .map_or(segments.len(), |n| i + n);
        out.push(Run::List(&segments[i..end]));
        i = end;
    }
    out
}

/// Renders the segments of one page.
pub struct PageRenderer<'a> {
    source_path: &'a str,
    page_path: &'a str,
    links: &'a LinkMap,
    anchors: &'a [HeadingAnchor],
    next_anchor: usize,
}

impl<'a> PageRenderer<'a> {
    pub fn new(
        source_path: &'a str,
        page_path: &'a str,
        links: &'a LinkMap,
        anchors: &'a [HeadingAnchor],
    ) -> Self {
        Self {
            source_path,
            page_path,
            links,
            anchors,
            next_anchor: 0,
        }
    }

    pub fn render(&mut self, segments: &[Segment]) -> Markup {
        self.children(segments)
    }

    fn children(&mut self, segments: &[Segment]) -> Markup {
        html! {
            @for run in runs(segments) {
                @match run {
                    Run::Single(segment) => { (self.segment(segment)) }
                    Run::List(items) => { (self.list(items)) }
                }
            }
        }
    }

    fn next_id(&mut self, heading: &Segment) -> String {
        let id = self
            .anchors
            .get(self.next_anchor)
            .map(|a| a.id.clone())
            .unwrap_or_else(|| naming::slugify(&heading.text_content()));
        self.next_anchor += 1;
        id
    }

    fn href(&self, href: &str) -> String {
        self.links
            .rewrite(self.source_path, self.page_path, href)
            .unwrap_or_else(|| href.to_string())
    }

    fn segment(&mut self, seg: &Segment) -> Markup {
        let text = seg.text.as_deref().unwrap_or_default();
        match &seg.kind {
            SegmentKind::Heading { level } => {
                let id = self.next_id(seg);
                let content = self.children(&seg.children);
                match level {
                    1 => html! { h1 id=(id) { (content) } },
                    2 => html! { h2 id=(id) { (content) } },
                    3 => html! { h3 id=(id) { (content) } },
                    4 => html! { h4 id=(id) { (content) } },
                    5 => html! { h5 id=(id) { (content) } },
                    _ => html! { h6 id=(id) { (content) } },
                }
            }
            SegmentKind::Paragraph => {
                let content = self.children(&seg.children);
                let holds_block = seg
                    .children
                    .iter()
                    .any(|c| matches!(c.kind, SegmentKind::CodeBlock { .. }));
                if holds_block {
                    html! { div.paragraph { (content) } }
                } else {
                    html! { p { (content) } }
                }
            }
            SegmentKind::CodeBlock { language } => {
                let class = language.as_ref().map(|l| format!("language-{l}"));
                html! { pre { code class=[class] { (text) } } }
            }
            SegmentKind::InlineCode => html! { code { (text) } },
            SegmentKind::Link { href, title, .. } => {
                let target = self.href(href);
                html! { a href=(target) title=[title.as_deref()] { (self.children(&seg.children)) } }
            }
            SegmentKind::Image { src, title } => {
                html! { img src=(src) alt=(text) title=[title.as_deref()]; }
            }
            SegmentKind::ListItem { .. } => self.list(std::slice::from_ref(seg)),
            SegmentKind::Table { alignments } => {
                let (head, body): (Vec<&Segment>, Vec<&Segment>) = seg
                    .children
                    .iter()
                    .partition(|r| matches!(r.kind, SegmentKind::TableRow { header: true }));
                html! {
                    table {
                        @if !head.is_empty() {
                            thead {
                                @for row in &head { (self.row(row, alignments)) }
                            }
                        }
                        tbody {
                            @for row in &body { (self.row(row, alignments)) }
                        }
                    }
                }
            }
            SegmentKind::TableRow { .. } => self.row(seg, &[]),
            SegmentKind::TableCell => html! { td { (self.children(&seg.children)) } },
            SegmentKind::BlockQuote => {
                html! { blockquote { (self.children(&seg.children)) } }
            }
            SegmentKind::Emphasis => html! { em { (self.children(&seg.children)) } },
            SegmentKind::Strong => html! { strong { (self.children(&seg.children)) } },
            SegmentKind::Strikethrough => html! { del { (self.children(&seg.children)) } },
            SegmentKind::LineBreak => html! { br; },
            SegmentKind::Rule => html! { hr; },
            SegmentKind::RawHtml => html! { (PreEscaped(text)) },
            SegmentKind::PlainText => html! { (text) },
        }
    }

    fn list(&mut self, items: &[Segment]) -> Markup {
        let start = items.first().and_then(|item| match item.kind {
            SegmentKind::ListItem {
                marker: ListMarker::Ordered(n),
                ..
            } => Some(n),
            _ => None,
        });
        match start {
            Some(n) => html! {
                ol start=[(n != 1).then_some(n)] {
                    @for item in items { li { (self.children(&item.children)) } }
                }
            },
            None => html! {
                ul {
                    @for item in items { li { (self.children(&item.children)) } }
                }
            },
        }
    }

    fn row(&mut self, row: &Segment, alignments: &[ColumnAlign]) -> Markup {
        let header = matches!(row.kind, SegmentKind::TableRow { header: true });
        html! {
            tr {
                @for (i, cell) in row.children.iter().enumerate() {
                    @let style = alignments
                        .get(i)
                        .and_then(ColumnAlign::css)
                        .map(|a| format!("text-align: {a}"));
                    @if header {
                        th style=[style] { (self.children(&cell.children)) }
                    } @else {
                        td style=[style] { (self.children(&cell.children)) }
                    }
                }
            }
        }
    }
}

/// Render a whole document body with in-site links rewritten.
pub fn render_document(doc: &Document, page_path: &str, links: &LinkMap) -> (Markup, Vec<HeadingAnchor>) {
    let anchors = heading_anchors(doc);
    let body = PageRenderer::new(&doc.source_path, page_path, links, &anchors).render(&doc.segments);
    (body, anchors)
}
