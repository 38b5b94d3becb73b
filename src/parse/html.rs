//! HTML → segments.
//!
//! The page is parsed with html5ever into an `RcDom`, then walked from the
//! content root (`<main>`, else `<article>`, else `<body>`). Block elements
//! map onto block segments; loose inline content between blocks becomes an
//! implicit paragraph, except directly inside list items where it stays
//! inline (matching tight Markdown lists).
//!
//! Scripts, styles, forms, embedded media and unrecognized elements are kept
//! verbatim as `RawHtml`. Comments are not content.

use super::frontmatter::Metadata;
use crate::document::{ColumnAlign, ListMarker, Segment, SegmentKind};
use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// Segments and head metadata of one HTML page.
#[derive(Debug, Default)]
pub struct HtmlPage {
    pub segments: Vec<Segment>,
    pub metadata: Metadata,
}

/// Elements serialized verbatim.
const RAW_TAGS: &[&str] = &[
    "script", "style", "iframe", "form", "video", "audio", "object", "embed", "canvas", "svg",
    "math", "noscript", "template", "select", "textarea", "input", "button", "picture", "map",
];

/// Elements whose children are walked as blocks in their place.
const BLOCK_CONTAINERS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "figure", "figcaption", "details", "summary", "dl", "dt", "dd", "center", "address",
    "hgroup", "fieldset",
];

/// Inline elements without a segment of their own.
const INLINE_TRANSPARENT: &[&str] = &[
    "span", "abbr", "kbd", "sup", "sub", "small", "mark", "u", "q", "cite", "time", "label",
    "var", "samp", "font", "bdi", "bdo", "dfn", "ins", "data", "big", "nobr", "wbr",
];

/// Head-only elements, read for metadata and otherwise ignored.
const SKIPPED: &[&str] = &["head", "title", "meta", "link", "base"];

pub fn parse(body: &str) -> HtmlPage {
    let dom = parse_document(RcDom::default(), Default::default()).one(body);
    let metadata = head_metadata(&dom.document);
    let root = ["main", "article", "body"]
        .iter()
        .find_map(|tag| find_element(&dom.document, tag))
        .unwrap_or_else(|| dom.document.clone());
    let mut walker = Walker { list_depth: 0 };
    HtmlPage {
        segments: walker.blocks(&root, true),
        metadata,
    }
}

fn head_metadata(document: &Handle) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(title) = find_element(document, "title") {
        let text = collapse_whitespace(&raw_text(&title));
        let text = text.trim();
        if !text.is_empty() {
            metadata.insert("title".to_string(), text.to_string());
        }
    }
    let mut metas = Vec::new();
    collect_elements(document, "meta", &mut metas);
    for meta in metas {
        if let (Some(name), Some(content)) = (attr(&meta, "name"), attr(&meta, "content")) {
            metadata.insert(name.to_lowercase(), content);
        }
    }
    metadata
}

struct Walker {
    list_depth: u8,
}

impl Walker {
    /// Walk children of a block container.
    fn blocks(&mut self, node: &Handle, wrap_inline: bool) -> Vec<Segment> {
        let mut out = Vec::new();
        let mut run = Vec::new();
        for child in node.children.borrow().iter() {
            match &child.data {
                NodeData::Text { contents } => {
                    push_text(&mut run, &collapse_whitespace(&contents.borrow()));
                }
                NodeData::Element { name, .. } => {
                    let tag: &str = &name.local;
                    if is_block(tag) {
                        flush(&mut out, &mut run, wrap_inline);
                        self.block_element(child, tag, &mut out);
                    } else {
                        self.inline_node(child, &mut run, false);
                    }
                }
                _ => {}
            }
        }
        flush(&mut out, &mut run, wrap_inline);
        out
    }

    fn block_element(&mut self, node: &Handle, tag: &str, out: &mut Vec<Segment>) {
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag.as_bytes()[1] - b'0';
                let mut run = self.inline_children(node, false);
                trim_run(&mut run);
                out.push(Segment::heading(level, run));
            }
            "p" => {
                let mut run = self.inline_children(node, false);
                trim_run(&mut run);
                if !run.is_empty() {
                    out.push(Segment::paragraph(run));
                }
            }
            "pre" => out.push(Segment::code_block(code_language(node), raw_text(node))),
            "ul" | "ol" => self.list(node, tag == "ol", out),
            "li" => out.push(self.list_item(node, ListMarker::Bullet)),
            "table" => self.table(node, out),
            "blockquote" => out.push(Segment::container(
                SegmentKind::BlockQuote,
                self.blocks(node, true),
            )),
            "hr" => out.push(Segment::rule()),
            t if SKIPPED.contains(&t) => {}
            _ => out.extend(self.blocks(node, true)),
        }
    }

    fn list(&mut self, node: &Handle, ordered: bool, out: &mut Vec<Segment>) {
        let mut next = attr(node, "start")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(1);
        for child in node.children.borrow().iter() {
            let marker = if ordered {
                ListMarker::Ordered(next)
            } else {
                ListMarker::Bullet
            };
            match &child.data {
                NodeData::Element { .. } => {
                    out.push(self.list_item(child, marker));
                    next += 1;
                }
                NodeData::Text { contents } => {
                    let text = collapse_whitespace(&contents.borrow());
                    let text = text.trim();
                    if !text.is_empty() {
                        out.push(Segment::list_item(
                            self.list_depth,
                            marker,
                            vec![Segment::text(text)],
                        ));
                        next += 1;
                    }
                }
                _ => {}
            }
        }
    }

    fn list_item(&mut self, node: &Handle, marker: ListMarker) -> Segment {
        let depth = self.list_depth;
        self.list_depth = self.list_depth.saturating_add(1);
        let children = self.blocks(node, false);
        self.list_depth = depth;
        Segment::list_item(depth, marker, children)
    }

    fn table(&mut self, node: &Handle, out: &mut Vec<Segment>) {
        let mut rows = Vec::new();
        let mut captions = Vec::new();
        self.collect_rows(node, false, &mut rows, &mut captions);
        out.extend(captions);
        let alignments = rows
            .first()
            .map(|(_, aligns): &(Segment, Vec<ColumnAlign>)| aligns.clone())
            .unwrap_or_default();
        out.push(Segment::container(
            SegmentKind::Table { alignments },
            rows.into_iter().map(|(row, _)| row).collect(),
        ));
    }

    fn collect_rows(
        &mut self,
        node: &Handle,
        in_head: bool,
        rows: &mut Vec<(Segment, Vec<ColumnAlign>)>,
        captions: &mut Vec<Segment>,
    ) {
        for child in node.children.borrow().iter() {
            match element_name(child) {
                Some("thead") => self.collect_rows(child, true, rows, captions),
                Some("tbody") | Some("tfoot") => self.collect_rows(child, false, rows, captions),
                Some("tr") => rows.push(self.row(child, in_head)),
                Some("caption") => {
                    let mut run = self.inline_children(child, false);
                    trim_run(&mut run);
                    if !run.is_empty() {
                        captions.push(Segment::paragraph(run));
                    }
                }
                _ => {}
            }
        }
    }

    fn row(&mut self, node: &Handle, in_head: bool) -> (Segment, Vec<ColumnAlign>) {
        let mut cells = Vec::new();
        let mut aligns = Vec::new();
        let mut all_th = true;
        for child in node.children.borrow().iter() {
            let tag = match element_name(child) {
                Some(t @ ("td" | "th")) => t,
                _ => continue,
            };
            all_th &= tag == "th";
            aligns.push(cell_align(child));
            let mut run = self.inline_children(child, false);
            trim_run(&mut run);
            cells.push(Segment::container(SegmentKind::TableCell, run));
        }
        let header = in_head || (all_th && !cells.is_empty());
        (
            Segment::container(SegmentKind::TableRow { header }, cells),
            aligns,
        )
    }

    fn inline_children(&mut self, node: &Handle, in_link: bool) -> Vec<Segment> {
        let mut run = Vec::new();
        for child in node.children.borrow().iter() {
            self.inline_node(child, &mut run, in_link);
        }
        run
    }

    fn inline_node(&mut self, node: &Handle, run: &mut Vec<Segment>, in_link: bool) {
        let tag = match &node.data {
            NodeData::Text { contents } => {
                push_text(run, &collapse_whitespace(&contents.borrow()));
                return;
            }
            NodeData::Element { name, .. } => &*name.local,
            _ => return,
        };
        match tag {
            "a" => match attr(node, "href").filter(|h| !h.is_empty()) {
                Some(href) if !in_link => {
                    let children = self.inline_children(node, true);
                    let text: String = children.iter().map(Segment::text_content).collect();
                    let autolink = text.trim() == href;
                    run.push(Segment::container(
                        SegmentKind::Link {
                            href,
                            title: attr(node, "title").filter(|t| !t.is_empty()),
                            autolink,
                        },
                        children,
                    ));
                }
                _ => {
                    for child in node.children.borrow().iter() {
                        self.inline_node(child, run, in_link);
                    }
                }
            },
            "code" | "tt" | "pre" => run.push(Segment::inline_code(raw_text(node))),
            "em" | "i" => run.push(Segment::container(
                SegmentKind::Emphasis,
                self.inline_children(node, in_link),
            )),
            "strong" | "b" => run.push(Segment::container(
                SegmentKind::Strong,
                self.inline_children(node, in_link),
            )),
            "del" | "s" | "strike" => run.push(Segment::container(
                SegmentKind::Strikethrough,
                self.inline_children(node, in_link),
            )),
            "img" => match attr(node, "src").filter(|s| !s.is_empty()) {
                Some(src) => run.push(Segment::leaf(
                    SegmentKind::Image {
                        src,
                        title: attr(node, "title").filter(|t| !t.is_empty()),
                    },
                    attr(node, "alt").unwrap_or_default(),
                )),
                None => run.push(Segment::raw_html(serialize_node(node))),
            },
            "br" => run.push(Segment::line_break()),
            t if SKIPPED.contains(&t) => {}
            t if RAW_TAGS.contains(&t) => run.push(Segment::raw_html(serialize_node(node))),
            // Blocks met in inline context degrade to their inline content.
            t if INLINE_TRANSPARENT.contains(&t) || is_block(t) => {
                for child in node.children.borrow().iter() {
                    self.inline_node(child, run, in_link);
                }
            }
            _ => run.push(Segment::raw_html(serialize_node(node))),
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "h1" | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "p"
            | "pre"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "blockquote"
            | "hr"
    ) || BLOCK_CONTAINERS.contains(&tag)
        || SKIPPED.contains(&tag)
}

/// Close the pending inline run.
fn flush(out: &mut Vec<Segment>, run: &mut Vec<Segment>, wrap_inline: bool) {
    trim_run(run);
    if run.is_empty() {
        return;
    }
    let segments = std::mem::take(run);
    let only_raw = segments.iter().all(|s| s.kind == SegmentKind::RawHtml);
    if wrap_inline && !only_raw {
        out.push(Segment::paragraph(segments));
    } else {
        out.extend(segments);
    }
}

fn push_text(run: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = run.last_mut() {
        if last.kind == SegmentKind::PlainText {
            let buf = last.text.get_or_insert_with(String::new);
            // Collapsed whitespace never doubles up across text nodes.
            if buf.ends_with(' ') && text.starts_with(' ') {
                buf.push_str(&text[1..]);
            } else {
                buf.push_str(text);
            }
            return;
        }
    }
    run.push(Segment::text(text));
}

/// Strip whitespace at both ends of an inline run.
fn trim_run(run: &mut Vec<Segment>) {
    while let Some(first) = run.first_mut() {
        if first.kind != SegmentKind::PlainText {
            break;
        }
        let trimmed = first.text.as_deref().unwrap_or("").trim_start().to_string();
        if trimmed.is_empty() {
            run.remove(0);
        } else {
            first.text = Some(trimmed);
            break;
        }
    }
    while let Some(last) = run.last_mut() {
        if last.kind != SegmentKind::PlainText {
            break;
        }
        let trimmed = last.text.as_deref().unwrap_or("").trim_end().to_string();
        if trimmed.is_empty() {
            run.pop();
        } else {
            last.text = Some(trimmed);
            break;
        }
    }
}

/// Collapse runs of HTML whitespace into one space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{c}') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Concatenated text of all descendant text nodes, untouched.
fn raw_text(node: &Handle) -> String {
    let mut out = String::new();
    push_raw_text(node, &mut out);
    out
}

fn push_raw_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        NodeData::Element { name, .. } if &*name.local == "br" => out.push('\n'),
        _ => {
            for child in node.children.borrow().iter() {
                push_raw_text(child, out);
            }
        }
    }
}

fn element_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == attr_name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
    if element_name(node) == Some(tag) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn collect_elements(node: &Handle, tag: &str, found: &mut Vec<Handle>) {
    if element_name(node) == Some(tag) {
        found.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        collect_elements(child, tag, found);
    }
}

/// Language from `language-x`, `lang-x` or `highlight-x` classes on the
/// `<pre>` or its `<code>` child.
fn code_language(pre: &Handle) -> Option<String> {
    let mut classes = attr(pre, "class").unwrap_or_default();
    if let Some(code) = find_element(pre, "code") {
        classes.push(' ');
        classes.push_str(&attr(&code, "class").unwrap_or_default());
    }
    classes.split_whitespace().find_map(|class| {
        ["language-", "lang-", "highlight-"]
            .iter()
            .find_map(|prefix| class.strip_prefix(prefix))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

fn cell_align(cell: &Handle) -> ColumnAlign {
    let from_style = attr(cell, "style").and_then(|style| {
        style.split(';').find_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            (prop.trim().eq_ignore_ascii_case("text-align")).then(|| value.trim().to_lowercase())
        })
    });
    match from_style
        .or_else(|| attr(cell, "align").map(|a| a.to_lowercase()))
        .as_deref()
    {
        Some("left") => ColumnAlign::Left,
        Some("center") => ColumnAlign::Center,
        Some("right") => ColumnAlign::Right,
        _ => ColumnAlign::None,
    }
}

fn serialize_node(node: &Handle) -> String {
    let mut buf = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    match serialize(&mut buf, &handle, opts) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(e) => {
            log::warn!("could not serialize <{}>: {e}", element_name(node).unwrap_or("?"));
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(segments: &[Segment]) -> Vec<&'static str> {
        segments.iter().map(|s| s.kind.name()).collect()
    }

    #[test]
    fn head_metadata_is_extracted() {
        let page = parse(
            "<html><head><title> API  Reference </title>\
             <meta name=\"Author\" content=\"ann\"></head><body><p>x</p></body></html>",
        );
        assert_eq!(page.metadata["title"], "API Reference");
        assert_eq!(page.metadata["author"], "ann");
    }

    #[test]
    fn basic_blocks() {
        let page = parse(
            "<h1>Title</h1>\n<p>Hello   <em>big</em>\n world.</p>\
             <pre><code class=\"language-py\">print('hi')\n  x = 1</code></pre><hr>",
        );
        assert_eq!(kinds(&page.segments), vec!["heading", "paragraph", "code_block", "rule"]);
        assert_eq!(page.segments[1].text_content(), "Hello big world.");
        assert_eq!(
            page.segments[2].kind,
            SegmentKind::CodeBlock {
                language: Some("py".into())
            }
        );
        assert_eq!(page.segments[2].text.as_deref(), Some("print('hi')\n  x = 1"));
    }

    #[test]
    fn main_is_preferred_over_chrome() {
        let page = parse(
            "<body><nav><a href=\"/\">Home</a></nav><main><p>Content</p></main>\
             <footer>(c)</footer></body>",
        );
        assert_eq!(kinds(&page.segments), vec!["paragraph"]);
        assert_eq!(page.segments[0].text_content(), "Content");
    }

    #[test]
    fn loose_inline_content_becomes_paragraph() {
        let page = parse("<div>Some <b>bold</b> words<p>para</p>tail</div>");
        assert_eq!(kinds(&page.segments), vec!["paragraph", "paragraph", "paragraph"]);
        assert_eq!(page.segments[0].text_content(), "Some bold words");
        assert_eq!(page.segments[2].text_content(), "tail");
    }

    #[test]
    fn links_images_and_code() {
        let page = parse(
            "<p>See <a href=\"guide.html\" title=\"G\">the <code>guide</code></a> \
             <img src=\"a.png\" alt=\"diagram\"> <a href=\"https://x.io\">https://x.io</a></p>",
        );
        let p = &page.segments[0];
        assert_eq!(
            p.children[1].kind,
            SegmentKind::Link {
                href: "guide.html".into(),
                title: Some("G".into()),
                autolink: false
            }
        );
        assert_eq!(kinds(&p.children[1].children), vec!["plain_text", "inline_code"]);
        assert_eq!(p.children[3].text.as_deref(), Some("diagram"));
        assert!(matches!(
            p.children[5].kind,
            SegmentKind::Link { autolink: true, .. }
        ));
    }

    #[test]
    fn anchor_without_href_is_transparent() {
        let page = parse("<p><a name=\"top\">Top</a> text</p>");
        assert_eq!(kinds(&page.segments[0].children), vec!["plain_text"]);
        assert_eq!(page.segments[0].text_content(), "Top text");
    }

    #[test]
    fn image_without_src_is_raw() {
        let page = parse("<p><img alt=\"x\"></p>");
        assert_eq!(page.segments[0].children[0].kind, SegmentKind::RawHtml);
    }

    #[test]
    fn scripts_and_unknown_elements_are_raw() {
        let page = parse("<body><script>var a = 1 < 2;</script><my-widget data-x=\"1\"></my-widget></body>");
        assert_eq!(kinds(&page.segments), vec!["raw_html", "raw_html"]);
        assert_eq!(page.segments[0].text.as_deref(), Some("<script>var a = 1 < 2;</script>"));
        assert!(page.segments[1].text.as_deref().unwrap().starts_with("<my-widget"));
    }

    #[test]
    fn comments_are_skipped() {
        let page = parse("<p>a<!-- hidden -->b</p>");
        assert_eq!(page.segments[0].text_content(), "ab");
    }

    #[test]
    fn nested_lists() {
        let page = parse("<ol start=\"2\"><li>two</li><li>three<ul><li>inner</li></ul></li></ol>");
        assert_eq!(kinds(&page.segments), vec!["list_item", "list_item"]);
        assert_eq!(
            page.segments[0].kind,
            SegmentKind::ListItem {
                depth: 0,
                marker: ListMarker::Ordered(2)
            }
        );
        let three = &page.segments[1];
        assert_eq!(kinds(&three.children), vec!["plain_text", "list_item"]);
        assert_eq!(
            three.children[1].kind,
            SegmentKind::ListItem {
                depth: 1,
                marker: ListMarker::Bullet
            }
        );
    }

    #[test]
    fn tables_with_head_and_alignment() {
        let page = parse(
            "<table><caption>Limits</caption><thead><tr><th style=\"text-align: right\">a</th></tr></thead>\
             <tbody><tr><td><p>1</p></td></tr></tbody></table>",
        );
        assert_eq!(kinds(&page.segments), vec!["paragraph", "table"]);
        let table = &page.segments[1];
        assert_eq!(
            table.kind,
            SegmentKind::Table {
                alignments: vec![ColumnAlign::Right]
            }
        );
        assert_eq!(table.children[0].kind, SegmentKind::TableRow { header: true });
        assert_eq!(table.children[1].kind, SegmentKind::TableRow { header: false });
        assert_eq!(table.children[1].children[0].text_content(), "1");
    }

    #[test]
    fn blockquote_wraps_paragraphs() {
        let page = parse("<blockquote>quoted <i>text</i></blockquote>");
        assert_eq!(kinds(&page.segments), vec!["block_quote"]);
        assert_eq!(kinds(&page.segments[0].children), vec!["paragraph"]);
    }

    #[test]
    fn line_breaks_in_paragraph() {
        let page = parse("<p>one<br>two</p>");
        assert_eq!(
            kinds(&page.segments[0].children),
            vec!["plain_text", "line_break", "plain_text"]
        );
    }
}
