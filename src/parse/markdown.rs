//! Markdown → segments, via pulldown-cmark (CommonMark + GFM tables and
//! strikethrough).
//!
//! Every `Start` event opens one frame on a stack and every `End` closes the
//! top frame, so nesting follows the event stream exactly. Tags without a
//! segment of their own (lists, footnote bodies, extensions we do not enable)
//! are transparent: their children are spliced into the parent.
//!
//! A top-level fence that is never closed is found in a first pulldown-cmark
//! pass, cut off and kept verbatim as one trailing `RawHtml` segment rather
//! than letting it swallow the rest of the page as code.

use crate::document::{ColumnAlign, ListMarker, Segment, SegmentKind};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, LinkType, Options, Parser, Tag};

pub fn parse(body: &str) -> Vec<Segment> {
    let (markdown, unclosed) = split_unclosed_fence(body);
    let mut tree = Tree::new();
    for event in Parser::new_ext(markdown, options()) {
        tree.event(event);
    }
    let mut segments = tree.finish();
    if let Some(rest) = unclosed {
        segments.push(Segment::raw_html(rest));
    }
    segments
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Split at a top-level fenced code block that runs to the end of the input
/// without a closing fence.
///
/// Fences inside list items and block quotes end with their container, so
/// only top-level blocks can swallow the rest of the page.
fn split_unclosed_fence(body: &str) -> (&str, Option<&str>) {
    let end_of_input = body.trim_end().len();
    let mut depth = 0usize;
    for (event, range) in Parser::new_ext(body, options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_)))
                if depth == 0
                    && range.end >= end_of_input
                    && !is_closed_fence(&body[range.clone()]) =>
            {
                let start = line_start(body, range.start);
                return (&body[..start], Some(&body[start..]));
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    (body, None)
}

/// Whether the last non-blank line of a fenced block closes its opening fence.
fn is_closed_fence(block: &str) -> bool {
    let mut lines = block.lines();
    let Some((fence_char, fence_len, _)) = lines.next().and_then(fence_marker) else {
        return false;
    };
    lines
        .filter(|line| !line.trim().is_empty())
        .last()
        .and_then(fence_marker)
        .is_some_and(|(c, len, rest)| c == fence_char && len >= fence_len && rest.trim().is_empty())
}

fn line_start(body: &str, offset: usize) -> usize {
    body[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// A fence line: at most three spaces, then three or more of `` ` `` or `~`.
fn fence_marker(line: &str) -> Option<(char, usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let trimmed = &line[indent..];
    let fence_char = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let fence_len = trimmed.len() - trimmed.trim_start_matches(fence_char).len();
    if fence_len < 3 {
        return None;
    }
    Some((fence_char, fence_len, &trimmed[fence_len..]))
}

enum Frame {
    Node(SegmentKind, Vec<Segment>),
    Transparent(Vec<Segment>),
    List(Option<u64>, Vec<Segment>),
    Code(Option<String>, String),
    Html(String),
    Image {
        src: String,
        title: Option<String>,
        alt: String,
    },
}

struct Tree {
    stack: Vec<Frame>,
}

impl Tree {
    fn new() -> Self {
        Self {
            stack: vec![Frame::Transparent(Vec::new())],
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.attach(Segment::inline_code(code.to_string())),
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                self.attach(Segment::inline_code(math.to_string()))
            }
            Event::Html(html) => match self.stack.last_mut() {
                Some(Frame::Html(buf)) => buf.push_str(&html),
                _ => self.attach(Segment::raw_html(html.to_string())),
            },
            Event::InlineHtml(html) => self.attach(Segment::raw_html(html.to_string())),
            Event::FootnoteReference(label) => self.push_text(&format!("[^{label}]")),
            Event::SoftBreak => self.push_text("\n"),
            Event::HardBreak => self.attach(Segment::line_break()),
            Event::Rule => self.attach(Segment::rule()),
            Event::TaskListMarker(done) => self.push_text(if done { "[x] " } else { "[ ] " }),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::Node(SegmentKind::Paragraph, Vec::new()),
            Tag::Heading { level, .. } => {
                Frame::Node(SegmentKind::Heading { level: level as u8 }, Vec::new())
            }
            Tag::BlockQuote(_) => Frame::Node(SegmentKind::BlockQuote, Vec::new()),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                let language = info.split_whitespace().next().map(str::to_string);
                Frame::Code(language, String::new())
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => Frame::Code(None, String::new()),
            Tag::HtmlBlock => Frame::Html(String::new()),
            Tag::List(start) => Frame::List(start, Vec::new()),
            Tag::Item => {
                let marker = match self.stack.last_mut() {
                    Some(Frame::List(Some(next), _)) => {
                        let n = *next;
                        *next += 1;
                        ListMarker::Ordered(n)
                    }
                    _ => ListMarker::Bullet,
                };
                let depth = self
                    .stack
                    .iter()
                    .filter(|f| matches!(f, Frame::Node(SegmentKind::ListItem { .. }, _)))
                    .count() as u8;
                Frame::Node(SegmentKind::ListItem { depth, marker }, Vec::new())
            }
            Tag::Table(alignments) => Frame::Node(
                SegmentKind::Table {
                    alignments: alignments.iter().map(column_align).collect(),
                },
                Vec::new(),
            ),
            Tag::TableHead => Frame::Node(SegmentKind::TableRow { header: true }, Vec::new()),
            Tag::TableRow => Frame::Node(SegmentKind::TableRow { header: false }, Vec::new()),
            Tag::TableCell => Frame::Node(SegmentKind::TableCell, Vec::new()),
            Tag::Emphasis => Frame::Node(SegmentKind::Emphasis, Vec::new()),
            Tag::Strong => Frame::Node(SegmentKind::Strong, Vec::new()),
            Tag::Strikethrough => Frame::Node(SegmentKind::Strikethrough, Vec::new()),
            // An empty destination cannot be a link; keep its text in place.
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } if !dest_url.is_empty() && !self.inside_link() => Frame::Node(
                SegmentKind::Link {
                    href: dest_url.to_string(),
                    title: non_empty(&title),
                    autolink: matches!(link_type, LinkType::Autolink | LinkType::Email),
                },
                Vec::new(),
            ),
            Tag::Image {
                dest_url, title, ..
            } => Frame::Image {
                src: dest_url.to_string(),
                title: non_empty(&title),
                alt: String::new(),
            },
            _ => Frame::Transparent(Vec::new()),
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        // The root frame is never closed by an event.
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Node(kind, children) => self.attach(Segment::container(kind, children)),
            Frame::Transparent(children) | Frame::List(_, children) => {
                for child in children {
                    self.attach(child);
                }
            }
            Frame::Code(language, mut code) => {
                if code.ends_with('\n') {
                    code.pop();
                }
                self.attach(Segment::code_block(language, code));
            }
            Frame::Html(mut html) => {
                if html.ends_with('\n') {
                    html.pop();
                }
                self.attach(Segment::raw_html(html));
            }
            Frame::Image { src, title, alt } => {
                if src.is_empty() {
                    self.push_text(&alt);
                } else {
                    self.attach(Segment::leaf(SegmentKind::Image { src, title }, alt));
                }
            }
        }
    }

    fn inside_link(&self) -> bool {
        self.stack
            .iter()
            .any(|f| matches!(f, Frame::Node(SegmentKind::Link { .. }, _)))
    }

    fn push_text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(Frame::Code(_, buf)) | Some(Frame::Html(buf)) => buf.push_str(text),
            Some(Frame::Image { alt, .. }) => alt.push_str(text),
            _ => self.attach(Segment::text(text)),
        }
    }

    /// Append to the top frame, merging adjacent plain-text runs.
    fn attach(&mut self, segment: Segment) {
        let children = match self.stack.last_mut() {
            Some(Frame::Node(_, children))
            | Some(Frame::Transparent(children))
            | Some(Frame::List(_, children)) => children,
            Some(Frame::Code(_, buf)) | Some(Frame::Html(buf)) => {
                buf.push_str(&segment.text_content());
                return;
            }
            Some(Frame::Image { alt, .. }) => {
                alt.push_str(&segment.text_content());
                return;
            }
            None => return,
        };
        if segment.kind == SegmentKind::PlainText {
            if let Some(last) = children.last_mut() {
                if last.kind == SegmentKind::PlainText {
                    let text = segment.text.unwrap_or_default();
                    last.text.get_or_insert_with(String::new).push_str(&text);
                    return;
                }
            }
        }
        children.push(segment);
    }

    fn finish(mut self) -> Vec<Segment> {
        while self.stack.len() > 1 {
            self.end();
        }
        match self.stack.pop() {
            Some(Frame::Transparent(children)) => children,
            _ => Vec::new(),
        }
    }
}

fn column_align(alignment: &Alignment) -> ColumnAlign {
    match alignment {
        Alignment::None => ColumnAlign::None,
        Alignment::Left => ColumnAlign::Left,
        Alignment::Center => ColumnAlign::Center,
        Alignment::Right => ColumnAlign::Right,
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
