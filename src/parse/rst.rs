//! reStructuredText → segments.
//!
//! A line-oriented reader covering the constructs documentation trees use
//! most: section titles, paragraphs, bullet and enumerated lists, literal
//! blocks, code directives, block quotes, transitions and grid tables.
//! Anything else that starts with `..` (other directives, comments,
//! substitution definitions) is kept verbatim as `RawHtml`.
//!
//! Section levels follow the order in which adornment styles first appear,
//! as in docutils: the first style seen is level 1, the next new one level 2.

use crate::document::{ListMarker, Segment, SegmentKind};

pub fn parse(body: &str) -> Vec<Segment> {
    let lines: Vec<&str> = body.lines().collect();
    let mut reader = Reader { styles: Vec::new() };
    reader.blocks(&lines, 0)
}

struct Reader {
    /// Adornment styles in order of first appearance: (char, has overline).
    styles: Vec<(char, bool)>,
}

impl Reader {
    fn blocks(&mut self, lines: &[&str], depth: u8) -> Vec<Segment> {
        let mut out = Vec::new();
        let mut auto_number = 1;
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                i += 1;
                continue;
            }

            if indent_of(line) > 0 {
                let end = indented_block_end(lines, i, 1);
                let inner = dedent(&lines[i..end]);
                let inner: Vec<&str> = inner.iter().map(String::as_str).collect();
                out.push(Segment::container(
                    SegmentKind::BlockQuote,
                    self.blocks(&inner, depth),
                ));
                i = end;
                continue;
            }

            if let Some(c) = adornment(line) {
                if i + 2 < lines.len()
                    && !lines[i + 1].trim().is_empty()
                    && adornment(lines[i + 2]) == Some(c)
                {
                    let level = self.level(c, true);
                    out.push(Segment::heading(level, inline(lines[i + 1].trim())));
                    i += 3;
                    continue;
                }
                if line.trim_end().chars().count() >= 4 {
                    out.push(Segment::rule());
                    i += 1;
                    continue;
                }
            }

            if i + 1 < lines.len() && is_underlined(line, lines[i + 1]) {
                if let Some(c) = adornment(lines[i + 1]) {
                    let level = self.level(c, false);
                    out.push(Segment::heading(level, inline(line.trim())));
                    i += 2;
                    continue;
                }
            }

            if line == ".." || line.starts_with(".. ") {
                let end = indented_block_end(lines, i + 1, 1);
                let directive = line.get(3..).unwrap_or("").trim();
                match code_directive(directive) {
                    Some(language) => {
                        let body: Vec<&str> = lines[i + 1..end]
                            .iter()
                            .copied()
                            .skip_while(|l| l.trim().is_empty() || l.trim().starts_with(':'))
                            .collect();
                        out.push(Segment::code_block(language, dedent(&body).join("\n")));
                    }
                    None => out.push(Segment::raw_html(lines[i..end].join("\n"))),
                }
                i = end;
                continue;
            }

            if is_grid_table_border(line) {
                let mut end = i + 1;
                while end < lines.len() && matches!(lines[end].chars().next(), Some('+' | '|')) {
                    end += 1;
                }
                out.push(Segment::code_block(None, lines[i..end].join("\n")));
                i = end;
                continue;
            }

            if let Some((marker, content_col)) = list_marker(line, &mut auto_number) {
                let end = indented_block_end(lines, i + 1, content_col);
                let mut item_lines = vec![line[content_col..].to_string()];
                item_lines.extend(dedent_by(&lines[i + 1..end], content_col));
                let item_lines: Vec<&str> = item_lines.iter().map(String::as_str).collect();
                let mut children = self.blocks(&item_lines, depth + 1);
                // A leading paragraph is the item's own text.
                if matches!(children.first(), Some(s) if s.kind == SegmentKind::Paragraph) {
                    let mut merged = children.remove(0).children;
                    merged.append(&mut children);
                    children = merged;
                }
                out.push(Segment::list_item(depth, marker, children));
                i = end;
                continue;
            }
            auto_number = 1;

            let start = i;
            while i < lines.len()
                && !lines[i].trim().is_empty()
                && indent_of(lines[i]) == 0
                && !(i > start && i + 1 < lines.len() && is_underlined(lines[i], lines[i + 1]))
            {
                i += 1;
            }
            let text = lines[start..i]
                .iter()
                .map(|l| l.trim())
                .collect::<Vec<_>>()
                .join(" ");
            let literal_follows = text.ends_with("::");
            let text = if text == "::" {
                ""
            } else if let Some(t) = text.strip_suffix(" ::") {
                t
            } else if literal_follows {
                &text[..text.len() - 1]
            } else {
                text.as_str()
            };
            if !text.is_empty() {
                out.push(Segment::paragraph(inline(text)));
            }
            if literal_follows {
                let mut k = i;
                while k < lines.len() && lines[k].trim().is_empty() {
                    k += 1;
                }
                if k < lines.len() && indent_of(lines[k]) > 0 {
                    let end = indented_block_end(lines, k, 1);
                    out.push(Segment::code_block(None, dedent(&lines[k..end]).join("\n")));
                    i = end;
                }
            }
        }
        out
    }

    fn level(&mut self, c: char, overline: bool) -> u8 {
        let style = (c, overline);
        let index = match self.styles.iter().position(|s| *s == style) {
            Some(index) => index,
            None => {
                self.styles.push(style);
                self.styles.len() - 1
            }
        };
        (index + 1).min(6) as u8
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// The repeated punctuation character of an adornment line.
fn adornment(line: &str) -> Option<char> {
    let trimmed = line.trim_end();
    let c = trimmed.chars().next()?;
    if !c.is_ascii_punctuation() || trimmed.chars().count() < 2 {
        return None;
    }
    trimmed.chars().all(|x| x == c).then_some(c)
}

fn is_underlined(title: &str, next: &str) -> bool {
    !title.trim().is_empty()
        && indent_of(title) == 0
        && adornment(title).is_none()
        && adornment(next).is_some()
        && next.trim_end().chars().count() >= title.trim_end().chars().count()
}

fn is_grid_table_border(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() > 2
        && trimmed.starts_with('+')
        && trimmed.ends_with('+')
        && trimmed.chars().all(|c| matches!(c, '+' | '-' | '='))
}

/// `code-block:: lang`, `code:: lang`, `sourcecode:: lang`.
fn code_directive(directive: &str) -> Option<Option<String>> {
    ["code-block::", "code::", "sourcecode::"]
        .iter()
        .find_map(|name| directive.strip_prefix(name))
        .map(|lang| {
            let lang = lang.trim();
            (!lang.is_empty()).then(|| lang.to_string())
        })
}

/// Bullet (`-`, `*`, `+`) or enumerated (`1.`, `1)`, `(1)`, `#.`) marker,
/// with the column where item content starts.
fn list_marker(line: &str, auto_number: &mut u64) -> Option<(ListMarker, usize)> {
    let content_col = |marker_len: usize| -> Option<usize> {
        let after = line.get(marker_len..)?;
        if !after.starts_with(' ') {
            return None;
        }
        Some(marker_len + indent_of(after))
    };

    if matches!(line.chars().next(), Some('-' | '*' | '+')) {
        return content_col(1).map(|col| (ListMarker::Bullet, col));
    }

    let (number_part, marker_len) = if let Some(rest) = line.strip_prefix('(') {
        let close = rest.find(')')?;
        (&rest[..close], close + 2)
    } else {
        let end = line.find(['.', ')'])?;
        (&line[..end], end + 1)
    };
    let n = if number_part == "#" {
        *auto_number
    } else if !number_part.is_empty() && number_part.chars().all(|c| c.is_ascii_digit()) {
        number_part.parse().ok()?
    } else {
        return None;
    };
    let col = content_col(marker_len)?;
    *auto_number = n + 1;
    Some((ListMarker::Ordered(n), col))
}

/// End of the block starting at `start` whose non-blank lines are indented
/// by at least `min_indent`. Trailing blank lines are not included.
fn indented_block_end(lines: &[&str], start: usize, min_indent: usize) -> usize {
    let mut end = start;
    while end < lines.len() && (lines[end].trim().is_empty() || indent_of(lines[end]) >= min_indent)
    {
        end += 1;
    }
    while end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    end
}

/// Remove the common indentation of non-blank lines.
fn dedent(lines: &[&str]) -> Vec<String> {
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    dedent_by(lines, common)
}

fn dedent_by(lines: &[&str], width: usize) -> Vec<String> {
    lines
        .iter()
        .map(|l| {
            let strip = indent_of(l).min(width);
            l[strip..].to_string()
        })
        .collect()
}

/// Inline markup: ``literal``, `*emphasis*`, `**strong**`, `:role:`x``,
/// `` `label <url>`_ `` references and bare URLs.
fn inline(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut rest = text;
    let mut prev: Option<char> = None;
    while let Some(c) = rest.chars().next() {
        let can_open = prev.is_none_or(|p| p.is_whitespace() || "([{<'\"-/:".contains(p));
        if can_open {
            if let Some((segment, consumed)) = markup_at(rest) {
                push(&mut out, segment);
                prev = rest[..consumed].chars().last();
                rest = &rest[consumed..];
                continue;
            }
        }
        push(&mut out, Segment::text(c.to_string()));
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn push(out: &mut Vec<Segment>, segment: Segment) {
    if segment.kind == SegmentKind::PlainText {
        if let Some(last) = out.last_mut() {
            if last.kind == SegmentKind::PlainText {
                let text = segment.text.unwrap_or_default();
                last.text.get_or_insert_with(String::new).push_str(&text);
                return;
            }
        }
    }
    out.push(segment);
}

fn tight(content: &str) -> bool {
    !content.is_empty()
        && !content.starts_with(char::is_whitespace)
        && !content.ends_with(char::is_whitespace)
}

fn markup_at(s: &str) -> Option<(Segment, usize)> {
    if let Some(body) = s.strip_prefix("``") {
        let end = body.find("``")?;
        let code = &body[..end];
        return tight(code).then(|| (Segment::inline_code(code), end + 4));
    }
    if let Some(body) = s.strip_prefix("**") {
        let end = body.find("**")?;
        let content = &body[..end];
        return tight(content).then(|| {
            (
                Segment::container(SegmentKind::Strong, vec![Segment::text(content)]),
                end + 4,
            )
        });
    }
    if let Some(body) = s.strip_prefix('*') {
        let end = body.find('*')?;
        let content = &body[..end];
        return tight(content).then(|| {
            (
                Segment::container(SegmentKind::Emphasis, vec![Segment::text(content)]),
                end + 2,
            )
        });
    }
    if let Some(after_colon) = s.strip_prefix(':') {
        let close = after_colon.find(':')?;
        let role = &after_colon[..close];
        if role.is_empty() || !role.chars().all(|c| c.is_alphanumeric() || "-_.+".contains(c)) {
            return None;
        }
        let body = after_colon[close + 1..].strip_prefix('`')?;
        let end = body.find('`')?;
        return Some((Segment::inline_code(&body[..end]), 1 + close + 2 + end + 1));
    }
    if let Some(body) = s.strip_prefix('`') {
        let end = body.find('`')?;
        let content = &body[..end];
        if !tight(content) {
            return None;
        }
        let after = &body[end + 1..];
        let underscores = if after.starts_with("__") {
            2
        } else if after.starts_with('_') {
            1
        } else {
            0
        };
        let consumed = end + 2 + underscores;
        if underscores == 0 {
            return Some((
                Segment::container(SegmentKind::Emphasis, vec![Segment::text(content)]),
                consumed,
            ));
        }
        return Some(match split_target(content) {
            Some((Some(label), url)) => {
                (Segment::link(url, vec![Segment::text(label)]), consumed)
            }
            Some((None, url)) => (autolink(url), consumed),
            None => (Segment::text(content), consumed),
        });
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        let end = s
            .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
            .unwrap_or(s.len());
        let url = s[..end].trim_end_matches(['.', ',', ';', ':', ')', '!', '?', '\'', '"']);
        let host = url.split_once("://").map(|(_, h)| h).unwrap_or("");
        if host.is_empty() {
            return None;
        }
        return Some((autolink(url), url.len()));
    }
    None
}

/// A link whose text is its own url, never translated.
fn autolink(url: &str) -> Segment {
    Segment::container(
        SegmentKind::Link {
            href: url.to_string(),
            title: None,
            autolink: true,
        },
        vec![Segment::text(url)],
    )
}

/// `label <url>` → (label, url); a bare `<url>` has no label.
fn split_target(content: &str) -> Option<(Option<&str>, &str)> {
    let inner = content.strip_suffix('>')?;
    let lt = inner.rfind('<')?;
    let url = inner[lt + 1..].trim();
    if url.is_empty() {
        return None;
    }
    let label = inner[..lt].trim();
    Some(((!label.is_empty()).then_some(label), url))
}
