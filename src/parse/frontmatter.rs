//! Leading metadata blocks.
//!
//! Two forms are recognized at the very start of a page:
//!
//! ```text
//! ---                      +++
//! title: Getting started   title = "Getting started"
//! order: 2                 order = 2
//! tags:                    tags = ["intro", "setup"]
//!   - intro                +++
//!   - setup
//! ---
//! ```
//!
//! The `---` form is a flat `key: value` subset of YAML; list items under a
//! key are joined with `, `. A `---` block containing anything else is not
//! frontmatter (it is left to the body, where Markdown reads it as a rule).
//! The `+++` form is TOML; invalid TOML fails the page.

use super::ParseError;
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, String>;

/// Split a leading frontmatter block off `content`.
///
/// Returns the extracted metadata and the remaining body.
pub fn split(content: &str) -> Result<(Metadata, &str), ParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some((delimiter, block, body)) = delimited_block(content) else {
        return Ok((Metadata::new(), content));
    };
    if delimiter == "+++" {
        return Ok((parse_toml(block)?, body));
    }
    match parse_yaml_subset(block) {
        Some(metadata) => Ok((metadata, body)),
        None => Ok((Metadata::new(), content)),
    }
}

/// Find `delim\n ... \ndelim\n` at the start of content.
fn delimited_block(content: &str) -> Option<(&'static str, &str, &str)> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?.trim_end();
    let delimiter = match first {
        "---" => "---",
        "+++" => "+++",
        _ => return None,
    };
    let block_start = content.find('\n')? + 1;
    let mut offset = block_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == delimiter || (delimiter == "---" && trimmed == "...") {
            let block = &content[block_start..offset];
            let body = &content[offset + line.len()..];
            return Some((delimiter, block, body));
        }
        offset += line.len();
    }
    None
}

fn parse_toml(block: &str) -> Result<Metadata, ParseError> {
    let table: toml::Table = toml::from_str(block)?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_scalar(&value)))
        .collect())
}

fn toml_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(toml_scalar)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Returns `None` when a line is neither `key: value`, a list item, a
/// comment, nor blank.
fn parse_yaml_subset(block: &str) -> Option<Metadata> {
    let mut metadata = Metadata::new();
    let mut list_key: Option<String> = None;
    let mut list_items: Vec<String> = Vec::new();

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(item) = trimmed.strip_prefix("- ") {
            if list_key.is_none() {
                return None;
            }
            list_items.push(unquote(item.trim()).to_string());
            continue;
        }
        let (key, value) = trimmed.split_once(':')?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        flush_list(&mut list_key, &mut list_items, &mut metadata);
        let value = value.trim();
        if value.is_empty() {
            list_key = Some(key.to_string());
        } else {
            metadata.insert(key.to_string(), unquote(value).to_string());
        }
    }
    flush_list(&mut list_key, &mut list_items, &mut metadata);
    Some(metadata)
}

fn flush_list(key: &mut Option<String>, items: &mut Vec<String>, metadata: &mut Metadata) {
    if let Some(k) = key.take() {
        if !items.is_empty() {
            metadata.insert(k, items.join(", "));
        }
        items.clear();
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_frontmatter_returns_content() {
        let (meta, body) = split("# Title\n\ntext").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "# Title\n\ntext");
    }

    #[test]
    fn yaml_style_block() {
        let src = "---\ntitle: \"Getting started\"\norder: 2\n# note\n---\n# Hello\n";
        let (meta, body) = split(src).unwrap();
        assert_eq!(meta["title"], "Getting started");
        assert_eq!(meta["order"], "2");
        assert_eq!(body, "# Hello\n");
    }

    #[test]
    fn yaml_lists_join_with_comma() {
        let src = "---\ntags:\n  - intro\n  - setup\nauthor: ann\n---\nbody";
        let (meta, body) = split(src).unwrap();
        assert_eq!(meta["tags"], "intro, setup");
        assert_eq!(meta["author"], "ann");
        assert_eq!(body, "body");
    }

    #[test]
    fn yaml_dots_close_block() {
        let (meta, body) = split("---\na: b\n...\nrest").unwrap();
        assert_eq!(meta["a"], "b");
        assert_eq!(body, "rest");
    }

    #[test]
    fn rule_then_text_is_not_frontmatter() {
        let src = "---\nSome prose here.\n---\n";
        let (meta, body) = split(src).unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, src);
    }

    #[test]
    fn unclosed_block_is_not_frontmatter() {
        let (meta, body) = split("---\ntitle: x\n").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "---\ntitle: x\n");
    }

    #[test]
    fn toml_block() {
        let src = "+++\ntitle = \"API\"\nweight = 3\ndraft = false\ntags = [\"a\", \"b\"]\n+++\nbody\n";
        let (meta, body) = split(src).unwrap();
        assert_eq!(meta["title"], "API");
        assert_eq!(meta["weight"], "3");
        assert_eq!(meta["draft"], "false");
        assert_eq!(meta["tags"], "a, b");
        assert_eq!(body, "body\n");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let result = split("+++\ntitle = \n+++\nbody");
        assert!(matches!(result, Err(ParseError::Frontmatter(_))));
    }

    #[test]
    fn bom_is_ignored() {
        let (meta, _) = split("\u{feff}---\na: 1\n---\n").unwrap();
        assert_eq!(meta["a"], "1");
    }

    #[test]
    fn crlf_delimiters() {
        let (meta, body) = split("---\r\na: 1\r\n---\r\nbody").unwrap();
        assert_eq!(meta["a"], "1");
        assert_eq!(body, "body");
    }
}
