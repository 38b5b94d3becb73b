//! Path and name conventions shared by parser, builder and packager.
//!
//! ## Entry names
//!
//! Documentation trees often order files with a numeric prefix
//! (`01-intro.md`, `020_setup.md`). [`parse_entry_name`] splits that prefix
//! off so fallback titles read naturally:
//! - `020-getting-started.md` → "Getting Started"
//! - `api_reference.rst` → "Api Reference"
//! - `guide/index.md` → "Guide"
//!
//! ## Page paths
//!
//! Every source path maps to exactly one `.html` path inside the site,
//! mirroring the source directory structure. [`page_path`] performs the
//! mapping; [`relative_href`] computes links between two pages so that the
//! generated site works from `file://` as well as from a web server.

/// Result of parsing a numbered entry name like `020-getting-started`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Number prefix if present (e.g., `20` from `020-getting-started`)
    pub number: Option<u32>,
    /// Raw name part after the prefix. For unnumbered entries, the full input.
    pub name: String,
    /// Display title: name with dashes and underscores converted to spaces.
    pub display_title: String,
}

/// Parse an entry name with an optional `NNN-` or `NNN_` prefix.
///
/// - `"020-getting-started"` → number=Some(20), display_title="getting started"
/// - `"001"` → number=Some(1), name="", display_title=""
/// - `"api_reference"` → number=None, display_title="api reference"
pub fn parse_entry_name(name: &str) -> ParsedName {
    if let Some(sep_pos) = name.find(['-', '_']) {
        let prefix = &name[..sep_pos];
        if let Ok(num) = prefix.parse::<u32>() {
            let raw = &name[sep_pos + 1..];
            return ParsedName {
                number: Some(num),
                name: raw.to_string(),
                display_title: words(raw),
            };
        }
    }
    if let Ok(num) = name.parse::<u32>() {
        return ParsedName {
            number: Some(num),
            name: String::new(),
            display_title: String::new(),
        };
    }
    ParsedName {
        number: None,
        name: name.to_string(),
        display_title: words(name),
    }
}

fn words(raw: &str) -> String {
    raw.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fallback page title derived from a source path.
///
/// Index-like files (`index`, `readme`) take their directory's name.
pub fn title_from_path(source_path: &str) -> String {
    let parts = path_components(source_path);
    let Some(file) = parts.last() else {
        return "Untitled".to_string();
    };
    let stem = file_stem(file);
    let base = if is_index_stem(stem) && parts.len() > 1 {
        parts[parts.len() - 2].as_str()
    } else {
        stem
    };
    let parsed = parse_entry_name(base);
    if parsed.display_title.is_empty() {
        "Untitled".to_string()
    } else {
        title_case(&parsed.display_title)
    }
}

fn is_index_stem(stem: &str) -> bool {
    stem.eq_ignore_ascii_case("index") || stem.eq_ignore_ascii_case("readme")
}

fn file_stem(file: &str) -> &str {
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}

/// Normalized, forward-slash path components with `.` and `..` resolved.
fn path_components(path: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other.to_string()),
        }
    }
    out
}

/// Site-relative output path for a source path.
///
/// Scheme, host, query and fragment are dropped, a trailing `/` names the
/// directory's `index`, and the extension is replaced by `.html`.
/// `guide/intro.md` → `guide/intro.html`,
/// `https://example.com/docs/setup/?v=2` → `docs/setup/index.html`.
pub fn page_path(source_path: &str) -> String {
    let mut path = source_path;
    if let Some((_, rest)) = path.split_once("://") {
        path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
    }
    if let Some(end) = path.find(['?', '#']) {
        path = &path[..end];
    }
    let mut parts = path_components(path);
    if path.ends_with(['/', '\\']) {
        parts.push("index".to_string());
    }
    match parts.pop() {
        Some(file) => {
            parts.push(format!("{}.html", file_stem(&file)));
            parts.join("/")
        }
        None => "index.html".to_string(),
    }
}

/// Directory part of a site-relative path, empty for root-level pages.
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// `../` repeated once per directory level of `page_path`.
pub fn relative_prefix(page_path: &str) -> String {
    "../".repeat(page_path.matches('/').count())
}

/// Relative href from one site page to another.
///
/// `relative_href("guide/a.html", "reference/api.html")` → `../reference/api.html`
pub fn relative_href(from_page: &str, to_page: &str) -> String {
    let from = path_components(parent_dir(from_page));
    let to = path_components(to_page);
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(to[common..].iter().map(String::as_str));
    parts.join("/")
}

/// Whether an href points inside the same documentation tree.
///
/// Absolute URLs, protocol-relative URLs, root-absolute paths, bare
/// fragments and `mailto:`-style schemes are external.
pub fn is_relative_link(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') || href.starts_with('/') {
        return false;
    }
    match href.find(':') {
        Some(colon) => {
            let scheme = &href[..colon];
            // A colon after a path separator belongs to the path, not a scheme.
            scheme.contains(['/', '?', '#'])
        }
        None => true,
    }
}

/// Resolve a relative href against the source file that contains it.
///
/// Returns the source-relative target path and the fragment (if any).
/// `resolve_link("guide/a.md", "../ref/api.md#usage")` → `("ref/api.md", Some("usage"))`
pub fn resolve_link<'a>(from_source: &str, href: &'a str) -> (String, Option<&'a str>) {
    let (path_and_query, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (href, None),
    };
    let path = path_and_query
        .split_once('?')
        .map(|(p, _)| p)
        .unwrap_or(path_and_query);
    let base = parent_dir(from_source);
    let joined = if base.is_empty() {
        path.to_string()
    } else {
        format!("{base}/{path}")
    };
    (path_components(&joined).join("/"), fragment)
}

/// Anchor slug for heading text.
///
/// Lowercases, keeps letters and digits from any script, turns runs of
/// whitespace and punctuation into a single `-`. Never empty.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_with_multi_word_name() {
        let p = parse_entry_name("020-getting-started");
        assert_eq!(p.number, Some(20));
        assert_eq!(p.name, "getting-started");
        assert_eq!(p.display_title, "getting started");
    }

    #[test]
    fn underscore_prefix() {
        let p = parse_entry_name("03_api_reference");
        assert_eq!(p.number, Some(3));
        assert_eq!(p.display_title, "api reference");
    }

    #[test]
    fn number_only() {
        let p = parse_entry_name("001");
        assert_eq!(p.number, Some(1));
        assert_eq!(p.display_title, "");
    }

    #[test]
    fn unnumbered_with_dashes() {
        let p = parse_entry_name("wip-drafts");
        assert_eq!(p.number, None);
        assert_eq!(p.name, "wip-drafts");
        assert_eq!(p.display_title, "wip drafts");
    }

    #[test]
    fn title_from_plain_file() {
        assert_eq!(title_from_path("guide/getting-started.md"), "Getting Started");
        assert_eq!(title_from_path("010-install_notes.rst"), "Install Notes");
    }

    #[test]
    fn title_from_index_uses_directory() {
        assert_eq!(title_from_path("user-guide/index.md"), "User Guide");
        assert_eq!(title_from_path("README.md"), "README");
    }

    #[test]
    fn title_fallback_for_empty() {
        assert_eq!(title_from_path(""), "Untitled");
        assert_eq!(title_from_path("001.md"), "Untitled");
    }

    #[test]
    fn page_path_replaces_extension() {
        assert_eq!(page_path("guide/intro.md"), "guide/intro.html");
        assert_eq!(page_path("notes.rst"), "notes.html");
        assert_eq!(page_path("api.html"), "api.html");
        assert_eq!(page_path("CHANGELOG"), "CHANGELOG.html");
    }

    #[test]
    fn page_path_normalizes_separators() {
        assert_eq!(page_path("./guide\\intro.md"), "guide/intro.html");
        assert_eq!(page_path("/guide//a/../b.md"), "guide/b.html");
    }

    #[test]
    fn page_path_from_url() {
        assert_eq!(
            page_path("https://example.com/docs/setup/?v=2"),
            "docs/setup/index.html"
        );
        assert_eq!(page_path("https://example.com"), "index.html");
        assert_eq!(page_path("guide/a.md#top"), "guide/a.html");
    }

    #[test]
    fn dotfile_keeps_name() {
        assert_eq!(page_path(".hidden"), ".hidden.html");
    }

    #[test]
    fn relative_prefix_by_depth() {
        assert_eq!(relative_prefix("index.html"), "");
        assert_eq!(relative_prefix("guide/a.html"), "../");
        assert_eq!(relative_prefix("a/b/c.html"), "../../");
    }

    #[test]
    fn relative_href_between_pages() {
        assert_eq!(relative_href("index.html", "guide/a.html"), "guide/a.html");
        assert_eq!(relative_href("guide/a.html", "guide/b.html"), "b.html");
        assert_eq!(relative_href("guide/a.html", "reference/api.html"), "../reference/api.html");
        assert_eq!(relative_href("a/b/c.html", "index.html"), "../../index.html");
    }

    #[test]
    fn relative_link_detection() {
        assert!(is_relative_link("intro.md"));
        assert!(is_relative_link("../ref/api.md#x"));
        assert!(is_relative_link("dir/with:colon.md"));
        assert!(!is_relative_link("https://example.com"));
        assert!(!is_relative_link("mailto:me@example.com"));
        assert!(!is_relative_link("#section"));
        assert!(!is_relative_link("/absolute"));
        assert!(!is_relative_link(""));
    }

    #[test]
    fn resolve_link_against_source() {
        assert_eq!(
            resolve_link("guide/a.md", "../reference/api.md#usage"),
            ("reference/api.md".to_string(), Some("usage"))
        );
        assert_eq!(resolve_link("index.md", "guide/b.md"), ("guide/b.md".to_string(), None));
        assert_eq!(
            resolve_link("guide/a.md", "b.md?raw=1"),
            ("guide/b.md".to_string(), None)
        );
    }

    #[test]
    fn slugify_ascii() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  The `parse()` function!  "), "the-parse-function");
    }

    #[test]
    fn slugify_keeps_other_scripts() {
        assert_eq!(slugify("Guía rápida"), "guía-rápida");
        assert_eq!(slugify("入门 指南"), "入门-指南");
    }

    #[test]
    fn slugify_never_empty() {
        assert_eq!(slugify("!!!"), "section");
    }
}
