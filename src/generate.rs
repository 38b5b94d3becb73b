//! Static site generation.
//!
//! Final stage of the pipeline. Takes translated documents and writes a
//! browsable site: one HTML page per document, a navigation sidebar, a
//! landing page and one shared stylesheet.
//!
//! ## Generated Pages
//!
//! - **Document pages** (`/{dir}/{name}.html`): mirror each `source_path`
//! - **Index page** (`/index.html`): table of contents of every page, unless
//!   a document already maps to `index.html` (then that document is the
//!   landing page)
//!
//! ## Output Structure
//!
//! ```text
//! output/sites/{project}/{language}/
//! ├── index.html
//! ├── guide/
//! │   ├── getting-started.html
//! │   └── configuration.html
//! ├── reference/
//! │   └── api.html
//! └── assets/
//!     └── style.css              # Colors from config + static/style.css
//! ```
//!
//! Every link is relative, so the site works from `file://` as well as from
//! any web server path.
//!
//! ## Atomic Replacement
//!
//! Pages are written into a sibling staging directory. Only after every
//! page and asset is written is the staging directory swapped into place,
//! so a failed build never leaves a half-written site and never destroys
//! the previous one.
//!
//! ## Reproducibility
//!
//! Output depends only on the input documents and template: navigation
//! order is fully determined, and no timestamps or build ids are embedded.
//! Building twice yields byte-identical trees.

use crate::config::{self, ColorConfig};
use crate::document::Document;
use crate::languages;
use crate::naming;
use crate::render::{self, HeadingAnchor, LinkMap};
use crate::types::NavItem;
use log::{debug, info};
use maud::{DOCTYPE, Markup, html};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{first} and {second} both map to {page}")]
    PathCollision {
        page: String,
        first: String,
        second: String,
    },
    #[error("no documents to build")]
    NoDocuments,
    #[error("invalid {what} {value:?}: must be a single path component")]
    InvalidName { what: &'static str, value: String },
}

const CSS_STATIC: &str = include_str!("../static/style.css");

/// Page path of the landing page.
pub const INDEX_PAGE: &str = "index.html";

/// Look and shared assets of a generated site.
#[derive(Debug, Clone, Default)]
pub struct SiteTemplate {
    pub colors: ColorConfig,
    /// Extra files copied into `assets/` once per site.
    pub assets_dir: Option<PathBuf>,
}

impl SiteTemplate {
    pub fn from_config(config: &config::Config) -> Self {
        Self {
            colors: config.colors.clone(),
            assets_dir: config.assets_dir.as_ref().map(PathBuf::from),
        }
    }

    /// Color variables followed by the embedded base stylesheet.
    pub fn stylesheet(&self) -> String {
        format!("{}\n\n{}", config::generate_color_css(&self.colors), CSS_STATIC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub site_dir: PathBuf,
    pub total_pages: usize,
    /// Document page paths in navigation order
    pub pages: Vec<String>,
    pub index_page: String,
}

/// Where a project's site for one language lives.
pub fn site_dir(output_dir: &Path, project_name: &str, lang: &str) -> PathBuf {
    output_dir.join("sites").join(project_name).join(lang)
}

fn check_component(what: &'static str, value: &str) -> Result<(), BuildError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidName {
            what,
            value: value.to_string(),
        })
    }
}

/// A document and the page it renders to.
struct PageEntry<'a> {
    page: String,
    doc: &'a Document,
}

/// Map every document to its page path, rejecting two documents on one page.
fn assign_pages(documents: &[Document]) -> Result<Vec<PageEntry<'_>>, BuildError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut entries = Vec::with_capacity(documents.len());
    for doc in documents {
        let page = naming::page_path(&doc.source_path);
        if let Some(first) = seen.insert(page.clone(), &doc.source_path) {
            return Err(BuildError::PathCollision {
                page,
                first: first.to_string(),
                second: doc.source_path.clone(),
            });
        }
        entries.push(PageEntry { page, doc });
    }
    Ok(entries)
}

// ============================================================================
// Navigation
// ============================================================================

/// Sort key: explicit hint first (ascending), then lexical source path.
type SortKey = (bool, i64, String);

fn sort_key(doc: &Document) -> SortKey {
    let hint = doc.order_hint();
    (hint.is_none(), hint.unwrap_or(0), doc.source_path.clone())
}

#[derive(Default)]
struct DirNode<'a> {
    pages: Vec<(&'a str, &'a Document)>,
    dirs: BTreeMap<String, DirNode<'a>>,
}

impl<'a> DirNode<'a> {
    fn insert(&mut self, dirs: &[&str], page: &'a str, doc: &'a Document) {
        match dirs.split_first() {
            None => self.pages.push((page, doc)),
            Some((first, rest)) => self
                .dirs
                .entry(first.to_string())
                .or_default()
                .insert(rest, page, doc),
        }
    }

    fn into_items(self, dir: &str) -> Vec<NavItem> {
        let mut keyed: Vec<(SortKey, NavItem)> = Vec::new();
        for (page, doc) in self.pages {
            keyed.push((
                sort_key(doc),
                NavItem {
                    title: doc.title.clone(),
                    path: page.to_string(),
                    children: Vec::new(),
                },
            ));
        }
        for (name, mut node) in self.dirs {
            let path = if dir.is_empty() {
                name.clone()
            } else {
                format!("{dir}/{name}")
            };
            let index_page = format!("{path}/{INDEX_PAGE}");
            let landing = node
                .pages
                .iter()
                .position(|(page, _)| *page == index_page)
                .map(|i| node.pages.remove(i));
            let key = match landing {
                Some((_, doc)) => {
                    let (missing, hint, _) = sort_key(doc);
                    (missing, hint, format!("{path}/"))
                }
                None => (true, 0, format!("{path}/")),
            };
            keyed.push((
                key,
                NavItem {
                    title: naming::title_from_path(&name),
                    path: landing.map(|(page, _)| page.to_string()).unwrap_or_default(),
                    children: node.into_items(&path),
                },
            ));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, item)| item).collect()
    }
}

/// Navigation tree of a set of documents.
///
/// Documents are grouped by directory; a directory's `index` page becomes
/// the link of its group. Within a level, items with an `order`/`weight`/
/// `nav_order` hint come first (ascending), then everything else by
/// source path.
pub fn build_navigation(documents: &[Document]) -> Vec<NavItem> {
    let pages: Vec<String> = documents
        .iter()
        .map(|d| naming::page_path(&d.source_path))
        .collect();
    let mut root = DirNode::default();
    for (page, doc) in pages.iter().zip(documents) {
        let dir = naming::parent_dir(page);
        let dirs: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
        root.insert(&dirs, page, doc);
    }
    root.into_items("")
}

/// Page paths of a navigation tree in reading order.
pub fn nav_order(items: &[NavItem]) -> Vec<String> {
    fn walk(items: &[NavItem], out: &mut Vec<String>) {
        for item in items {
            if !item.is_group() {
                out.push(item.path.clone());
            }
            walk(&item.children, out);
        }
    }
    let mut out = Vec::new();
    walk(items, &mut out);
    out
}

// ============================================================================
// Build
// ============================================================================

/// Render documents into `output_dir/sites/{project_name}/{target_lang}`.
///
/// All-or-nothing: on error the previous site (if any) is left untouched.
pub fn build_site(
    documents: &[Document],
    project_name: &str,
    target_lang: &str,
    template: &SiteTemplate,
    output_dir: &Path,
) -> Result<BuildResult, BuildError> {
    check_component("project name", project_name)?;
    check_component("language", target_lang)?;
    if documents.is_empty() {
        return Err(BuildError::NoDocuments);
    }

    let entries = assign_pages(documents)?;
    let navigation = build_navigation(documents);
    let order = nav_order(&navigation);
    let titles: HashMap<&str, &str> = entries
        .iter()
        .map(|e| (e.page.as_str(), e.doc.title.as_str()))
        .collect();
    let links = LinkMap::new(documents);
    let site = Site {
        project: project_name,
        lang: target_lang,
        navigation: &navigation,
    };

    // Pages render independently; navigation was complete before this point.
    let mut rendered: Vec<(String, String)> = entries
        .par_iter()
        .map(|entry| {
            let position = order.iter().position(|p| *p == entry.page);
            let neighbor = |p: Option<_>| {
                let p: Option<&String> = p;
                p.map(|p| (p.as_str(), titles[p.as_str()]))
            };
            let prev = neighbor(position.and_then(|i| i.checked_sub(1)).and_then(|i| order.get(i)));
            let next = neighbor(position.and_then(|i| order.get(i + 1)));
            let markup = site.render_page(entry, &links, prev, next);
            (entry.page.clone(), markup.into_string())
        })
        .collect();
    if !titles.contains_key(INDEX_PAGE) {
        rendered.push((INDEX_PAGE.to_string(), site.render_index().into_string()));
    }

    let target = site_dir(output_dir, project_name, target_lang);
    let parent = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_dir.to_path_buf());
    fs::create_dir_all(&parent)?;
    let staging = parent.join(format!(".{target_lang}.staging"));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }

    if let Err(e) = write_site(&staging, &rendered, template) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e.into());
    }
    swap_into_place(&staging, &target)?;

    info!(
        "built {} pages for {}/{} at {}",
        entries.len(),
        project_name,
        target_lang,
        target.display()
    );
    Ok(BuildResult {
        site_dir: target,
        total_pages: entries.len(),
        pages: order,
        index_page: INDEX_PAGE.to_string(),
    })
}

fn write_site(
    staging: &Path,
    rendered: &[(String, String)],
    template: &SiteTemplate,
) -> std::io::Result<()> {
    fs::create_dir_all(staging.join("assets"))?;
    rendered.par_iter().try_for_each(|(page, html)| {
        let path = staging.join(page);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        debug!("writing {page}");
        fs::write(path, html)
    })?;

    // Shared assets, once per site
    if let Some(assets) = &template.assets_dir {
        copy_dir_recursive(assets, &staging.join("assets"))?;
    }
    fs::write(staging.join("assets").join("style.css"), template.stylesheet())
}

/// Replace `target` with `staging`, removing the previous site only after
/// the new one is in place.
fn swap_into_place(staging: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        let old = target.with_extension("old");
        if old.exists() {
            fs::remove_dir_all(&old)?;
        }
        fs::rename(target, &old)?;
        if let Err(e) = fs::rename(staging, target) {
            fs::rename(&old, target)?;
            return Err(e);
        }
        fs::remove_dir_all(&old)
    } else {
        fs::rename(staging, target)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// ============================================================================
// HTML Components
// ============================================================================

/// Site-wide values shared by every page.
struct Site<'a> {
    project: &'a str,
    lang: &'a str,
    navigation: &'a [NavItem],
}

impl Site<'_> {
    fn render_page(
        &self,
        entry: &PageEntry<'_>,
        links: &LinkMap,
        prev: Option<(&str, &str)>,
        next: Option<(&str, &str)>,
    ) -> Markup {
        let (body, anchors) = render::render_document(entry.doc, &entry.page, links);
        let page = entry.page.as_str();
        let content = html! {
            (site_header(self.project, self.lang, page))
            div.layout {
                nav.sidebar {
                    (render_nav(self.navigation, page))
                }
                main.content {
                    article.document {
                        (body)
                    }
                    (page_nav(page, prev, next))
                }
                @if let Some(toc) = render_toc(&anchors) {
                    aside.toc { (toc) }
                }
            }
        };
        let title = format!("{} - {}", entry.doc.title, self.project);
        base_document(&title, self.lang, page, content)
    }

    /// Table of contents of the whole site, used when no document is the
    /// landing page.
    fn render_index(&self) -> Markup {
        let content = html! {
            (site_header(self.project, self.lang, INDEX_PAGE))
            div.layout {
                nav.sidebar {
                    (render_nav(self.navigation, INDEX_PAGE))
                }
                main.content {
                    article.document.site-index {
                        h1 { (self.project) }
                        (render_nav(self.navigation, INDEX_PAGE))
                    }
                }
            }
        };
        base_document(self.project, self.lang, INDEX_PAGE, content)
    }
}

/// Renders the base HTML document structure
fn base_document(title: &str, lang: &str, page: &str, content: Markup) -> Markup {
    let prefix = naming::relative_prefix(page);
    html! {
        (DOCTYPE)
        html lang=(lang) dir=(languages::text_direction(lang)) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href={ (prefix) "assets/style.css" };
            }
            body {
                (content)
            }
        }
    }
}

/// Renders the site header with project name and language
fn site_header(project: &str, lang: &str, page: &str) -> Markup {
    let language = languages::find(lang).map(|l| l.name).unwrap_or(lang);
    html! {
        header.site-header {
            a.site-title href=(naming::relative_href(page, INDEX_PAGE)) { (project) }
            span.site-lang { (language) }
        }
    }
}

/// Renders the navigation tree with links relative to `current_page`
pub fn render_nav(items: &[NavItem], current_page: &str) -> Markup {
    html! {
        ul.nav-tree {
            @for item in items {
                (render_nav_item(item, current_page))
            }
        }
    }
}

fn render_nav_item(item: &NavItem, current_page: &str) -> Markup {
    let is_current = item.path == current_page;
    html! {
        li class=[is_current.then_some("current")] {
            @if item.is_group() {
                span.nav-group { (item.title) }
            } @else {
                a href=(naming::relative_href(current_page, &item.path)) { (item.title) }
            }
            @if !item.children.is_empty() {
                ul {
                    @for child in &item.children {
                        (render_nav_item(child, current_page))
                    }
                }
            }
        }
    }
}

/// "On this page" list of level-2 and level-3 headings.
fn render_toc(anchors: &[HeadingAnchor]) -> Option<Markup> {
    let entries: Vec<&HeadingAnchor> = anchors
        .iter()
        .filter(|a| (2..=3).contains(&a.level))
        .collect();
    if entries.is_empty() {
        return None;
    }
    Some(html! {
        h2 { "On this page" }
        ul {
            @for anchor in entries {
                li class={ "toc-level-" (anchor.level) } {
                    a href={ "#" (anchor.id) } { (anchor.text) }
                }
            }
        }
    })
}

/// Previous/next links following navigation order
fn page_nav(page: &str, prev: Option<(&str, &str)>, next: Option<(&str, &str)>) -> Markup {
    html! {
        @if prev.is_some() || next.is_some() {
            nav.page-nav {
                @if let Some((path, title)) = prev {
                    a.prev href=(naming::relative_href(page, path)) rel="prev" { "← " (title) }
                }
                @if let Some((path, title)) = next {
                    a.next href=(naming::relative_href(page, path)) rel="next" { (title) " →" }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
