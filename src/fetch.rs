//! Fetch stage: collect raw pages for a project.
//!
//! [`Fetcher`] is the seam to whatever produces raw pages. The pipeline only
//! needs a list of `(source_path, content, format hint)`; cloning
//! repositories or crawling websites lives behind other implementations.
//!
//! [`LocalFetcher`] reads a local checkout or directory:
//!
//! - a `docs/`, `documentation/` or `doc/` subdirectory is preferred when present
//! - documentation files (`.md`, `.markdown`, `.mdx`, `.html`, `.htm`,
//!   `.rst`, `.txt`) are collected in sorted path order
//! - hidden files and directories are skipped
//! - collection stops at `max_pages`; hitting the limit is recorded as
//!   truncation, not an error

use crate::types::RawPage;
use clap::ValueEnum;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const DEFAULT_MAX_PAGES: usize = 50;

const DOC_DIRS: &[&str] = &["docs", "documentation", "doc"];
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "html", "htm", "rst", "txt"];

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("source {0} does not exist")]
    NotFound(PathBuf),
    #[error("{0} sources are not supported by this fetcher")]
    UnsupportedSource(SourceType),
    #[error("no documentation files found in {0}")]
    NoPages(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Where a project's documentation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A local checkout or directory
    Local,
    /// A repository hosted on GitHub
    Github,
    /// A live documentation website
    Website,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceType::Local => "local",
            SourceType::Github => "github",
            SourceType::Website => "website",
        })
    }
}

/// Pages collected for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedSource {
    pub pages: Vec<RawPage>,
    /// More pages were available than `max_pages` allowed
    pub truncated: bool,
}

pub trait Fetcher: Sync {
    fn fetch(
        &self,
        url: &str,
        source_type: SourceType,
        max_pages: usize,
    ) -> Result<FetchedSource, FetchError>;
}

/// Reads documentation from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFetcher;

impl LocalFetcher {
    /// Directory the pages are collected from: a docs subdirectory if the
    /// root has one, else the root itself.
    pub fn docs_root(root: &Path) -> PathBuf {
        DOC_DIRS
            .iter()
            .map(|d| root.join(d))
            .find(|p| p.is_dir())
            .unwrap_or_else(|| root.to_path_buf())
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_doc_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| DOC_EXTENSIONS.contains(&e.as_str()))
}

fn read_page(path: &Path, source_path: String) -> Result<RawPage, FetchError> {
    let bytes = std::fs::read(path)?;
    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!("{} is not valid UTF-8, replacing invalid bytes", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(RawPage::new(source_path, content))
}

impl Fetcher for LocalFetcher {
    fn fetch(
        &self,
        url: &str,
        source_type: SourceType,
        max_pages: usize,
    ) -> Result<FetchedSource, FetchError> {
        if source_type != SourceType::Local {
            return Err(FetchError::UnsupportedSource(source_type));
        }
        let root = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        if !root.exists() {
            return Err(FetchError::NotFound(root));
        }

        if root.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(FetchedSource {
                pages: vec![read_page(&root, name)?],
                truncated: false,
            });
        }

        let docs = Self::docs_root(&root);
        let mut source = FetchedSource::default();
        let walker = WalkDir::new(&docs)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_doc_file(entry.path()) {
                continue;
            }
            if source.pages.len() == max_pages {
                source.truncated = true;
                break;
            }
            let rel = entry.path().strip_prefix(&docs).unwrap_or(entry.path());
            let source_path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            debug!("fetched {source_path}");
            source.pages.push(read_page(entry.path(), source_path)?);
        }

        if source.pages.is_empty() {
            return Err(FetchError::NoPages(docs));
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::setup_fixtures;
    use std::fs;
    use tempfile::TempDir;

    fn paths(source: &FetchedSource) -> Vec<&str> {
        source.pages.iter().map(|p| p.source_path.as_str()).collect()
    }

    #[test]
    fn prefers_docs_directory() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("README.md"), "# Outside docs").unwrap();
        let source = LocalFetcher
            .fetch(tmp.path().to_str().unwrap(), SourceType::Local, 50)
            .unwrap();
        assert!(!source.truncated);
        assert!(!paths(&source).contains(&"README.md"));
        assert!(paths(&source).contains(&"index.md"));
        assert!(paths(&source).contains(&"guide/getting-started.md"));
    }

    #[test]
    fn sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("z.md"), "z").unwrap();
        fs::write(root.join("a.rst"), "a").unwrap();
        fs::write(root.join("b/c.html"), "<p>c</p>").unwrap();
        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join(".hidden.md"), "h").unwrap();
        fs::write(root.join(".git/HEAD.txt"), "ref").unwrap();

        let source = LocalFetcher
            .fetch(root.to_str().unwrap(), SourceType::Local, 50)
            .unwrap();
        assert_eq!(paths(&source), vec!["a.rst", "b/c.html", "z.md"]);
    }

    #[test]
    fn truncation_is_recorded() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(tmp.path().join(format!("p{i}.md")), "x").unwrap();
        }
        let source = LocalFetcher
            .fetch(tmp.path().to_str().unwrap(), SourceType::Local, 3)
            .unwrap();
        assert!(source.truncated);
        assert_eq!(paths(&source), vec!["p0.md", "p1.md", "p2.md"]);

        let exact = LocalFetcher
            .fetch(tmp.path().to_str().unwrap(), SourceType::Local, 5)
            .unwrap();
        assert!(!exact.truncated);
    }

    #[test]
    fn single_file_source() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.md");
        fs::write(&file, "# Notes").unwrap();
        let url = format!("file://{}", file.display());
        let source = LocalFetcher.fetch(&url, SourceType::Local, 10).unwrap();
        assert_eq!(paths(&source), vec!["notes.md"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), [b'h', b'i', 0xff]).unwrap();
        let source = LocalFetcher
            .fetch(tmp.path().to_str().unwrap(), SourceType::Local, 10)
            .unwrap();
        assert!(source.pages[0].content.starts_with("hi"));
    }

    #[test]
    fn errors() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            LocalFetcher.fetch("/definitely/not/here", SourceType::Local, 10),
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            LocalFetcher.fetch(tmp.path().to_str().unwrap(), SourceType::Local, 10),
            Err(FetchError::NoPages(_))
        ));
        assert!(matches!(
            LocalFetcher.fetch("https://github.com/a/b", SourceType::Github, 10),
            Err(FetchError::UnsupportedSource(SourceType::Github))
        ));
    }
}
