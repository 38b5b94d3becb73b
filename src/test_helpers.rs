//! Shared test utilities for the polydoc test suite.
//!
//! Provides fixture setup and lookup helpers that work with fetched pages,
//! parsed documents and generated site trees.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (_tmp, pages) = fixture_pages();
//! let docs = parse_pages(&pages).documents;
//!
//! let guide = find_document(&docs, "guide/getting-started.md");
//! assert_eq!(guide.title, "Getting Started");
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::document::Document;
use crate::fetch::{Fetcher, LocalFetcher, SourceType};
use crate::types::RawPage;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` (which holds `docs/`) to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Fixture pages as the local fetcher sees them.
///
/// The temp dir is returned so it outlives the test body.
pub fn fixture_pages() -> (TempDir, Vec<RawPage>) {
    let tmp = setup_fixtures();
    let source = LocalFetcher
        .fetch(tmp.path().to_str().unwrap(), SourceType::Local, 100)
        .unwrap();
    (tmp, source.pages)
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a document by source path. Panics if not found.
pub fn find_document<'a>(docs: &'a [Document], source_path: &str) -> &'a Document {
    docs.iter()
        .find(|d| d.source_path == source_path)
        .unwrap_or_else(|| {
            let paths: Vec<&str> = docs.iter().map(|d| d.source_path.as_str()).collect();
            panic!("document '{source_path}' not found. Available: {paths:?}")
        })
}

/// Every file under `dir`, keyed by forward-slash relative path.
pub fn read_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_pages;

    #[test]
    fn fixtures_are_copied() {
        let tmp = setup_fixtures();
        assert!(tmp.path().join("docs/index.md").is_file());
    }

    #[test]
    fn fixture_pages_cover_every_format() {
        let (_tmp, pages) = fixture_pages();
        let paths: Vec<&str> = pages.iter().map(|p| p.source_path.as_str()).collect();
        for expected in ["index.md", "notes.rst", "changelog.txt", "reference/api.html"] {
            assert!(paths.contains(&expected), "{expected} missing from {paths:?}");
        }
    }

    #[test]
    fn find_document_by_path() {
        let (_tmp, pages) = fixture_pages();
        let docs = parse_pages(&pages).documents;
        let guide = find_document(&docs, "guide/getting-started.md");
        assert_eq!(guide.title, "Getting Started");
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn find_document_missing_panics() {
        find_document(&[], "nope.md");
    }

    #[test]
    fn read_tree_uses_relative_paths() {
        let tmp = setup_fixtures();
        let tree = read_tree(tmp.path());
        assert!(tree.contains_key("docs/guide/getting-started.md"));
    }
}
