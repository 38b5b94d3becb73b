//! Parser stage: raw page content → [`Document`].
//!
//! Each format has its own reader producing top-level segments; this module
//! picks the reader from the page's [`FormatHint`], strips frontmatter,
//! derives the title and validates the result.
//!
//! ## Failure isolation
//!
//! [`parse_pages`] never fails as a whole. A page that cannot be parsed is
//! replaced by an empty document carrying the message under
//! `metadata["parse_error"]`, and is listed in the outcome's failures.
//!
//! ## Title
//!
//! First level-1 heading, else a `title` from frontmatter or `<title>`,
//! else the file name (see [`naming::title_from_path`]).

pub mod frontmatter;
pub mod html;
pub mod markdown;
pub mod rst;
pub mod text;

use crate::document::{self, Document, StructuralError};
use crate::naming;
use crate::types::{FormatHint, PageFailure, RawPage};
use log::{debug, warn};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid TOML frontmatter: {0}")]
    Frontmatter(#[from] toml::de::Error),
    #[error("inconsistent document structure: {0}")]
    Structural(#[from] StructuralError),
}

/// Result of parsing a batch of pages.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// One document per input page, in input order
    pub documents: Vec<Document>,
    pub failures: Vec<PageFailure>,
}

pub fn parse_page(page: &RawPage) -> Result<Document, ParseError> {
    parse_content(&page.source_path, &page.content, page.format())
}

pub fn parse_content(
    source_path: &str,
    content: &str,
    format: FormatHint,
) -> Result<Document, ParseError> {
    let (metadata, segments) = match format {
        FormatHint::Html => {
            let page = html::parse(content);
            (page.metadata, page.segments)
        }
        FormatHint::Markdown => {
            let (metadata, body) = frontmatter::split(content)?;
            (metadata, markdown::parse(body))
        }
        FormatHint::ReStructuredText => {
            let (metadata, body) = frontmatter::split(content)?;
            (metadata, rst::parse(body))
        }
        FormatHint::PlainText => {
            let (metadata, body) = frontmatter::split(content)?;
            (metadata, text::parse(body))
        }
    };

    let mut doc = Document::new(source_path, format);
    doc.metadata = metadata;
    doc.segments = segments;
    doc.title = derive_title(&doc);
    doc.anchors = doc.heading_ids();
    document::validate(&doc)?;
    debug!(
        "parsed {} ({}): {} segments",
        source_path,
        format.as_str(),
        doc.segment_count()
    );
    Ok(doc)
}

/// Title from the first level-1 heading, metadata `title`, or file name.
pub fn derive_title(doc: &Document) -> String {
    heading_title(doc)
        .or_else(|| {
            doc.metadata
                .get("title")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| naming::title_from_path(&doc.source_path))
}

/// Text of the first level-1 heading, if it has any.
pub fn heading_title(doc: &Document) -> Option<String> {
    doc.first_heading(1)
        .map(|h| h.text_content().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parse a batch of pages in parallel. Output order follows input order.
pub fn parse_pages(pages: &[RawPage]) -> ParseOutcome {
    let results: Vec<Result<Document, ParseError>> = pages.par_iter().map(parse_page).collect();

    let mut outcome = ParseOutcome::default();
    for (page, result) in pages.iter().zip(results) {
        match result {
            Ok(doc) => outcome.documents.push(doc),
            Err(e) => {
                let message = e.to_string();
                warn!("could not parse {}: {message}", page.source_path);
                outcome
                    .documents
                    .push(Document::failed(&page.source_path, page.format(), &message));
                outcome.failures.push(PageFailure {
                    source_path: page.source_path.clone(),
                    error: message,
                });
            }
        }
    }
    outcome
}
