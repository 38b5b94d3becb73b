//! # Polydoc
//!
//! Turns a project's documentation into a translated static site. Pages are
//! fetched from a source, parsed into a structured document model, translated
//! segment by segment, and rendered into a self-contained HTML site that can
//! be packaged as a ZIP archive for offline use.
//!
//! # Architecture: Four-Phase Pipeline
//!
//! Every project moves through four phases. Each phase stores its output on
//! the project so the next one can run later, or be retried on its own:
//!
//! ```text
//! 1. Fetch      source     →  raw pages       (files, format hints)
//! 2. Parse      raw pages  →  documents       (classified segments)
//! 3. Translate  documents  →  documents       (same structure, new text)
//! 4. Build      documents  →  output/sites/   (HTML site + optional .zip)
//! ```
//!
//! The phases are strict: a phase sees the full set of pages of the previous
//! one. Inside a phase, independent pages are processed in parallel with
//! rayon and collected back in input order, so output never depends on
//! scheduling.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Segments, documents and their structural validation |
//! | [`parse`] | Markdown, HTML, reStructuredText and plain text parsers |
//! | [`translate`] | Segment-aware translation over a pluggable text provider |
//! | [`cache`] | Content-addressed translation memory wrapping any provider |
//! | [`render`] | Segment to HTML rules shared by every generated page |
//! | [`generate`] | Site generation: pages, navigation, shared assets |
//! | [`package`] | Deterministic ZIP archives of generated sites |
//! | [`fetch`] | Where raw pages come from |
//! | [`store`] | Projects, phase state and their persistence |
//! | [`pipeline`] | The phase operations a frontend calls |
//! | [`languages`] | Supported language catalog |
//! | [`naming`] | Source path to page path, title and slug conventions |
//! | [`config`] | `polydoc.toml` loading, validation, merging, CSS generation |
//! | [`types`] | Small types shared between phases |
//! | [`output`] | CLI output formatting for every phase |
//!
//! # Design Decisions
//!
//! ## Closed Segment Kinds
//!
//! A segment's kind is a closed enum. Parsers, the translator and the
//! renderer all match on it exhaustively, so adding a kind is a compile error
//! everywhere it has not been handled yet. Whether a segment's text is
//! translatable is derived from its kind, never stored separately.
//!
//! ## Code Is Never Translated
//!
//! Code blocks, inline code, raw HTML and autolinks are frozen: their text
//! reaches the output byte for byte. Link targets, image sources and code
//! languages are attributes of the kind rather than text, so a provider never
//! sees them.
//!
//! ## Providers Behind One Trait
//!
//! Translation itself is a [`translate::provider::TextTranslator`]: a list of
//! strings in, a list of the same length out. The bundled providers cover
//! previews, glossaries and external commands; anything else (a local model,
//! a remote service) plugs in through the command provider or a new impl.
//!
//! ## All-Or-Nothing Builds
//!
//! A site is rendered into a staging directory and swapped into place only
//! after every page succeeded. A failed build leaves the previous site
//! untouched, and packaging reads only complete sites.
//!
//! ## No Global State
//!
//! Projects live in a [`store::ProjectStore`] that is handed to the
//! [`pipeline::Pipeline`] together with the fetcher and the translator. The
//! CLI uses the filesystem store; tests use the in-memory one.

pub mod cache;
pub mod config;
pub mod document;
pub mod fetch;
pub mod generate;
pub mod languages;
pub mod naming;
pub mod output;
pub mod package;
pub mod parse;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod translate;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
