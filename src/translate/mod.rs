//! Translator stage: replace translatable text in a [`Document`].
//!
//! Only `text` of translatable leaves changes: prose runs and image alt
//! text. Kinds, children, hrefs, srcs, code and raw HTML come through
//! byte-identical, and subtrees under a non-translatable segment (code,
//! raw HTML, autolinks) are never visited.
//!
//! ## Whitespace
//!
//! Each run is split into leading whitespace, core and trailing whitespace.
//! Only the core is sent to the provider and the whitespace is put back,
//! so `Call ` `code` ` then` keeps exactly one space on each side of the
//! code span. Whitespace-only runs are never sent.
//!
//! ## Failure
//!
//! All-or-nothing per document: the document is rewritten only after every
//! chunk came back with the right number of strings. One failing document
//! never affects the others in [`Translator::translate_batch`].

pub mod provider;

use crate::document::{Document, Segment};
use crate::parse::heading_title;
use log::debug;
use provider::{ProviderError, TextTranslator, check_length};
use rayon::prelude::*;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 8;

#[derive(Error, Debug)]
#[error("translation of {source_path} failed: {source}")]
pub struct TranslationError {
    pub source_path: String,
    #[source]
    pub source: ProviderError,
}

/// Segment-aware translation on top of a [`TextTranslator`].
pub struct Translator<'a> {
    provider: &'a dyn TextTranslator,
    batch_size: usize,
}

impl<'a> Translator<'a> {
    pub fn new(provider: &'a dyn TextTranslator) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Strings per provider call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn translate_document(
        &self,
        document: &Document,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Document, TranslationError> {
        let mut translated = document.clone();
        let mut slots = Vec::new();
        for segment in &mut translated.segments {
            collect_slots(segment, &mut slots);
        }
        if slots.is_empty() {
            return Ok(translated);
        }

        let spans: Vec<(usize, usize)> = slots.iter().map(|s| core_span(s)).collect();
        let cores: Vec<String> = slots
            .iter()
            .zip(&spans)
            .map(|(s, &(start, end))| s[start..end].to_string())
            .collect();

        let fail = |source| TranslationError {
            source_path: document.source_path.clone(),
            source,
        };
        let mut results = Vec::with_capacity(cores.len());
        for chunk in cores.chunks(self.batch_size) {
            let out = self
                .provider
                .translate_text(chunk, source_lang, target_lang)
                .map_err(fail)?;
            check_length(chunk.len(), &out).map_err(fail)?;
            results.extend(out);
        }

        for ((slot, (start, end)), text) in slots.into_iter().zip(spans).zip(results) {
            *slot = format!("{}{}{}", &slot[..start], text, &slot[end..]);
        }

        if heading_title(document).as_deref() == Some(document.title.as_str())
            && let Some(title) = heading_title(&translated)
        {
            translated.title = title;
        }
        debug!(
            "translated {} ({} runs, {} -> {})",
            document.source_path,
            cores.len(),
            source_lang,
            target_lang
        );
        Ok(translated)
    }

    /// Translate many documents in parallel; one result per input, in order.
    pub fn translate_batch(
        &self,
        documents: &[Document],
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<Result<Document, TranslationError>> {
        documents
            .par_iter()
            .map(|doc| self.translate_document(doc, source_lang, target_lang))
            .collect()
    }
}

/// Collect mutable references to every translatable text run with a
/// non-blank core, in document order.
fn collect_slots<'a>(segment: &'a mut Segment, out: &mut Vec<&'a mut String>) {
    if !segment.kind.is_translatable() {
        return;
    }
    let Segment { text, children, .. } = segment;
    if let Some(text) = text
        && !text.trim().is_empty()
    {
        out.push(text);
    }
    for child in children {
        collect_slots(child, out);
    }
}

/// Byte range of `s` without its leading and trailing whitespace.
fn core_span(s: &str) -> (usize, usize) {
    let start = s.len() - s.trim_start().len();
    let end = s.trim_end().len();
    (start, end.max(start))
}
