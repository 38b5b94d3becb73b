//! Translation memory for incremental runs.
//!
//! Calling a translation provider is the slow (and often paid) part of the
//! pipeline. Most re-runs translate the same prose again: a typo fixed on one
//! page leaves every other run of text unchanged. This module remembers
//! every translation it has seen and only forwards new strings to the
//! wrapped provider.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The memory is **content-addressed**: the key is the SHA-256 of
//! `source_lang \0 target_lang \0 text`. It does not depend on which page or
//! segment the text came from, so moving or renaming pages never invalidates
//! it, and a sentence repeated across pages is translated once.
//!
//! Switching provider does not invalidate the memory either. Delete the file
//! (or run with `--no-cache`) to start over.
//!
//! ## Storage
//!
//! The memory is a JSON file at `<output_dir>/.translation-cache.json`,
//! loaded once when the [`CachedTranslator`] is built and written back by
//! [`CachedTranslator::save`] after the phase completes.
//!
//! ## Concurrency
//!
//! Documents translate in parallel, so the memory sits behind a `Mutex`.
//! The lock is held only for lookups and inserts, never across the call to
//! the wrapped provider.

use crate::translate::provider::{ProviderError, TextTranslator, check_length};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Name of the translation memory file within the output directory.
const CACHE_FILENAME: &str = ".translation-cache.json";

/// Version of the memory format. Bump this to invalidate all existing
/// memories when the format or key computation changes.
const CACHE_VERSION: u32 = 1;

/// On-disk translation memory: cache key → translated text.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TranslationMemory {
    pub version: u32,
    pub entries: HashMap<String, String>,
}

impl TranslationMemory {
    /// Create an empty memory (used for `--no-cache` or first run).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty memory if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(CACHE_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let memory: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if memory.version != CACHE_VERSION {
            return Self::empty();
        }
        memory
    }

    /// Save to the output directory, creating it if needed.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(output_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(output_dir.join(CACHE_FILENAME), json)
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, translation: String) {
        self.entries.insert(key, translation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SHA-256 cache key of one string for a language pair, as hex.
pub fn cache_key(source_lang: &str, target_lang: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_lang.as_bytes());
    hasher.update(b"\0");
    hasher.update(target_lang.as_bytes());
    hasher.update(b"\0");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a translate run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} translated ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} translated", self.misses)
        }
    }
}

/// Wraps a provider with a persistent [`TranslationMemory`].
///
/// Cache hits never reach the wrapped provider. Only the strings missing
/// from the memory are forwarded, in one call, in their original order.
pub struct CachedTranslator {
    inner: Box<dyn TextTranslator>,
    dir: PathBuf,
    memory: Mutex<TranslationMemory>,
    stats: Mutex<CacheStats>,
}

impl CachedTranslator {
    /// Wrap `inner`, loading any memory saved in `dir`.
    pub fn new(inner: Box<dyn TextTranslator>, dir: &Path) -> Self {
        Self::with_memory(inner, dir, TranslationMemory::load(dir))
    }

    /// Wrap `inner` with an empty memory. Saving overwrites the old one.
    pub fn fresh(inner: Box<dyn TextTranslator>, dir: &Path) -> Self {
        Self::with_memory(inner, dir, TranslationMemory::empty())
    }

    fn with_memory(inner: Box<dyn TextTranslator>, dir: &Path, memory: TranslationMemory) -> Self {
        Self {
            inner,
            dir: dir.to_path_buf(),
            memory: Mutex::new(memory),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Write the memory back to its directory.
    pub fn save(&self) -> io::Result<()> {
        let memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("saving {} translations to {}", memory.len(), self.dir.display());
        memory.save(&self.dir)
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> PathBuf {
        cache_path(&self.dir)
    }
}

impl TextTranslator for CachedTranslator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn translate_text(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| cache_key(source_lang, target_lang, t))
            .collect();
        let mut results: Vec<Option<String>> = {
            let memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            keys.iter().map(|k| memory.get(k).cloned()).collect()
        };

        let misses: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.hits += (texts.len() - misses.len()) as u32;
            stats.misses += misses.len() as u32;
        }

        if !misses.is_empty() {
            let request: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let translated = self.inner.translate_text(&request, source_lang, target_lang)?;
            check_length(request.len(), &translated)?;

            let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            for (&i, text) in misses.iter().zip(translated) {
                memory.insert(keys[i].clone(), text.clone());
                results[i] = Some(text);
            }
        }

        Ok(results.into_iter().map(Option::unwrap_or_default).collect())
    }
}

/// Resolve the translation memory path for an output directory.
pub fn cache_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_FILENAME)
}
