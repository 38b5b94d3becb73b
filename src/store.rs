//! Projects and where they are kept between phases.
//!
//! A [`Project`] accumulates the output of every phase for one source. The
//! pipeline receives a [`ProjectStore`] explicitly; there is no process-wide
//! registry.
//!
//! ## Phase state
//!
//! ```text
//! Fetched → Parsed → Translated → Built
//! ```
//!
//! Each phase requires the previous one. Re-running a phase moves
//! `phase_state` back to that phase and clears the output of every later
//! phase; output of earlier phases is never touched, so a failed translate
//! can be retried without fetching again.
//!
//! ## Storage
//!
//! [`FsProjectStore`] keeps one pretty-printed JSON file per project in the
//! store directory, written to a temporary file and renamed into place so a
//! crash never leaves a truncated project behind.

use crate::document::Document;
use crate::fetch::SourceType;
use crate::generate::BuildResult;
use crate::package::PackageResult;
use crate::types::{PageFailure, RawPage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("project {0} not found")]
    NotFound(String),
    #[error("invalid project id {0:?}")]
    InvalidId(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    Fetched,
    Parsed,
    Translated,
    Built,
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseState::Fetched => "fetched",
            PhaseState::Parsed => "parsed",
            PhaseState::Translated => "translated",
            PhaseState::Built => "built",
        }
    }

    /// Phase that must have completed before this one can run.
    pub fn requires(&self) -> Option<PhaseState> {
        match self {
            PhaseState::Fetched => None,
            PhaseState::Parsed => Some(PhaseState::Fetched),
            PhaseState::Translated => Some(PhaseState::Parsed),
            PhaseState::Built => Some(PhaseState::Translated),
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier for a source URL or path.
///
/// Last path segment of the cleaned URL (trailing `/` and `.git` removed,
/// `.` replaced by `_`), an underscore, and the first 8 hex digits of the
/// SHA-256 of the cleaned URL. `project_<hash>` when there is no segment.
pub fn project_id(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches(['/', '\\']);
    let clean = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let digest = Sha256::digest(clean.as_bytes());
    let hash = &format!("{digest:x}")[..8];
    let segment = clean
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('.', "_");
    if segment.is_empty() || segment.ends_with(':') {
        format!("project_{hash}")
    } else {
        format!("{segment}_{hash}")
    }
}

/// The unit of work spanning all phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub phase_state: PhaseState,

    // Fetched
    #[serde(default)]
    pub raw_pages: Vec<RawPage>,
    #[serde(default)]
    pub truncated: bool,

    // Parsed, keyed by source path
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
    #[serde(default)]
    pub parse_failures: Vec<PageFailure>,

    // Translated
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub translated: BTreeMap<String, Document>,
    #[serde(default)]
    pub translation_failures: Vec<PageFailure>,

    // Built
    #[serde(default)]
    pub build: Option<BuildResult>,
    #[serde(default)]
    pub package: Option<PackageResult>,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl Project {
    /// A freshly fetched project.
    pub fn new(source_url: &str, source_type: SourceType) -> Self {
        Self {
            project_id: project_id(source_url),
            source_url: source_url.to_string(),
            source_type,
            phase_state: PhaseState::Fetched,
            raw_pages: Vec::new(),
            truncated: false,
            documents: BTreeMap::new(),
            parse_failures: Vec::new(),
            source_lang: None,
            target_lang: None,
            translated: BTreeMap::new(),
            translation_failures: Vec::new(),
            build: None,
            package: None,
            last_error: None,
        }
    }

    /// Whether `phase` may run given the phases completed so far.
    pub fn can_run(&self, phase: PhaseState) -> bool {
        phase.requires().is_none_or(|needed| self.phase_state >= needed)
    }

    /// Record `phase` as the latest completed phase and drop the output of
    /// every phase after it.
    pub fn complete(&mut self, phase: PhaseState) {
        if phase < PhaseState::Built {
            self.build = None;
            self.package = None;
        }
        if phase < PhaseState::Translated {
            self.source_lang = None;
            self.target_lang = None;
            self.translated.clear();
            self.translation_failures.clear();
        }
        if phase < PhaseState::Parsed {
            self.documents.clear();
            self.parse_failures.clear();
        }
        self.phase_state = phase;
        self.last_error = None;
    }

    /// Name used for the built site: the project id.
    pub fn name(&self) -> &str {
        &self.project_id
    }
}

/// Persistence for projects, keyed by id.
pub trait ProjectStore: Sync {
    fn get(&self, project_id: &str) -> Result<Project, StoreError>;
    fn put(&self, project: &Project) -> Result<(), StoreError>;
    /// Ids of every stored project, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// One `{id}.json` file per project.
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    dir: PathBuf,
}

impl FsProjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, project_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !project_id.is_empty()
            && !project_id.starts_with('.')
            && !project_id.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidId(project_id.to_string()));
        }
        Ok(self.dir.join(format!("{project_id}.json")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ProjectStore for FsProjectStore {
    fn get(&self, project_id: &str) -> Result<Project, StoreError> {
        let path = self.path(project_id)?;
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(project_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn put(&self, project: &Project) -> Result<(), StoreError> {
        let path = self.path(&project.project_id)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", project.project_id));
        fs::write(&tmp, serde_json::to_string_pretty(project)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".json")
                && !id.starts_with('.')
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Projects held in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<String, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn get(&self, project_id: &str) -> Result<Project, StoreError> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))
    }

    fn put(&self, project: &Project) -> Result<(), StoreError> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project.project_id.clone(), project.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FormatHint;
    use tempfile::TempDir;

    fn sample() -> Project {
        let mut p = Project::new("https://github.com/acme/widgets.git", SourceType::Github);
        p.raw_pages.push(RawPage::new("a.md", "# A"));
        p.documents
            .insert("a.md".into(), Document::new("a.md", FormatHint::Markdown));
        p
    }

    // =========================================================================
    // project_id
    // =========================================================================

    #[test]
    fn project_id_from_url() {
        let id = project_id("https://github.com/acme/widgets.git");
        assert!(id.starts_with("widgets_"), "{id}");
        assert_eq!(id.len(), "widgets_".len() + 8);
        // Same cleaned URL, same id
        assert_eq!(id, project_id("https://github.com/acme/widgets/"));
        assert_ne!(id, project_id("https://github.com/other/widgets"));
    }

    #[test]
    fn project_id_replaces_dots() {
        let id = project_id("https://docs.example.com");
        assert!(id.starts_with("docs_example_com_"), "{id}");
    }

    #[test]
    fn project_id_without_segment() {
        assert!(project_id("/").starts_with("project_"));
        assert!(project_id("https://").starts_with("project_"));
    }

    // =========================================================================
    // Phases
    // =========================================================================

    #[test]
    fn phases_are_ordered() {
        assert!(PhaseState::Fetched < PhaseState::Parsed);
        assert!(PhaseState::Translated < PhaseState::Built);
        assert_eq!(PhaseState::Built.requires(), Some(PhaseState::Translated));
        assert_eq!(PhaseState::Fetched.requires(), None);
    }

    #[test]
    fn can_run_needs_previous_phase() {
        let mut p = sample();
        assert!(p.can_run(PhaseState::Fetched));
        assert!(p.can_run(PhaseState::Parsed));
        assert!(!p.can_run(PhaseState::Translated));
        p.phase_state = PhaseState::Built;
        assert!(p.can_run(PhaseState::Parsed));
        assert!(p.can_run(PhaseState::Built));
    }

    #[test]
    fn completing_earlier_phase_clears_later_output() {
        let mut p = sample();
        p.target_lang = Some("es".into());
        p.translated = p.documents.clone();
        p.phase_state = PhaseState::Translated;
        p.last_error = Some("boom".into());

        p.complete(PhaseState::Parsed);
        assert_eq!(p.phase_state, PhaseState::Parsed);
        assert!(p.translated.is_empty());
        assert!(p.target_lang.is_none());
        assert!(p.last_error.is_none());
        // Earlier output untouched
        assert_eq!(p.documents.len(), 1);
        assert_eq!(p.raw_pages.len(), 1);
    }

    #[test]
    fn phase_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PhaseState::Translated).unwrap(),
            "\"translated\""
        );
    }

    // =========================================================================
    // Stores
    // =========================================================================

    #[test]
    fn fs_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FsProjectStore::new(tmp.path().join("projects"));
        let p = sample();
        store.put(&p).unwrap();
        assert_eq!(store.get(&p.project_id).unwrap(), p);
        assert_eq!(store.list().unwrap(), vec![p.project_id.clone()]);
        // No temp files left behind
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn fs_store_missing_project() {
        let tmp = TempDir::new().unwrap();
        let store = FsProjectStore::new(tmp.path());
        assert!(matches!(store.get("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get("../etc"), Err(StoreError::InvalidId(_))));
        assert!(FsProjectStore::new(tmp.path().join("absent")).list().unwrap().is_empty());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryProjectStore::new();
        let p = sample();
        store.put(&p).unwrap();
        assert_eq!(store.get(&p.project_id).unwrap(), p);
        assert_eq!(store.list().unwrap(), vec![p.project_id.clone()]);
        assert!(store.get("other").is_err());
    }
}
