//! Phase operations over stored projects.
//!
//! [`Pipeline`] is what a frontend (the CLI, or a service) talks to. Every
//! operation loads the project from the injected [`ProjectStore`], checks the
//! phase order, runs one stage and stores the result:
//!
//! | Operation | Needs | Produces |
//! |-----------|-------|----------|
//! | [`fetch`](Pipeline::fetch) | nothing | raw pages |
//! | [`parse`](Pipeline::parse) | fetched | documents |
//! | [`translate`](Pipeline::translate) | parsed | translated documents |
//! | [`build`](Pipeline::build) | translated | site, optional archive |
//!
//! Page-level failures during parse and translate are reported as warnings
//! on a successful result. Any error returned by an operation is also stored
//! in the project's `last_error` so `status` can show it later.
//!
//! Reports are plain serializable structs. [`Envelope::from_result`] wraps
//! them into the `{"status": "success", ...}` / `{"status": "error",
//! "message": ...}` shape used for JSON output.

use crate::config::Config;
use crate::document::Document;
use crate::fetch::{DEFAULT_MAX_PAGES, FetchError, Fetcher, SourceType};
use crate::generate::{self, BuildError, BuildResult, SiteTemplate};
use crate::languages::{self, Language};
use crate::package::{self, PackageResult, PackagingError};
use crate::parse;
use crate::store::{PhaseState, Project, ProjectStore, StoreError, project_id};
use crate::translate::provider::TextTranslator;
use crate::translate::{DEFAULT_BATCH_SIZE, Translator};
use crate::types::PageFailure;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("project {project_id} is {state}: {phase} needs {required} first")]
    PhaseOrder {
        project_id: String,
        phase: PhaseState,
        required: PhaseState,
        state: PhaseState,
    },
    #[error("unsupported language {0:?}")]
    UnsupportedLanguage(String),
    #[error("project {0} has no parsed documents to translate")]
    NothingToTranslate(String),
    #[error("all {count} documents of {project_id} failed to translate")]
    AllTranslationsFailed { project_id: String, count: usize },
    #[error("invalid download name {0:?}")]
    InvalidDownload(String),
    #[error("download {0} not found")]
    DownloadNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Values the pipeline takes from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_pages: usize,
    pub batch_size: usize,
    pub output_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub template: SiteTemplate,
}

impl Settings {
    /// Defaults rooted at `output_dir`, downloads in `output_dir/downloads`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            batch_size: DEFAULT_BATCH_SIZE,
            downloads_dir: output_dir.join("downloads"),
            output_dir,
            template: SiteTemplate::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.fetch.max_pages,
            batch_size: config.translation.batch_size,
            output_dir: config.output_path(),
            downloads_dir: config.downloads_path(),
            template: SiteTemplate::from_config(config),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchReport {
    pub project_id: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub pages_fetched: usize,
    pub truncated: bool,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub source_path: String,
    pub title: String,
    pub segments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseReport {
    pub project_id: String,
    pub parsed: usize,
    pub failed: usize,
    pub pages: Vec<PageSummary>,
    pub warnings: Vec<PageFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateReport {
    pub project_id: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translated: usize,
    pub failed: usize,
    /// Documents not sent for translation because they failed to parse
    pub skipped: Vec<String>,
    pub warnings: Vec<PageFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildReport {
    pub project_id: String,
    pub project_name: String,
    pub target_lang: String,
    pub build: BuildResult,
    pub package: Option<PackageResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub project_id: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub phase_state: PhaseState,
    pub pages_fetched: usize,
    pub truncated: bool,
    pub documents_parsed: usize,
    pub parse_failures: usize,
    pub documents_translated: usize,
    pub translation_failures: usize,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub site_dir: Option<PathBuf>,
    pub package: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguagesReport {
    pub languages: &'static [Language],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectsReport {
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub fetch: FetchReport,
    pub parse: ParseReport,
    pub translate: TranslateReport,
    pub build: BuildReport,
}

/// Uniform result shape for frontends.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success(T),
    Error { message: String },
}

impl<T: Serialize> Envelope<T> {
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(report) => Envelope::Success(report),
            Err(e) => Envelope::Error {
                message: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }
}

/// Options of a whole-pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source_type: SourceType,
    pub max_pages: Option<usize>,
    pub source_lang: String,
    pub target_lang: String,
    pub project_name: Option<String>,
    pub create_package: bool,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline<'a> {
    store: &'a dyn ProjectStore,
    fetcher: &'a dyn Fetcher,
    translator: &'a dyn TextTranslator,
    settings: Settings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a dyn ProjectStore,
        fetcher: &'a dyn Fetcher,
        translator: &'a dyn TextTranslator,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            fetcher,
            translator,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Collect raw pages for `url` into a fresh project.
    ///
    /// Fetching again replaces everything stored for the project.
    pub fn fetch(
        &self,
        url: &str,
        source_type: SourceType,
        max_pages: Option<usize>,
    ) -> Result<FetchReport, PipelineError> {
        let max_pages = max_pages.unwrap_or(self.settings.max_pages);
        let source = match self.fetcher.fetch(url, source_type, max_pages) {
            Ok(source) => source,
            Err(e) => {
                let err = PipelineError::from(e);
                // Only an existing project has somewhere to keep the error
                if let Ok(existing) = self.store.get(&project_id(url)) {
                    return Err(self.record(existing, err));
                }
                return Err(err);
            }
        };

        let mut project = Project::new(url, source_type);
        project.raw_pages = source.pages;
        project.truncated = source.truncated;
        self.store.put(&project)?;

        if project.truncated {
            warn!("{}: stopped after {max_pages} pages", project.project_id);
        }
        info!(
            "fetched {} pages for {}",
            project.raw_pages.len(),
            project.project_id
        );
        Ok(FetchReport {
            project_id: project.project_id.clone(),
            source_url: project.source_url.clone(),
            source_type,
            pages_fetched: project.raw_pages.len(),
            truncated: project.truncated,
            pages: project
                .raw_pages
                .iter()
                .map(|p| p.source_path.clone())
                .collect(),
        })
    }

    /// Parse every fetched page. Pages that fail are reported, not fatal.
    pub fn parse(&self, project_id: &str) -> Result<ParseReport, PipelineError> {
        let project = self.store.get(project_id)?;
        self.apply(project, |project| {
            require(project, PhaseState::Parsed)?;
            let outcome = parse::parse_pages(&project.raw_pages);

            project.complete(PhaseState::Parsed);
            project.documents = outcome
                .documents
                .into_iter()
                .map(|d| (d.source_path.clone(), d))
                .collect();
            project.parse_failures = outcome.failures;

            let failed = project.parse_failures.len();
            info!(
                "parsed {} pages for {} ({failed} failed)",
                project.documents.len(),
                project.project_id
            );
            Ok(ParseReport {
                project_id: project.project_id.clone(),
                parsed: project.documents.len() - failed,
                failed,
                pages: project
                    .documents
                    .values()
                    .map(|d| PageSummary {
                        source_path: d.source_path.clone(),
                        title: d.title.clone(),
                        segments: d.segment_count(),
                    })
                    .collect(),
                warnings: project.parse_failures.clone(),
            })
        })
    }

    /// Translate every parsed document from `source_lang` to `target_lang`.
    ///
    /// Documents that fail are reported as warnings; the phase fails only
    /// when no document could be translated.
    pub fn translate(
        &self,
        project_id: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslateReport, PipelineError> {
        let project = self.store.get(project_id)?;
        self.apply(project, |project| {
            require(project, PhaseState::Translated)?;
            for lang in [source_lang, target_lang] {
                if !languages::is_supported(lang) {
                    return Err(PipelineError::UnsupportedLanguage(lang.to_string()));
                }
            }

            let (docs, skipped): (Vec<&Document>, Vec<&Document>) = project
                .documents
                .values()
                .partition(|d| d.parse_error().is_none());
            if docs.is_empty() {
                return Err(PipelineError::NothingToTranslate(project.project_id.clone()));
            }
            let docs: Vec<Document> = docs.into_iter().cloned().collect();
            let skipped: Vec<String> = skipped.iter().map(|d| d.source_path.clone()).collect();

            let translator =
                Translator::new(self.translator).with_batch_size(self.settings.batch_size);
            let results = translator.translate_batch(&docs, source_lang, target_lang);

            let mut translated = BTreeMap::new();
            let mut failures = Vec::new();
            for result in results {
                match result {
                    Ok(doc) => {
                        translated.insert(doc.source_path.clone(), doc);
                    }
                    Err(e) => {
                        warn!("{e}");
                        failures.push(PageFailure {
                            source_path: e.source_path.clone(),
                            error: e.source.to_string(),
                        });
                    }
                }
            }
            if translated.is_empty() {
                return Err(PipelineError::AllTranslationsFailed {
                    project_id: project.project_id.clone(),
                    count: failures.len(),
                });
            }

            project.complete(PhaseState::Translated);
            project.source_lang = Some(source_lang.to_string());
            project.target_lang = Some(target_lang.to_string());
            project.translated = translated;
            project.translation_failures = failures;

            info!(
                "translated {} documents of {} ({source_lang} -> {target_lang}, {} failed)",
                project.translated.len(),
                project.project_id,
                project.translation_failures.len()
            );
            Ok(TranslateReport {
                project_id: project.project_id.clone(),
                source_lang: source_lang.to_string(),
                target_lang: target_lang.to_string(),
                translated: project.translated.len(),
                failed: project.translation_failures.len(),
                skipped,
                warnings: project.translation_failures.clone(),
            })
        })
    }

    /// Generate the translated site, optionally packaging it for download.
    ///
    /// `project_name` names the site directory; the project id is used when
    /// it is not given.
    pub fn build(
        &self,
        project_id: &str,
        project_name: Option<&str>,
        create_package: bool,
    ) -> Result<BuildReport, PipelineError> {
        let project = self.store.get(project_id)?;
        self.apply(project, |project| {
            require(project, PhaseState::Built)?;
            let Some(target_lang) = project.target_lang.clone() else {
                return Err(phase_order(project, PhaseState::Built));
            };
            let project_name = project_name.unwrap_or(project.name()).to_string();

            let docs: Vec<Document> = project.translated.values().cloned().collect();
            let build = generate::build_site(
                &docs,
                &project_name,
                &target_lang,
                &self.settings.template,
                &self.settings.output_dir,
            )?;
            let package = if create_package {
                Some(package::package_site(
                    &build.site_dir,
                    &self.settings.downloads_dir,
                )?)
            } else {
                None
            };

            project.complete(PhaseState::Built);
            project.build = Some(build.clone());
            project.package = package.clone();
            info!(
                "built {} pages for {} into {}",
                build.total_pages,
                project.project_id,
                build.site_dir.display()
            );
            Ok(BuildReport {
                project_id: project.project_id.clone(),
                project_name,
                target_lang,
                build,
                package,
            })
        })
    }

    pub fn status(&self, project_id: &str) -> Result<StatusReport, PipelineError> {
        let project = self.store.get(project_id)?;
        let parse_failures = project.parse_failures.len();
        Ok(StatusReport {
            documents_parsed: project.documents.len() - parse_failures,
            parse_failures,
            pages_fetched: project.raw_pages.len(),
            truncated: project.truncated,
            documents_translated: project.translated.len(),
            translation_failures: project.translation_failures.len(),
            site_dir: project.build.as_ref().map(|b| b.site_dir.clone()),
            package: project.package.as_ref().map(|p| p.zip_name.clone()),
            project_id: project.project_id,
            source_url: project.source_url,
            source_type: project.source_type,
            phase_state: project.phase_state,
            source_lang: project.source_lang,
            target_lang: project.target_lang,
            last_error: project.last_error,
        })
    }

    pub fn languages(&self) -> LanguagesReport {
        LanguagesReport {
            languages: languages::all(),
        }
    }

    pub fn projects(&self) -> Result<ProjectsReport, PipelineError> {
        Ok(ProjectsReport {
            projects: self.store.list()?,
        })
    }

    /// Path of a previously built archive in the downloads directory.
    pub fn download_path(&self, filename: &str) -> Result<PathBuf, PipelineError> {
        let valid = !filename.is_empty()
            && !filename.contains(['/', '\\'])
            && !filename.contains("..");
        if !valid {
            return Err(PipelineError::InvalidDownload(filename.to_string()));
        }
        let path = self.settings.downloads_dir.join(filename);
        if !path.is_file() {
            return Err(PipelineError::DownloadNotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Contents of a previously built archive.
    pub fn download(&self, filename: &str) -> Result<Vec<u8>, PipelineError> {
        Ok(fs::read(self.download_path(filename)?)?)
    }

    /// Fetch, parse, translate and build in one go.
    pub fn run(&self, url: &str, options: &RunOptions) -> Result<RunReport, PipelineError> {
        let fetch = self.fetch(url, options.source_type, options.max_pages)?;
        let parse = self.parse(&fetch.project_id)?;
        let translate =
            self.translate(&fetch.project_id, &options.source_lang, &options.target_lang)?;
        let build = self.build(
            &fetch.project_id,
            options.project_name.as_deref(),
            options.create_package,
        )?;
        Ok(RunReport {
            fetch,
            parse,
            translate,
            build,
        })
    }

    /// Run `phase` on a copy of `project`; store the copy on success, or the
    /// untouched project with `last_error` set on failure.
    fn apply<T>(
        &self,
        project: Project,
        phase: impl FnOnce(&mut Project) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut updated = project.clone();
        match phase(&mut updated) {
            Ok(report) => {
                self.store.put(&updated)?;
                Ok(report)
            }
            Err(e) => Err(self.record(project, e)),
        }
    }

    fn record(&self, mut project: Project, err: PipelineError) -> PipelineError {
        project.last_error = Some(err.to_string());
        if let Err(store_err) = self.store.put(&project) {
            warn!(
                "could not record error for {}: {store_err}",
                project.project_id
            );
        }
        err
    }
}

fn phase_order(project: &Project, phase: PhaseState) -> PipelineError {
    PipelineError::PhaseOrder {
        project_id: project.project_id.clone(),
        phase,
        required: phase.requires().unwrap_or(phase),
        state: project.phase_state,
    }
}

fn require(project: &Project, phase: PhaseState) -> Result<(), PipelineError> {
    if project.can_run(phase) {
        Ok(())
    } else {
        Err(phase_order(project, phase))
    }
}
