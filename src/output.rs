//! CLI output formatting for all pipeline phases.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every page is shown
//! by its positional index and title, with source and output paths as
//! indented context lines. Failures are listed after the pages they concern
//! so a run can be read top to bottom as an inventory.
//!
//! # Output Format
//!
//! ## Fetch
//!
//! ```text
//! Fetched 3 pages for widgets_1a2b3c4d
//!     Source: https://github.com/acme/widgets (github)
//! 001 index.md
//! 002 guide/intro.md
//! 003 api.html
//! ```
//!
//! ## Parse
//!
//! ```text
//! 001 Widgets (12 segments)
//!     Source: index.md
//! 002 Intro (0 segments)
//!     Source: guide/intro.md
//!
//! Warnings
//!     guide/intro.md: invalid TOML frontmatter
//!
//! Parsed 1 page, 1 failed
//! ```
//!
//! ## Translate / Build
//!
//! ```text
//! Translated 2 documents en → es, 1 failed
//!     14 cached, 3 translated (17 total)
//!
//! 001 index.html
//! 002 guide/intro.html
//! Site → output/sites/widgets/es
//! Package → output/downloads/widgets_es_docs.zip (0.02 MB)
//! ```
//!
//! # Architecture
//!
//! Each phase has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::pipeline::{
    BuildReport, Envelope, FetchReport, LanguagesReport, ParseReport, ProjectsReport, RunReport,
    StatusReport, TranslateReport,
};
use crate::types::PageFailure;
use serde::Serialize;
use std::fmt::Display;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `2 pages`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `Warnings` section listing per-page failures, empty when there are none.
fn warning_lines(failures: &[PageFailure]) -> Vec<String> {
    if failures.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new(), "Warnings".to_string()];
    for failure in failures {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            failure.source_path,
            truncate(&failure.error, 100)
        ));
    }
    lines
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Phase output
// ============================================================================

pub fn format_fetch_output(report: &FetchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Fetched {} for {}",
        plural(report.pages_fetched, "page"),
        report.project_id
    )];
    lines.push(format!(
        "{}Source: {} ({})",
        indent(1),
        report.source_url,
        report.source_type
    ));
    for (i, page) in report.pages.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), page));
    }
    if report.truncated {
        lines.push(format!(
            "Stopped at {}; more pages are available",
            plural(report.pages_fetched, "page")
        ));
    }
    lines
}

pub fn print_fetch_output(report: &FetchReport) {
    print_lines(format_fetch_output(report));
}

pub fn format_parse_output(report: &ParseReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, page) in report.pages.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            page.title,
            plural(page.segments, "segment")
        ));
        lines.push(format!("{}Source: {}", indent(1), page.source_path));
    }
    lines.extend(warning_lines(&report.warnings));
    lines.push(String::new());
    lines.push(if report.failed == 0 {
        format!("Parsed {}", plural(report.parsed, "page"))
    } else {
        format!("Parsed {}, {} failed", plural(report.parsed, "page"), report.failed)
    });
    lines
}

pub fn print_parse_output(report: &ParseReport) {
    print_lines(format_parse_output(report));
}

/// Translation summary, with cache statistics when a translation memory
/// was in use.
pub fn format_translate_output(report: &TranslateReport, cache: Option<CacheStats>) -> Vec<String> {
    let mut header = format!(
        "Translated {} {} \u{2192} {}",
        plural(report.translated, "document"),
        report.source_lang,
        report.target_lang
    );
    if report.failed > 0 {
        header.push_str(&format!(", {} failed", report.failed));
    }
    let mut lines = vec![header];
    if let Some(stats) = cache
        && stats.total() > 0
    {
        lines.push(format!("{}{}", indent(1), stats));
    }
    if !report.skipped.is_empty() {
        lines.push(format!(
            "{}Skipped (parse failed): {}",
            indent(1),
            report.skipped.join(", ")
        ));
    }
    lines.extend(warning_lines(&report.warnings));
    lines
}

pub fn print_translate_output(report: &TranslateReport, cache: Option<CacheStats>) {
    print_lines(format_translate_output(report, cache));
}

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, page) in report.build.pages.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), page));
    }
    if !report.build.pages.iter().any(|p| *p == report.build.index_page) {
        lines.push(format!("Index \u{2192} {}", report.build.index_page));
    }
    lines.push(format!(
        "Site \u{2192} {}",
        report.build.site_dir.display()
    ));
    if let Some(package) = &report.package {
        lines.push(format!(
            "Package \u{2192} {} ({:.2} MB)",
            package.zip_path.display(),
            package.size_mb
        ));
    }
    lines.push(format!(
        "Built {} for {} ({})",
        plural(report.build.total_pages, "page"),
        report.project_name,
        report.target_lang
    ));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    print_lines(format_build_output(report));
}

pub fn format_status_output(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", report.project_id, report.phase_state)];
    lines.push(format!(
        "{}Source: {} ({})",
        indent(1),
        report.source_url,
        report.source_type
    ));
    let truncated = if report.truncated { ", truncated" } else { "" };
    lines.push(format!(
        "{}Fetched: {}{}",
        indent(1),
        plural(report.pages_fetched, "page"),
        truncated
    ));
    lines.push(format!(
        "{}Parsed: {}, {} failed",
        indent(1),
        report.documents_parsed,
        report.parse_failures
    ));
    if let (Some(source), Some(target)) = (&report.source_lang, &report.target_lang) {
        lines.push(format!(
            "{}Translated: {} ({source} \u{2192} {target}), {} failed",
            indent(1),
            report.documents_translated,
            report.translation_failures
        ));
    }
    if let Some(site) = &report.site_dir {
        lines.push(format!("{}Site: {}", indent(1), site.display()));
    }
    if let Some(package) = &report.package {
        lines.push(format!("{}Package: {}", indent(1), package));
    }
    if let Some(error) = &report.last_error {
        lines.push(format!("{}Last error: {}", indent(1), error));
    }
    lines
}

pub fn print_status_output(report: &StatusReport) {
    print_lines(format_status_output(report));
}

pub fn format_languages_output(report: &LanguagesReport) -> Vec<String> {
    report
        .languages
        .iter()
        .map(|l| format!("{:<4}{}", l.code, l.name))
        .collect()
}

pub fn print_languages_output(report: &LanguagesReport) {
    print_lines(format_languages_output(report));
}

pub fn format_projects_output(report: &ProjectsReport) -> Vec<String> {
    if report.projects.is_empty() {
        return vec!["No projects".to_string()];
    }
    report.projects.clone()
}

pub fn print_projects_output(report: &ProjectsReport) {
    print_lines(format_projects_output(report));
}

/// Every phase of a full run, separated by blank lines.
pub fn format_run_output(report: &RunReport, cache: Option<CacheStats>) -> Vec<String> {
    let mut lines = format_fetch_output(&report.fetch);
    lines.push(String::new());
    lines.extend(format_parse_output(&report.parse));
    lines.push(String::new());
    lines.extend(format_translate_output(&report.translate, cache));
    lines.push(String::new());
    lines.extend(format_build_output(&report.build));
    lines
}

pub fn print_run_output(report: &RunReport, cache: Option<CacheStats>) {
    print_lines(format_run_output(report, cache));
}

// ============================================================================
// JSON
// ============================================================================

/// Pretty-printed JSON envelope for any phase result.
pub fn format_json<T: Serialize, E: Display>(result: Result<T, E>) -> String {
    let envelope = Envelope::from_result(result);
    serde_json::to_string_pretty(&envelope).unwrap_or_else(|e| {
        format!(
            "{{\"status\": \"error\", \"message\": {:?}}}",
            format!("cannot serialize result: {e}")
        )
    })
}

// ============================================================================
// Tests
// ============================================================================
