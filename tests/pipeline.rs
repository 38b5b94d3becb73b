//! End-to-end tests: the library pipeline over the bundled fixtures, and the
//! `polydoc` binary driven the way a user would.

use polydoc::fetch::{LocalFetcher, SourceType};
use polydoc::pipeline::{Pipeline, RunOptions, Settings};
use polydoc::store::{FsProjectStore, PhaseState, ProjectStore};
use polydoc::translate::provider::{IdentityTranslator, TaggingTranslator};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn fixtures_url() -> String {
    fixtures_dir().to_str().unwrap().to_string()
}

fn options(target_lang: &str, package: bool) -> RunOptions {
    RunOptions {
        source_type: SourceType::Local,
        max_pages: None,
        source_lang: "en".into(),
        target_lang: target_lang.into(),
        project_name: Some("widgets".into()),
        create_package: package,
    }
}

// ===========================================================================
// Library pipeline
// ===========================================================================

#[test]
fn phases_resume_from_the_filesystem_store() {
    let out = TempDir::new().unwrap();
    let store = FsProjectStore::new(out.path().join("projects"));
    let settings = Settings::new(out.path());

    // Each phase runs with a fresh pipeline, as separate CLI invocations would.
    let id = Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, settings.clone())
        .fetch(&fixtures_url(), SourceType::Local, None)
        .unwrap()
        .project_id;
    Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, settings.clone())
        .parse(&id)
        .unwrap();
    Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, settings.clone())
        .translate(&id, "en", "es")
        .unwrap();
    let build = Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, settings)
        .build(&id, None, true)
        .unwrap();

    let project = store.get(&id).unwrap();
    assert_eq!(project.phase_state, PhaseState::Built);
    assert_eq!(project.build.as_ref(), Some(&build.build));
    assert!(out.path().join("projects").join(format!("{id}.json")).is_file());
    assert!(build.package.unwrap().zip_path.is_file());
}

#[test]
fn site_layout_and_frozen_code() {
    let out = TempDir::new().unwrap();
    let store = FsProjectStore::new(out.path().join("projects"));
    let pipeline = Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, Settings::new(out.path()));
    let report = pipeline.run(&fixtures_url(), &options("de", false)).unwrap();

    let site = &report.build.build.site_dir;
    assert_eq!(site, &out.path().join("sites/widgets/de"));
    for page in [
        "index.html",
        "guide/getting-started.html",
        "guide/configuration.html",
        "reference/api.html",
        "notes.html",
        "changelog.html",
        "broken.html",
        "assets/style.css",
    ] {
        assert!(site.join(page).is_file(), "{page} missing");
    }

    let index = fs::read_to_string(site.join("index.html")).unwrap();
    assert!(index.contains("lang=\"de\""));
    assert!(index.contains("[DE] Widgets"));
    assert!(index.contains("cargo install widgets"));
    assert!(!index.contains("[DE] cargo install"));
    // Link to another page of the site is rewritten to its page path
    assert!(index.contains("href=\"guide/getting-started.html\""));

    let guide = fs::read_to_string(site.join("guide/getting-started.html")).unwrap();
    assert!(guide.contains("../assets/style.css"));
    assert!(guide.contains("widgets init demo"));

    let broken = fs::read_to_string(site.join("broken.html")).unwrap();
    assert!(broken.contains("def unfinished()"));
}

#[test]
fn identity_translation_keeps_source_text() {
    let out = TempDir::new().unwrap();
    let store = FsProjectStore::new(out.path().join("projects"));
    let pipeline = Pipeline::new(&store, &LocalFetcher, &IdentityTranslator, Settings::new(out.path()));
    let report = pipeline.run(&fixtures_url(), &options("en", false)).unwrap();

    let id = report.fetch.project_id;
    let project = store.get(&id).unwrap();
    assert_eq!(project.documents, project.translated);
}

#[test]
fn packaged_archive_mirrors_site() {
    let out = TempDir::new().unwrap();
    let store = FsProjectStore::new(out.path().join("projects"));
    let pipeline = Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, Settings::new(out.path()));
    let report = pipeline.run(&fixtures_url(), &options("ja", true)).unwrap();

    let package = report.build.package.unwrap();
    assert_eq!(package.zip_name, "widgets_ja_docs.zip");
    let mut archive = zip::ZipArchive::new(File::open(&package.zip_path).unwrap()).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"widgets/ja/index.html".to_string()));
    assert!(names.contains(&"widgets/ja/assets/style.css".to_string()));
    assert!(names.iter().all(|n| n.starts_with("widgets/ja/")));

    let bytes = pipeline.download(&package.zip_name).unwrap();
    assert_eq!(bytes.len() as u64, package.size_bytes);
}

#[test]
fn rebuilding_is_byte_identical() {
    let out = TempDir::new().unwrap();
    let store = FsProjectStore::new(out.path().join("projects"));
    let pipeline = Pipeline::new(&store, &LocalFetcher, &TaggingTranslator, Settings::new(out.path()));
    let report = pipeline.run(&fixtures_url(), &options("ko", false)).unwrap();
    let id = report.fetch.project_id;
    let site = report.build.build.site_dir;

    let before = snapshot(&site);
    pipeline.build(&id, Some("widgets"), false).unwrap();
    assert_eq!(before, snapshot(&site));
}

fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<(PathBuf, Vec<u8>)> = walkdir::WalkDir::new(dir)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            (
                e.path().strip_prefix(dir).unwrap().to_path_buf(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

// ===========================================================================
// CLI
// ===========================================================================

fn polydoc(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_polydoc"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

fn write_config(dir: &Path) -> PathBuf {
    let out = dir.join("output");
    let config = format!(
        "output_dir = '{out}'\ndownloads_dir = '{out}/downloads'\nstore_dir = '{out}/projects'\n\n[translation]\ntarget_lang = \"fr\"\n",
        out = out.display()
    );
    let path = dir.join("polydoc.toml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn cli_run_emits_json_envelope() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    let result = polydoc(
        &config,
        &["--json", "run", &fixtures_url(), "--name", "widgets", "--package"],
    );
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let json: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["translate"]["target_lang"], "fr");
    assert_eq!(json["build"]["package"]["zip_name"], "widgets_fr_docs.zip");
    assert!(tmp.path().join("output/sites/widgets/fr/index.html").is_file());
    assert!(tmp.path().join("output/.translation-cache.json").is_file());
}

#[test]
fn cli_errors_are_reported_in_envelope() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    let result = polydoc(&config, &["--json", "status", "nope"]);
    assert!(!result.status.success());
    let json: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json["message"].as_str().unwrap().contains("nope"));
}

#[test]
fn cli_languages_and_gen_config() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let result = polydoc(&config, &["languages"]);
    assert!(result.status.success());
    let text = String::from_utf8(result.stdout).unwrap();
    assert!(text.lines().any(|l| l.starts_with("hi") && l.contains("Hindi")));

    let result = polydoc(&config, &["gen-config"]);
    assert!(result.status.success());
    let stock: toml::Value = toml::from_str(&String::from_utf8(result.stdout).unwrap()).unwrap();
    assert_eq!(stock["translation"]["source_lang"].as_str(), Some("en"));
}
