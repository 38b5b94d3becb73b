//! Site packaging.
//!
//! Compresses a built site into `{downloads_dir}/{project}_{lang}_docs.zip`
//! for offline distribution. Entries are rooted at `{project}/{lang}/`, so
//! unpacking reproduces the layout under `output/sites/`.
//!
//! The archive is deterministic: entries are added in sorted path order
//! with a fixed timestamp and fixed permissions, so packaging the same tree
//! twice produces identical bytes.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("site directory {0} does not exist")]
    MissingSite(PathBuf),
    #[error("site directory {0} is empty")]
    EmptySite(PathBuf),
    #[error("cannot derive project and language from {0}")]
    UnnamedSite(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageResult {
    pub zip_name: String,
    pub zip_path: PathBuf,
    pub size_bytes: u64,
    /// Size in MiB, rounded to two decimals
    pub size_mb: f64,
}

/// Archive name for a project and language.
pub fn zip_name(project: &str, lang: &str) -> String {
    format!("{project}_{lang}_docs.zip")
}

/// Files of `site_dir` as sorted, forward-slash relative paths.
fn site_files(site_dir: &Path) -> Result<Vec<(String, PathBuf)>, PackagingError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(site_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(site_dir)
            .map_err(|_| PackagingError::UnnamedSite(entry.path().to_path_buf()))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, entry.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Write `files` into a fresh archive at `path`, each under `root/`.
fn write_archive(path: &Path, root: &str, files: &[(String, PathBuf)]) -> Result<(), PackagingError> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let mut writer = ZipWriter::new(File::create(path)?);
    for (name, file) in files {
        writer.start_file(format!("{root}/{name}"), options)?;
        writer.write_all(&fs::read(file)?)?;
    }
    writer.finish()?.sync_all()?;
    Ok(())
}

/// Package `site_dir` (`.../{project}/{lang}`) into `downloads_dir`.
pub fn package_site(site_dir: &Path, downloads_dir: &Path) -> Result<PackageResult, PackagingError> {
    if !site_dir.is_dir() {
        return Err(PackagingError::MissingSite(site_dir.to_path_buf()));
    }
    let name_of = |p: Option<&Path>| {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    };
    let (Some(lang), Some(project)) = (
        name_of(Some(site_dir)),
        name_of(site_dir.parent()),
    ) else {
        return Err(PackagingError::UnnamedSite(site_dir.to_path_buf()));
    };

    let files = site_files(site_dir)?;
    if files.is_empty() {
        return Err(PackagingError::EmptySite(site_dir.to_path_buf()));
    }

    fs::create_dir_all(downloads_dir)?;
    let zip_name = zip_name(&project, &lang);
    let zip_path = downloads_dir.join(&zip_name);
    let partial = downloads_dir.join(format!(".{zip_name}.partial"));

    let written = write_archive(&partial, &format!("{project}/{lang}"), &files)
        .and_then(|()| fs::rename(&partial, &zip_path).map_err(PackagingError::from));
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    let size_bytes = fs::metadata(&zip_path)?.len();
    let size_mb = (size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
    info!("packaged {} files into {}", files.len(), zip_path.display());
    Ok(PackageResult {
        zip_name,
        zip_path,
        size_bytes,
        size_mb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn make_site(root: &Path) -> PathBuf {
        let site = root.join("sites/demo/es");
        fs::create_dir_all(site.join("guide")).unwrap();
        fs::create_dir_all(site.join("assets")).unwrap();
        fs::write(site.join("index.html"), "<h1>Hola</h1>").unwrap();
        fs::write(site.join("guide/intro.html"), "<p>Intro</p>").unwrap();
        fs::write(site.join("assets/style.css"), "body {}").unwrap();
        site
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn archive_is_rooted_at_project_and_language() {
        let tmp = TempDir::new().unwrap();
        let site = make_site(tmp.path());
        let result = package_site(&site, &tmp.path().join("downloads")).unwrap();

        assert_eq!(result.zip_name, "demo_es_docs.zip");
        assert!(result.zip_path.exists());
        assert_eq!(
            entry_names(&result.zip_path),
            vec![
                "demo/es/assets/style.css",
                "demo/es/guide/intro.html",
                "demo/es/index.html"
            ]
        );
        assert!(result.size_bytes > 0);
    }

    #[test]
    fn archive_contents_match_site() {
        let tmp = TempDir::new().unwrap();
        let site = make_site(tmp.path());
        let result = package_site(&site, tmp.path()).unwrap();
        let mut archive = zip::ZipArchive::new(File::open(&result.zip_path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("demo/es/guide/intro.html")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<p>Intro</p>");
    }

    #[test]
    fn packaging_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let site = make_site(tmp.path());
        let first = package_site(&site, &tmp.path().join("a")).unwrap();
        let second = package_site(&site, &tmp.path().join("b")).unwrap();
        assert_eq!(
            fs::read(&first.zip_path).unwrap(),
            fs::read(&second.zip_path).unwrap()
        );
    }

    #[test]
    fn size_mb_is_rounded() {
        let tmp = TempDir::new().unwrap();
        let site = make_site(tmp.path());
        let result = package_site(&site, tmp.path()).unwrap();
        assert_eq!(result.size_mb, 0.0);
        assert_eq!(result.size_mb, (result.size_mb * 100.0).round() / 100.0);
    }

    #[test]
    fn missing_site_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = package_site(&tmp.path().join("sites/none/es"), tmp.path()).unwrap_err();
        assert!(matches!(err, PackagingError::MissingSite(_)));
    }

    #[test]
    fn empty_site_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("sites/demo/fr");
        fs::create_dir_all(site.join("assets")).unwrap();
        let err = package_site(&site, tmp.path()).unwrap_err();
        assert!(matches!(err, PackagingError::EmptySite(_)));
    }

    #[test]
    fn no_partial_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let site = make_site(tmp.path());
        let downloads = tmp.path().join("dl");
        package_site(&site, &downloads).unwrap();
        let names: Vec<_> = fs::read_dir(&downloads)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["demo_es_docs.zip"]);
    }

    #[test]
    fn failed_packaging_removes_partial_file() {
        let tmp = TempDir::new().unwrap();
        let site = make_site(tmp.path());
        let downloads = tmp.path().join("dl");
        // A directory in the archive's place makes the final rename fail.
        fs::create_dir_all(downloads.join("demo_es_docs.zip/keep")).unwrap();

        let err = package_site(&site, &downloads).unwrap_err();
        assert!(matches!(err, PackagingError::Io(_)));
        assert!(!downloads.join(".demo_es_docs.zip.partial").exists());
    }
}
