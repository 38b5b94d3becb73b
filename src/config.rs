//! Configuration module.
//!
//! Handles loading, validating, and merging `polydoc.toml`. Stock defaults
//! are the base layer; the user file only needs the keys it overrides.
//!
//! ## Config File Location
//!
//! `polydoc.toml` in the working directory, or any path given with
//! `--config`. A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_dir = "output"                # Sites and the translation memory
//! downloads_dir = "output/downloads"   # Packaged archives
//! store_dir = "output/projects"        # One JSON file per project
//! # assets_dir = "theme/assets"        # Extra files copied into assets/
//!
//! [fetch]
//! max_pages = 50
//!
//! [translation]
//! source_lang = "en"
//! target_lang = "es"
//! batch_size = 8
//! provider = "tagging"                 # tagging | identity | glossary | command
//! # glossary = "glossary.json"         # required for provider = "glossary"
//! command = []                         # argv, required for provider = "command"
//! cache = true
//!
//! [colors.light]
//! background = "#ffffff"
//! text = "#1a1a1a"
//! text_muted = "#666666"
//! border = "#e0e0e0"
//! link = "#0b57d0"
//! link_hover = "#06357a"
//! code_background = "#f4f4f4"
//!
//! [colors.dark]
//! background = "#111111"
//! text = "#e8e8e8"
//! text_muted = "#999999"
//! border = "#333333"
//! link = "#8ab4f8"
//! link_hover = "#c2d7fb"
//! code_background = "#1d1d1d"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; set only the values you want to change:
//!
//! ```toml
//! [translation]
//! target_lang = "fr"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::languages;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up when `--config` is not given.
pub const CONFIG_FILENAME: &str = "polydoc.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `polydoc.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of built sites (`{output_dir}/sites/...`) and the translation memory.
    pub output_dir: String,
    /// Where packaged archives are written and served from.
    pub downloads_dir: String,
    /// Where the filesystem project store keeps one JSON file per project.
    pub store_dir: String,
    /// Optional directory whose files are copied into every site's `assets/`.
    pub assets_dir: Option<String>,
    pub fetch: FetchConfig,
    pub translation: TranslationConfig,
    /// Color schemes for light and dark modes.
    pub colors: ColorConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            downloads_dir: "output/downloads".to_string(),
            store_dir: "output/projects".to_string(),
            assets_dir: None,
            fetch: FetchConfig::default(),
            translation: TranslationConfig::default(),
            colors: ColorConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_pages == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_pages must be greater than 0".into(),
            ));
        }
        let t = &self.translation;
        if t.batch_size == 0 {
            return Err(ConfigError::Validation(
                "translation.batch_size must be greater than 0".into(),
            ));
        }
        for (key, code) in [("source_lang", &t.source_lang), ("target_lang", &t.target_lang)] {
            if !languages::is_supported(code) {
                return Err(ConfigError::Validation(format!(
                    "translation.{key} \"{code}\" is not a supported language"
                )));
            }
        }
        match t.provider {
            ProviderKind::Glossary if t.glossary.is_none() => {
                return Err(ConfigError::Validation(
                    "translation.glossary is required when provider = \"glossary\"".into(),
                ));
            }
            ProviderKind::Command if t.command.is_empty() => {
                return Err(ConfigError::Validation(
                    "translation.command is required when provider = \"command\"".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn downloads_path(&self) -> PathBuf {
        PathBuf::from(&self.downloads_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.store_dir)
    }
}

/// Fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Upper bound on pages collected per project. Reaching it is recorded
    /// as truncation, not an error.
    pub max_pages: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_pages: 50 }
    }
}

/// Which `translate_text` implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Tagging,
    Identity,
    Glossary,
    Command,
}

/// Translation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationConfig {
    pub source_lang: String,
    pub target_lang: String,
    /// Strings per provider call.
    pub batch_size: usize,
    pub provider: ProviderKind,
    /// JSON glossary for `provider = "glossary"`.
    pub glossary: Option<String>,
    /// Program and arguments for `provider = "command"`.
    pub command: Vec<String>,
    /// Keep a translation memory in the output directory.
    pub cache: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            batch_size: crate::translate::DEFAULT_BATCH_SIZE,
            provider: ProviderKind::default(),
            glossary: None,
            command: Vec::new(),
            cache: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Color configuration for light and dark modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Light mode color scheme.
    pub light: ColorScheme,
    /// Dark mode color scheme.
    pub dark: ColorScheme,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            light: ColorScheme::default_light(),
            dark: ColorScheme::default_dark(),
        }
    }
}

/// Individual color scheme (light or dark).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorScheme {
    /// Background color.
    pub background: String,
    /// Primary text color.
    pub text: String,
    /// Muted/secondary text color (sidebar, page footer, table of contents).
    pub text_muted: String,
    /// Border color.
    pub border: String,
    /// Link color.
    pub link: String,
    /// Link hover color.
    pub link_hover: String,
    /// Background of code blocks and inline code.
    pub code_background: String,
}

impl ColorScheme {
    pub fn default_light() -> Self {
        Self {
            background: "#ffffff".to_string(),
            text: "#1a1a1a".to_string(),
            text_muted: "#666666".to_string(),
            border: "#e0e0e0".to_string(),
            link: "#0b57d0".to_string(),
            link_hover: "#06357a".to_string(),
            code_background: "#f4f4f4".to_string(),
        }
    }

    pub fn default_dark() -> Self {
        Self {
            background: "#111111".to_string(),
            text: "#e8e8e8".to_string(),
            text_muted: "#999999".to_string(),
            border: "#333333".to_string(),
            link: "#8ab4f8".to_string(),
            link_hover: "#c2d7fb".to_string(),
            code_background: "#1d1d1d".to_string(),
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_light()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `polydoc.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# polydoc Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Built sites live in {output_dir}/sites/{project}/{language}/.
# The translation memory is {output_dir}/.translation-cache.json.
output_dir = "output"

# Packaged archives ({project}_{language}_docs.zip).
downloads_dir = "output/downloads"

# Project state, one JSON file per project.
store_dir = "output/projects"

# Extra files (fonts, logos, scripts) copied into every site's assets/.
# assets_dir = "theme/assets"

# ---------------------------------------------------------------------------
# Fetching
# ---------------------------------------------------------------------------
[fetch]
# Upper bound on pages collected per project. Hitting it is reported
# as truncation, not as an error.
max_pages = 50

# ---------------------------------------------------------------------------
# Translation
# ---------------------------------------------------------------------------
[translation]
# Language codes from `polydoc languages`.
source_lang = "en"
target_lang = "es"

# Number of strings sent to the provider per call.
batch_size = 8

# tagging  - prefix every string with [XX] (preview, no model needed)
# identity - leave text unchanged
# glossary - exact-match lookup in a JSON glossary file
# command  - pipe JSON through an external program
provider = "tagging"

# JSON file: { "es": { "Hello": "Hola" } }. Required for provider = "glossary".
# glossary = "glossary.json"

# Program and arguments. Receives {"source_lang","target_lang","texts"}
# on stdin and prints a JSON array of strings. Required for provider = "command".
command = []

# Remember translations between runs.
cache = true

# ---------------------------------------------------------------------------
# Colors - Light mode (prefers-color-scheme: light)
# ---------------------------------------------------------------------------
[colors.light]
background = "#ffffff"
text = "#1a1a1a"
text_muted = "#666666"    # Sidebar, footer, table of contents
border = "#e0e0e0"
link = "#0b57d0"
link_hover = "#06357a"
code_background = "#f4f4f4"

# ---------------------------------------------------------------------------
# Colors - Dark mode (prefers-color-scheme: dark)
# ---------------------------------------------------------------------------
[colors.dark]
background = "#111111"
text = "#e8e8e8"
text_muted = "#999999"
border = "#333333"
link = "#8ab4f8"
link_hover = "#c2d7fb"
code_background = "#1d1d1d"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for parsing, translating and rendering.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

/// Generate CSS custom properties from color config.
pub fn generate_color_css(colors: &ColorConfig) -> String {
    format!(
        r#":root {{
    --color-bg: {light_bg};
    --color-text: {light_text};
    --color-text-muted: {light_text_muted};
    --color-border: {light_border};
    --color-link: {light_link};
    --color-link-hover: {light_link_hover};
    --color-code-bg: {light_code_bg};
}}

@media (prefers-color-scheme: dark) {{
    :root {{
        --color-bg: {dark_bg};
        --color-text: {dark_text};
        --color-text-muted: {dark_text_muted};
        --color-border: {dark_border};
        --color-link: {dark_link};
        --color-link-hover: {dark_link_hover};
        --color-code-bg: {dark_code_bg};
    }}
}}"#,
        light_bg = colors.light.background,
        light_text = colors.light.text,
        light_text_muted = colors.light.text_muted,
        light_border = colors.light.border,
        light_link = colors.light.link,
        light_link_hover = colors.light.link_hover,
        light_code_bg = colors.light.code_background,
        dark_bg = colors.dark.background,
        dark_text = colors.dark.text,
        dark_text_muted = colors.dark.text_muted,
        dark_border = colors.dark.border,
        dark_link = colors.dark.link,
        dark_link_hover = colors.dark.link_hover,
        dark_code_bg = colors.dark.code_background,
    )
}
