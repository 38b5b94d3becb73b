//! The `translate_text` capability and its providers.
//!
//! [`TextTranslator`] is the single seam between the pipeline and whatever
//! performs translation. Every provider takes a list of strings and returns
//! the same number of strings, in the same order.
//!
//! | Provider | Behavior |
//! |----------|----------|
//! | [`IdentityTranslator`] | returns its input |
//! | [`TaggingTranslator`] | prefixes `[XX] ` (target code upper-cased) |
//! | [`GlossaryTranslator`] | exact-match lookup in a JSON glossary |
//! | [`CommandTranslator`] | pipes JSON through an external program |
//!
//! Wrapping any of these in [`CachedTranslator`](crate::cache::CachedTranslator)
//! adds a persistent translation memory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider returned {got} translations for {expected} inputs")]
    LengthMismatch { expected: usize, got: usize },
    #[error("no glossary entry for {text:?} ({target})")]
    MissingEntry { target: String, text: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("translation command failed: {0}")]
    Command(String),
    #[error("translation failed: {0}")]
    Failed(String),
}

/// Translate a list of strings from one language to another.
///
/// Implementations must return exactly one output per input, in order.
/// `Sync` so one provider can serve documents translated in parallel.
pub trait TextTranslator: Sync {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    fn translate_text(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Check a provider's output count against its input.
pub fn check_length(expected: usize, got: &[String]) -> Result<(), ProviderError> {
    if got.len() == expected {
        Ok(())
    } else {
        Err(ProviderError::LengthMismatch {
            expected,
            got: got.len(),
        })
    }
}

/// Returns every string unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

impl TextTranslator for IdentityTranslator {
    fn name(&self) -> &str {
        "identity"
    }

    fn translate_text(
        &self,
        texts: &[String],
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(texts.to_vec())
    }
}

/// Marks each string with the target language: `Hello` → `[ES] Hello`.
///
/// Lets a whole site be previewed in its target layout before a real
/// translation backend is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaggingTranslator;

impl TextTranslator for TaggingTranslator {
    fn name(&self) -> &str {
        "tagging"
    }

    fn translate_text(
        &self,
        texts: &[String],
        _source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let tag = target_lang.to_uppercase();
        Ok(texts.iter().map(|t| format!("[{tag}] {t}")).collect())
    }
}

/// Exact-match lookup in a glossary of the form
/// `{ "<target>": { "<source text>": "<translation>" } }`.
///
/// A string without an entry is an error, never a passthrough.
#[derive(Debug, Default, Clone)]
pub struct GlossaryTranslator {
    entries: HashMap<String, HashMap<String, String>>,
}

impl GlossaryTranslator {
    pub fn new(entries: HashMap<String, HashMap<String, String>>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }
}

impl TextTranslator for GlossaryTranslator {
    fn name(&self) -> &str {
        "glossary"
    }

    fn translate_text(
        &self,
        texts: &[String],
        _source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let table = self.entries.get(target_lang);
        texts
            .iter()
            .map(|text| {
                table
                    .and_then(|t| t.get(text))
                    .cloned()
                    .ok_or_else(|| ProviderError::MissingEntry {
                        target: target_lang.to_string(),
                        text: text.clone(),
                    })
            })
            .collect()
    }
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    source_lang: &'a str,
    target_lang: &'a str,
    texts: &'a [String],
}

/// Runs an external program once per request.
///
/// The program receives `{"source_lang", "target_lang", "texts": [...]}`
/// on stdin and must print a JSON array of strings on stdout. A non-zero
/// exit status is an error carrying the program's stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTranslator {
    program: String,
    args: Vec<String>,
}

impl CommandTranslator {
    /// `argv[0]` is the program; the rest are its arguments.
    pub fn new(argv: &[String]) -> Result<Self, ProviderError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ProviderError::Command("empty command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl TextTranslator for CommandTranslator {
    fn name(&self) -> &str {
        "command"
    }

    fn translate_text(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let request = serde_json::to_vec(&CommandRequest {
            source_lang,
            target_lang,
            texts,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from another thread so a chatty child cannot block on a
        // full stdout pipe while we are still writing.
        let stdin = child.stdin.take();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&request)?;
            }
            Ok(())
        });
        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Command("stdin writer panicked".into())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        let translations: Vec<String> = serde_json::from_slice(&output.stdout)?;
        check_length(texts.len(), &translations)?;
        Ok(translations)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock provider that records every request and tags its output.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct RecordingTranslator {
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingTranslator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        /// Every string sent, flattened across calls.
        pub fn sent(&self) -> Vec<String> {
            self.get_calls().into_iter().flatten().collect()
        }
    }

    impl TextTranslator for RecordingTranslator {
        fn name(&self) -> &str {
            "recording"
        }

        fn translate_text(
            &self,
            texts: &[String],
            source_lang: &str,
            target_lang: &str,
        ) -> Result<Vec<String>, ProviderError> {
            self.calls.lock().unwrap().push(texts.to_vec());
            TaggingTranslator.translate_text(texts, source_lang, target_lang)
        }
    }

    /// Fails any request containing a string with `trigger` in it.
    pub struct FailingTranslator {
        pub trigger: String,
    }

    impl FailingTranslator {
        pub fn on(trigger: &str) -> Self {
            Self {
                trigger: trigger.to_string(),
            }
        }
    }

    impl TextTranslator for FailingTranslator {
        fn name(&self) -> &str {
            "failing"
        }

        fn translate_text(
            &self,
            texts: &[String],
            source_lang: &str,
            target_lang: &str,
        ) -> Result<Vec<String>, ProviderError> {
            if texts.iter().any(|t| t.contains(&self.trigger)) {
                return Err(ProviderError::Failed(format!("refused {:?}", self.trigger)));
            }
            TaggingTranslator.translate_text(texts, source_lang, target_lang)
        }
    }

    /// Drops the last string of every request.
    pub struct ShortTranslator;

    impl TextTranslator for ShortTranslator {
        fn name(&self) -> &str {
            "short"
        }

        fn translate_text(
            &self,
            texts: &[String],
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<Vec<String>, ProviderError> {
            let mut out = texts.to_vec();
            out.pop();
            Ok(out)
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identity_returns_input() {
        let input = strings(&["a", "b"]);
        assert_eq!(IdentityTranslator.translate_text(&input, "en", "fr").unwrap(), input);
    }

    #[test]
    fn tagging_uses_upper_case_target() {
        let out = TaggingTranslator
            .translate_text(&strings(&["Hello"]), "en", "es")
            .unwrap();
        assert_eq!(out, vec!["[ES] Hello"]);
    }

    #[test]
    fn glossary_lookup() {
        let mut es = HashMap::new();
        es.insert("Hello".to_string(), "Hola".to_string());
        let mut entries = HashMap::new();
        entries.insert("es".to_string(), es);
        let glossary = GlossaryTranslator::new(entries);

        assert_eq!(
            glossary.translate_text(&strings(&["Hello"]), "en", "es").unwrap(),
            vec!["Hola"]
        );
        let err = glossary
            .translate_text(&strings(&["Bye"]), "en", "es")
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingEntry { .. }));
        assert!(glossary.translate_text(&strings(&["Hello"]), "en", "fr").is_err());
    }

    #[test]
    fn glossary_loads_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("glossary.json");
        std::fs::write(&path, r#"{"de": {"Install": "Installieren"}}"#).unwrap();
        let glossary = GlossaryTranslator::load(&path).unwrap();
        assert_eq!(
            glossary.translate_text(&strings(&["Install"]), "en", "de").unwrap(),
            vec!["Installieren"]
        );
    }

    #[test]
    fn command_needs_a_program() {
        assert!(CommandTranslator::new(&[]).is_err());
        let cmd = CommandTranslator::new(&strings(&["translate", "--fast"])).unwrap();
        assert_eq!(cmd.program, "translate");
        assert_eq!(cmd.args, vec!["--fast"]);
    }

    #[cfg(unix)]
    #[test]
    fn command_round_trips_json() {
        let script = r#"read -r _; printf '["uno","dos"]'"#;
        let cmd = CommandTranslator::new(&strings(&["sh", "-c", script])).unwrap();
        let out = cmd
            .translate_text(&strings(&["one", "two"]), "en", "es")
            .unwrap();
        assert_eq!(out, vec!["uno", "dos"]);
    }

    #[cfg(unix)]
    #[test]
    fn command_length_mismatch() {
        let cmd = CommandTranslator::new(&strings(&["sh", "-c", r#"cat >/dev/null; printf '["x"]'"#])).unwrap();
        let err = cmd
            .translate_text(&strings(&["one", "two"]), "en", "es")
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::LengthMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_failure_reports_stderr() {
        let cmd = CommandTranslator::new(&strings(&["sh", "-c", "cat >/dev/null; echo boom >&2; exit 3"])).unwrap();
        let err = cmd.translate_text(&strings(&["x"]), "en", "es").unwrap_err();
        match err {
            ProviderError::Command(msg) => assert!(msg.contains("boom"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
