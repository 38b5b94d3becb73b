//! Fixed catalog of supported languages.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

const CATALOG: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "it", name: "Italian" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "ru", name: "Russian" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "hi", name: "Hindi" },
];

/// Languages written right to left. Only Arabic is in the catalog today,
/// the rest keep layouts correct for codes passed through by callers.
const RTL: &[&str] = &["ar", "he", "fa", "ur"];

pub fn all() -> &'static [Language] {
    CATALOG
}

pub fn find(code: &str) -> Option<&'static Language> {
    CATALOG.iter().find(|l| l.code == code)
}

pub fn is_supported(code: &str) -> bool {
    find(code).is_some()
}

/// `dir` attribute value for a language code.
pub fn text_direction(code: &str) -> &'static str {
    if RTL.contains(&code) { "rtl" } else { "ltr" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_required_codes_in_order() {
        let codes: Vec<_> = all().iter().map(|l| l.code).collect();
        assert_eq!(
            codes,
            vec!["en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ko", "ar", "hi"]
        );
    }

    #[test]
    fn lookup() {
        assert_eq!(find("ja").map(|l| l.name), Some("Japanese"));
        assert!(is_supported("hi"));
        assert!(!is_supported("xx"));
        assert!(!is_supported("EN"));
    }

    #[test]
    fn direction() {
        assert_eq!(text_direction("ar"), "rtl");
        assert_eq!(text_direction("he"), "rtl");
        assert_eq!(text_direction("en"), "ltr");
    }
}
