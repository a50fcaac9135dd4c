//! Language display names

/// Code → English display name for every language the vocabulary ships
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("ca", "Catalan"),
    ("co", "Corsican"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("eu", "Basque"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("ga", "Irish"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ka", "Georgian"),
    ("ko", "Korean"),
    ("lb", "Luxembourgish"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("mk", "Macedonian"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("mt", "Maltese"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sq", "Albanian"),
    ("sr", "Serbian"),
    ("sv", "Swedish"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// Display name for a language code, ignoring any region suffix
#[must_use]
pub fn language_name(code: &str) -> Option<&'static str> {
    let base = crate::audio::base_language(code).to_lowercase();
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == base)
        .map(|(_, name)| *name)
}

/// Reverse lookup: code for a display name (case-insensitive)
#[must_use]
pub fn language_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    LANGUAGE_NAMES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(code, _)| *code)
}

/// Accept either a code ("es") or a display name ("Spanish")
#[must_use]
pub fn normalize(input: &str) -> String {
    language_code(input).map_or_else(|| input.trim().to_lowercase(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_by_code() {
        assert_eq!(language_name("es"), Some("Spanish"));
        assert_eq!(language_name("pt-BR"), Some("Portuguese"));
        assert_eq!(language_name("xx"), None);
    }

    #[test]
    fn codes_by_name() {
        assert_eq!(language_code("turkish"), Some("tr"));
        assert_eq!(language_code("Klingon"), None);
    }

    #[test]
    fn normalize_accepts_both_forms() {
        assert_eq!(normalize("Spanish"), "es");
        assert_eq!(normalize(" ES "), "es");
        assert_eq!(normalize("pt-br"), "pt-br");
    }
}
