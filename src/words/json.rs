//! Word source backed by the static JSON data files
//!
//! Layout of the data directory:
//!
//! ```text
//! topics.json       [{"id": 1, "name": "Greetings", ...}, ...]
//! vocabulary.json   {"1": [{"id": 10, "english": "hello",
//!                           "translations": {"es": {"word": "hola"}},
//!                           "learning_order": 1}, ...], ...}
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::{Topic, WordPair, WordSource};
use crate::{Error, Result};

/// Language whose text lives in the `english` field instead of `translations`
const BASE_LANGUAGE: &str = "en";

/// One vocabulary entry; any text field may be absent or null
#[derive(Debug, Deserialize)]
struct RawWord {
    id: u64,
    #[serde(default)]
    english: Option<String>,
    #[serde(default)]
    translations: Option<HashMap<String, Option<RawTranslation>>>,
    #[serde(default)]
    learning_order: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawTranslation {
    #[serde(default)]
    word: Option<String>,
}

impl RawWord {
    fn text(&self, language: &str) -> Option<&str> {
        let text = if language == BASE_LANGUAGE {
            self.english.as_deref()?
        } else {
            self.translations
                .as_ref()?
                .get(language)?
                .as_ref()?
                .word
                .as_deref()?
        };
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }

    fn languages(&self) -> impl Iterator<Item = &String> {
        self.translations.iter().flat_map(HashMap::keys)
    }
}

/// Reads `topics.json` and `vocabulary.json` from a data directory
#[derive(Debug, Clone)]
pub struct JsonWordSource {
    dir: PathBuf,
}

impl JsonWordSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Data directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All topics in file order
    ///
    /// # Errors
    ///
    /// Returns error if `topics.json` is missing or malformed
    pub async fn topics(&self) -> Result<Vec<Topic>> {
        let path = self.dir.join("topics.json");
        let content = read(&path).await?;
        let topics: Vec<Topic> = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), topics = topics.len(), "loaded topics");
        Ok(topics)
    }

    /// Look up one topic
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id
    pub async fn topic(&self, topic_id: u64) -> Result<Topic> {
        self.topics()
            .await?
            .into_iter()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| Error::NotFound(format!("topic {topic_id}")))
    }

    /// Language codes with at least one word in the topic, sorted
    ///
    /// English is always included.
    ///
    /// # Errors
    ///
    /// Returns error if `vocabulary.json` is missing or malformed
    pub async fn available_languages(&self, topic_id: u64) -> Result<Vec<String>> {
        let words = self.topic_words(topic_id).await?;

        let mut languages = BTreeSet::from([BASE_LANGUAGE.to_string()]);
        for word in &words {
            languages.extend(word.languages().cloned());
        }
        Ok(languages.into_iter().collect())
    }

    async fn topic_words(&self, topic_id: u64) -> Result<Vec<RawWord>> {
        let path = self.dir.join("vocabulary.json");
        let content = read(&path).await?;
        let mut all: HashMap<String, Vec<RawWord>> = serde_json::from_str(&content)?;
        Ok(all.remove(&topic_id.to_string()).unwrap_or_default())
    }
}

#[async_trait]
impl WordSource for JsonWordSource {
    async fn get_words(
        &self,
        topic_id: u64,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<WordPair>> {
        let raw = self.topic_words(topic_id).await?;
        let total = raw.len();

        let mut words: Vec<WordPair> = raw
            .iter()
            .enumerate()
            .filter_map(|(position, word)| {
                let source_text = word.text(source_lang)?;
                let target_text = word.text(target_lang)?;
                let fallback = u32::try_from(position + 1).unwrap_or(u32::MAX);
                Some(WordPair {
                    id: word.id,
                    source_text: source_text.to_string(),
                    target_text: target_text.to_string(),
                    order: word.learning_order.unwrap_or(fallback),
                })
            })
            .collect();
        words.sort_by_key(|w| w.order);

        tracing::debug!(
            topic_id,
            source_lang,
            target_lang,
            words = words.len(),
            skipped = total - words.len(),
            "loaded word pairs"
        );
        Ok(words)
    }
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Data(format!("{} not found", path.display()))
        } else {
            Error::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCABULARY: &str = r#"{
        "1": [
            {"id": 11, "english": "goodbye", "translations": {"es": {"word": "adiós"}}, "learning_order": 2},
            {"id": 10, "english": "hello", "translations": {"es": {"word": "hola"}, "fr": {"word": "bonjour"}}, "learning_order": 1},
            {"id": 12, "english": "thanks", "translations": {"fr": {"word": "merci"}}, "learning_order": 3},
            {"id": 13, "english": "  ", "translations": {"es": {"word": "nada"}}, "learning_order": 4}
        ]
    }"#;

    fn write_data(dir: &Path) {
        std::fs::write(dir.join("vocabulary.json"), VOCABULARY).unwrap();
        std::fs::write(
            dir.join("topics.json"),
            r#"[{"id": 1, "name": "Greetings"}, {"id": 2, "name": "Travel", "premium": true}]"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn words_are_filtered_and_ordered() {
        let dir = tempfile::TempDir::new().unwrap();
        write_data(dir.path());
        let source = JsonWordSource::new(dir.path());

        let words = source.get_words(1, "es", "en").await.unwrap();
        let ids: Vec<u64> = words.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(words[0].source_text, "hola");
        assert_eq!(words[0].target_text, "hello");
    }

    #[tokio::test]
    async fn unknown_topic_has_no_words() {
        let dir = tempfile::TempDir::new().unwrap();
        write_data(dir.path());
        let source = JsonWordSource::new(dir.path());

        assert!(source.get_words(99, "es", "en").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn languages_include_english() {
        let dir = tempfile::TempDir::new().unwrap();
        write_data(dir.path());
        let source = JsonWordSource::new(dir.path());

        let languages = source.available_languages(1).await.unwrap();
        assert_eq!(languages, vec!["en", "es", "fr"]);
        assert_eq!(source.available_languages(99).await.unwrap(), vec!["en"]);
    }

    #[tokio::test]
    async fn topic_lookup() {
        let dir = tempfile::TempDir::new().unwrap();
        write_data(dir.path());
        let source = JsonWordSource::new(dir.path());

        assert!(source.topic(2).await.unwrap().premium);
        assert!(matches!(source.topic(5).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn null_fields_skip_only_their_word() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("vocabulary.json"),
            r#"{
                "1": [
                    {"id": 1, "english": "hello", "translations": {"es": {"word": "hola"}}, "learning_order": 1},
                    {"id": 2, "english": null, "translations": {"es": {"word": "adiós"}}, "learning_order": 2},
                    {"id": 3, "english": "please", "translations": null, "learning_order": 3},
                    {"id": 4, "english": "thanks", "translations": {"es": {"word": null}}, "learning_order": 4},
                    {"id": 5, "english": "yes", "translations": {"es": null, "fr": {"word": "oui"}}, "learning_order": 5},
                    {"id": 6, "english": "no", "translations": {"es": {"word": "no"}}, "learning_order": null}
                ]
            }"#,
        )
        .unwrap();
        let source = JsonWordSource::new(dir.path());

        let words = source.get_words(1, "es", "en").await.unwrap();
        let ids: Vec<u64> = words.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 6]);
        assert_eq!(words[1].order, 6);

        let languages = source.available_languages(1).await.unwrap();
        assert_eq!(languages, vec!["en", "es", "fr"]);
    }

    #[tokio::test]
    async fn missing_files_are_data_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = JsonWordSource::new(dir.path());

        assert!(matches!(source.topics().await, Err(Error::Data(_))));
        assert!(matches!(source.get_words(1, "es", "en").await, Err(Error::Data(_))));
    }
}
