//! Word source integration tests

use std::path::Path;

use tempfile::TempDir;

use voco::words::languages;
use voco::{CachedWordSource, JsonWordSource, WordSource};

const TOPICS: &str = r#"[
    {"id": 1, "name": "Greetings", "description": "Hello and goodbye", "wordCount": 3},
    {"id": 2, "name": "Business", "wordCount": 2, "isPremium": true}
]"#;

const VOCABULARY: &str = r#"{
    "1": [
        {"id": 103, "english": "good night", "translations": {"es": {"word": "buenas noches"}, "tr": {"word": "iyi geceler"}}, "learning_order": 3},
        {"id": 101, "english": "hello", "translations": {"es": {"word": "hola"}, "tr": {"word": "merhaba"}}, "learning_order": 1},
        {"id": 102, "english": "goodbye", "translations": {"es": {"word": "adiós"}}, "learning_order": 2}
    ],
    "2": [
        {"id": 201, "english": "meeting", "translations": {"es": {"word": "reunión"}}},
        {"id": 202, "english": "invoice", "translations": {"es": {"word": "factura"}}}
    ]
}"#;

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "topics.json", TOPICS);
    write(dir.path(), "vocabulary.json", VOCABULARY);
    dir
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[tokio::test]
async fn test_words_ordered_by_learning_order() {
    let dir = data_dir();
    let source = JsonWordSource::new(dir.path());

    let words = source.get_words(1, "es", "en").await.unwrap();

    let pairs: Vec<(&str, &str)> = words
        .iter()
        .map(|w| (w.source_text.as_str(), w.target_text.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("hola", "hello"),
            ("adiós", "goodbye"),
            ("buenas noches", "good night")
        ]
    );
    assert!(words.windows(2).all(|w| w[0].order <= w[1].order));
}

#[tokio::test]
async fn test_words_missing_a_language_are_skipped() {
    let dir = data_dir();
    let source = JsonWordSource::new(dir.path());

    let words = source.get_words(1, "tr", "es").await.unwrap();

    let ids: Vec<u64> = words.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![101, 103]);
    assert_eq!(words[0].source_text, "merhaba");
    assert_eq!(words[0].target_text, "hola");
}

#[tokio::test]
async fn test_position_is_used_without_learning_order() {
    let dir = data_dir();
    let source = JsonWordSource::new(dir.path());

    let words = source.get_words(2, "es", "en").await.unwrap();

    let orders: Vec<u32> = words.iter().map(|w| w.order).collect();
    assert_eq!(orders, vec![1, 2]);
    assert_eq!(words[0].source_text, "reunión");
}

#[tokio::test]
async fn test_premium_topics_need_subscription() {
    let dir = data_dir();
    let source = JsonWordSource::new(dir.path());

    let topics = source.topics().await.unwrap();
    assert_eq!(topics.len(), 2);

    let greetings = &topics[0];
    assert!(greetings.is_accessible(false));
    assert_eq!(greetings.word_count, 3);

    let business = &topics[1];
    assert!(business.premium);
    assert!(!business.is_accessible(false));
    assert!(business.is_accessible(true));
}

#[tokio::test]
async fn test_available_languages() {
    let dir = data_dir();
    let source = JsonWordSource::new(dir.path());

    let codes = source.available_languages(1).await.unwrap();
    assert_eq!(codes, vec!["en", "es", "tr"]);

    let names: Vec<&str> = codes
        .iter()
        .filter_map(|c| languages::language_name(c))
        .collect();
    assert_eq!(names, vec!["English", "Spanish", "Turkish"]);
}

#[tokio::test]
async fn test_cached_source_survives_file_removal() {
    let dir = data_dir();
    let source = CachedWordSource::new(JsonWordSource::new(dir.path()), 8);

    let first = source.get_words(1, "es", "en").await.unwrap();
    std::fs::remove_file(dir.path().join("vocabulary.json")).unwrap();

    let second = source.get_words(1, "es", "en").await.unwrap();
    assert_eq!(first, second);

    // A different pair is not cached and hits the missing file
    assert!(source.get_words(1, "tr", "en").await.is_err());
}

#[tokio::test]
async fn test_malformed_vocabulary_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vocabulary.json", "{\"1\": [");
    let source = JsonWordSource::new(dir.path());

    assert!(source.get_words(1, "es", "en").await.is_err());
}
