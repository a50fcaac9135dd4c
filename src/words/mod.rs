//! Vocabulary data
//!
//! Topics and ordered word pairs for a learning/native language pair.

mod cache;
mod json;
pub mod languages;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use cache::CachedWordSource;
pub use json::JsonWordSource;

use crate::Result;

/// One vocabulary entry in a fixed language pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    /// Stable word id, shared across languages
    pub id: u64,
    /// Text in the language being learned
    pub source_text: String,
    /// Text in the learner's native language
    pub target_text: String,
    /// Position within the topic's learning sequence
    pub order: u32,
}

/// A vocabulary topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "word_count")]
    pub word_count: u32,
    #[serde(default)]
    pub icon: Option<String>,
    /// Requires an active subscription
    #[serde(default, alias = "isPremium")]
    pub premium: bool,
}

impl Topic {
    /// Whether the topic may be played with the given subscription status
    #[must_use]
    pub const fn is_accessible(&self, subscription_active: bool) -> bool {
        !self.premium || subscription_active
    }
}

/// Supplies ordered word pairs
#[async_trait]
pub trait WordSource: Send + Sync {
    /// Every word of `topic_id` that exists in both languages, ordered by
    /// `order` ascending
    ///
    /// `source_lang` is the language being learned, `target_lang` the
    /// learner's native language.
    ///
    /// # Errors
    ///
    /// Returns error if the vocabulary cannot be loaded
    async fn get_words(
        &self,
        topic_id: u64,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<WordPair>>;
}
