//! Memoized word lists

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use lru::LruCache;

use super::{WordPair, WordSource};
use crate::Result;

/// Word lists kept when no capacity is given
const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(16).unwrap();

type Key = (u64, String, String);

/// Caches word lists per topic and language pair
pub struct CachedWordSource<S> {
    inner: S,
    cache: Mutex<LruCache<Key, Vec<WordPair>>>,
}

impl<S: WordSource> CachedWordSource<S> {
    /// Wrap `inner`, keeping up to `capacity` word lists (at least one)
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The wrapped source
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Fetch and cache a word list ahead of time
    ///
    /// # Errors
    ///
    /// Returns error if the wrapped source fails
    pub async fn preload(&self, topic_id: u64, source_lang: &str, target_lang: &str) -> Result<()> {
        self.get_words(topic_id, source_lang, target_lang).await.map(|_| ())
    }

    /// Number of cached lists
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<S: WordSource> WordSource for CachedWordSource<S> {
    async fn get_words(
        &self,
        topic_id: u64,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<WordPair>> {
        let key = (topic_id, source_lang.to_string(), target_lang.to_string());

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(words) = cached {
            tracing::trace!(topic_id, source_lang, target_lang, "word list cache hit");
            return Ok(words);
        }

        let words = self.inner.get_words(topic_id, source_lang, target_lang).await?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, words.clone());
        Ok(words)
    }
}
