//! Audio production
//!
//! Every spoken segment is produced by one of three interchangeable tiers:
//! the pre-generated [`AudioLibrary`], a [`RemoteSynthesis`] service, or the
//! platform [`SystemSynth`]. The [`BackendChain`] tries them in order.

mod chain;
mod library;
mod output;
mod remote;
mod system;

use std::sync::Arc;

use async_trait::async_trait;

pub use chain::{BackendChain, DEFAULT_TIMEOUT, HandleSlot, SegmentOutcome};
pub use library::{AudioLibrary, AudioManifest, ManifestWord};
pub use output::{AudioFormat, Clip, ClipHandle, PLAYBACK_SAMPLE_RATE};
pub use remote::{RemoteProvider, RemoteSynthesis};
pub use system::{SayVoices, SynthProgram, SystemSynth};

use crate::Result;

/// One audio unit to produce: a word's text in one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Word id, the key for pre-generated audio
    pub word_id: u64,
    /// Text to speak
    pub text: &'a str,
    /// Language code (e.g. "es", "pt-BR")
    pub language: &'a str,
}

impl Segment<'_> {
    /// Base language code without region (e.g. "pt" for "pt-BR")
    #[must_use]
    pub fn base_language(&self) -> &str {
        base_language(self.language)
    }
}

/// Strip any region or script suffix from a language code
#[must_use]
pub fn base_language(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

/// A source of playable audio
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Short tier name used in logs
    fn name(&self) -> &'static str;

    /// Produce a handle for the segment
    ///
    /// Returns `Ok(None)` when this tier has nothing for the segment.
    ///
    /// # Errors
    ///
    /// Returns error if the tier failed while looking for audio
    async fn resolve(&self, segment: &Segment<'_>) -> Result<Option<Arc<dyn AudioHandle>>>;
}

/// A single playable audio unit
#[async_trait]
pub trait AudioHandle: Send + Sync {
    /// Play to the end at the given rate multiplier
    ///
    /// Returns early with `Ok(())` once [`AudioHandle::stop`] is called,
    /// including when it was called before `play`.
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    async fn play(&self, rate: f32) -> Result<()>;

    /// Halt playback at once. Idempotent
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_language_strips_region() {
        assert_eq!(base_language("pt-BR"), "pt");
        assert_eq!(base_language("zh_CN"), "zh");
        assert_eq!(base_language("es"), "es");
    }

    #[test]
    fn segment_base_language() {
        let segment = Segment {
            word_id: 1,
            text: "hola",
            language: "es-ES",
        };
        assert_eq!(segment.base_language(), "es");
    }
}
