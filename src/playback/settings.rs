//! User-adjustable playback pacing

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fewest times a segment is spoken
pub const MIN_REPEATS: u8 = 1;

/// Most times a segment is spoken
pub const MAX_REPEATS: u8 = 5;

/// How fast words are pronounced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PronunciationSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl PronunciationSpeed {
    /// Playback-rate multiplier applied by every audio backend
    #[must_use]
    pub const fn rate(self) -> f32 {
        match self {
            Self::Slow => 0.7,
            Self::Normal => 1.0,
            Self::Fast => 1.3,
        }
    }

    /// Lowercase name as used in config files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for PronunciationSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PronunciationSpeed {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "slow" => Ok(Self::Slow),
            "normal" => Ok(Self::Normal),
            "fast" => Ok(Self::Fast),
            other => Err(Error::Config(format!(
                "unknown pronunciation speed \"{other}\" (expected slow, normal or fast)"
            ))),
        }
    }
}

/// Pacing applied to every word pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Advance through the whole list instead of stopping after one word
    pub auto_play: bool,

    /// Speed of every spoken unit
    pub pronunciation_speed: PronunciationSpeed,

    /// Seconds of silence between the learning and native segments
    pub pause_between_languages: f64,

    /// Seconds of silence before advancing to the next word
    pub pause_between_words: f64,

    /// Times the learning-language text is spoken (1..=5)
    pub repeat_source: u8,

    /// Times the native-language text is spoken (1..=5)
    pub repeat_target: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            auto_play: true,
            pronunciation_speed: PronunciationSpeed::Normal,
            pause_between_languages: 1.0,
            pause_between_words: 2.0,
            repeat_source: 1,
            repeat_target: 1,
        }
    }
}

impl PlaybackSettings {
    /// Clamp repeats into `1..=5` and drop negative or non-finite pauses
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.repeat_source = self.repeat_source.clamp(MIN_REPEATS, MAX_REPEATS);
        self.repeat_target = self.repeat_target.clamp(MIN_REPEATS, MAX_REPEATS);
        self.pause_between_languages = sanitize_seconds(self.pause_between_languages);
        self.pause_between_words = sanitize_seconds(self.pause_between_words);
        self
    }

    /// Pause between the two languages of a word
    #[must_use]
    pub fn language_pause(&self) -> Duration {
        seconds(self.pause_between_languages)
    }

    /// Pause before the next word
    #[must_use]
    pub fn word_pause(&self) -> Duration {
        seconds(self.pause_between_words)
    }
}

fn sanitize_seconds(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(sanitize_seconds(value)).unwrap_or(Duration::ZERO)
}

/// Settings shared between the user and a running sequencer
///
/// Readers take a snapshot at each segment boundary, so an update never
/// affects audio already in flight.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<PlaybackSettings>>,
}

impl SharedSettings {
    /// Wrap settings for sharing
    #[must_use]
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Current settings, normalized
    #[must_use]
    pub fn snapshot(&self) -> PlaybackSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .normalized()
    }

    /// Modify the settings in place
    pub fn update(&self, f: impl FnOnce(&mut PlaybackSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        tracing::debug!(settings = ?*guard, "playback settings updated");
    }

    /// Replace the settings wholesale
    pub fn replace(&self, settings: PlaybackSettings) {
        self.update(|s| *s = settings);
    }
}

impl From<PlaybackSettings> for SharedSettings {
    fn from(settings: PlaybackSettings) -> Self {
        Self::new(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_rates() {
        assert!((PronunciationSpeed::Slow.rate() - 0.7).abs() < f32::EPSILON);
        assert!((PronunciationSpeed::Normal.rate() - 1.0).abs() < f32::EPSILON);
        assert!((PronunciationSpeed::Fast.rate() - 1.3).abs() < f32::EPSILON);
    }

    #[test]
    fn speed_parses_case_insensitively() {
        assert_eq!("FAST".parse::<PronunciationSpeed>().unwrap(), PronunciationSpeed::Fast);
        assert_eq!(" slow ".parse::<PronunciationSpeed>().unwrap(), PronunciationSpeed::Slow);
        assert!("medium".parse::<PronunciationSpeed>().is_err());
    }

    #[test]
    fn normalized_clamps_repeats() {
        let settings = PlaybackSettings {
            repeat_source: 0,
            repeat_target: 9,
            ..Default::default()
        }
        .normalized();

        assert_eq!(settings.repeat_source, MIN_REPEATS);
        assert_eq!(settings.repeat_target, MAX_REPEATS);
    }

    #[test]
    fn normalized_drops_bad_pauses() {
        let settings = PlaybackSettings {
            pause_between_languages: -1.0,
            pause_between_words: f64::NAN,
            ..Default::default()
        }
        .normalized();

        assert_eq!(settings.language_pause(), Duration::ZERO);
        assert_eq!(settings.word_pause(), Duration::ZERO);
    }

    #[test]
    fn pauses_convert_to_durations() {
        let settings = PlaybackSettings {
            pause_between_languages: 0.5,
            pause_between_words: 2.0,
            ..Default::default()
        };
        assert_eq!(settings.language_pause(), Duration::from_millis(500));
        assert_eq!(settings.word_pause(), Duration::from_secs(2));
    }

    #[test]
    fn shared_settings_snapshot_sees_updates() {
        let shared = SharedSettings::from(PlaybackSettings::default());
        let handle = shared.clone();

        handle.update(|s| s.pronunciation_speed = PronunciationSpeed::Fast);
        assert_eq!(shared.snapshot().pronunciation_speed, PronunciationSpeed::Fast);

        handle.replace(PlaybackSettings {
            repeat_source: 42,
            ..Default::default()
        });
        assert_eq!(shared.snapshot().repeat_source, MAX_REPEATS);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: PlaybackSettings =
            toml::from_str("pronunciation_speed = \"slow\"\nrepeat_source = 3").unwrap();
        assert_eq!(settings.pronunciation_speed, PronunciationSpeed::Slow);
        assert_eq!(settings.repeat_source, 3);
        assert_eq!(settings.repeat_target, 1);
        assert!(settings.auto_play);
    }
}
