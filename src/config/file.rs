//! TOML configuration file loading
//!
//! Supports `~/.config/voco/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::playback::PlaybackSettings;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VocoConfigFile {
    /// Word data and audio locations
    #[serde(default)]
    pub data: DataFileConfig,

    /// Playback settings (missing keys take their defaults)
    #[serde(default)]
    pub playback: PlaybackSettings,

    /// Audio unit limits
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Remote synthesis service
    #[serde(default)]
    pub remote: RemoteFileConfig,

    /// Built-in synthesizer
    #[serde(default)]
    pub system: SystemFileConfig,

    #[serde(default)]
    pub subscription: SubscriptionFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataFileConfig {
    /// Directory holding `topics.json` and `vocabulary.json`
    pub dir: Option<PathBuf>,

    /// Directory holding pre-generated audio and manifests
    pub audio_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Bound on each resolve and play, in seconds
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteFileConfig {
    /// "universal", "openai" or "elevenlabs"
    pub provider: Option<String>,

    /// Service base URL
    pub url: Option<String>,

    pub api_key: Option<String>,

    pub model: Option<String>,

    /// Voice identifier (`OpenAI` voice name or ElevenLabs voice id)
    pub voice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SystemFileConfig {
    /// Synthesizer program name or path (e.g. "espeak-ng")
    pub program: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionFileConfig {
    /// Unlocks premium topics
    pub active: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VocoConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VocoConfigFile {
    config_file_path().map_or_else(VocoConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_from(path: &Path) -> VocoConfigFile {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return VocoConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VocoConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VocoConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voco/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voco").join("config.toml"))
}
