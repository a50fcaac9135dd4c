//! Configuration management for VOCO

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{DEFAULT_TIMEOUT, RemoteProvider};
use crate::playback::PlaybackSettings;
use crate::{Error, Result};

pub use file::VocoConfigFile;

/// VOCO configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `topics.json` and `vocabulary.json`
    pub data_dir: PathBuf,

    /// Directory holding pre-generated audio and manifests
    pub audio_dir: PathBuf,

    /// Pacing applied to every word pair
    pub playback: PlaybackSettings,

    /// Audio backend configuration
    pub audio: AudioConfig,

    /// Unlocks premium topics
    pub subscription_active: bool,
}

/// Audio backend configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Bound on every resolve and every play
    pub timeout: Duration,

    /// Remote synthesis tier, if configured
    pub remote: Option<RemoteConfig>,

    /// Preferred system synthesizer program
    pub synth_program: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            remote: None,
            synth_program: None,
        }
    }
}

/// Remote synthesis service configuration
#[derive(Clone)]
pub struct RemoteConfig {
    pub provider: RemoteProvider,

    /// Service base URL (required for `universal`)
    pub url: Option<String>,

    pub api_key: Option<String>,

    pub model: Option<String>,

    pub voice: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            audio_dir: data_dir.join("audio"),
            data_dir,
            playback: PlaybackSettings::default(),
            audio: AudioConfig::default(),
            subscription_active: false,
        }
    }
}

/// Default data directory: `~/.local/share/voco` on Linux
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("voco"))
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// Precedence is env > TOML > default.
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed config file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn from_sources(
        fc: VocoConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        // Empty variables count as unset
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let data_dir = env("VOCO_DATA_DIR")
            .map(PathBuf::from)
            .or(fc.data.dir)
            .unwrap_or_else(default_data_dir);

        let audio_dir = env("VOCO_AUDIO_DIR")
            .map(PathBuf::from)
            .or(fc.data.audio_dir)
            .unwrap_or_else(|| data_dir.join("audio"));

        let timeout_secs = match env("VOCO_AUDIO_TIMEOUT") {
            Some(raw) => Some(raw.trim().parse::<f64>().map_err(|_| {
                Error::Config(format!("VOCO_AUDIO_TIMEOUT must be a number of seconds, got {raw:?}"))
            })?),
            None => fc.audio.timeout_secs,
        };
        let timeout = timeout_secs.map_or(Ok(DEFAULT_TIMEOUT), parse_timeout)?;

        let remote = Self::resolve_remote(fc.remote, &env)?;

        let synth_program = env("VOCO_SYNTH_PROGRAM").or(fc.system.program);

        let subscription_active = env("VOCO_SUBSCRIPTION_ACTIVE")
            .map(|v| v == "true" || v == "1")
            .or(fc.subscription.active)
            .unwrap_or(false);

        let config = Self {
            data_dir,
            audio_dir,
            playback: fc.playback.normalized(),
            audio: AudioConfig {
                timeout,
                remote,
                synth_program,
            },
            subscription_active,
        };

        tracing::debug!(
            data_dir = %config.data_dir.display(),
            audio_dir = %config.audio_dir.display(),
            remote = config.audio.remote.as_ref().map(|r| r.provider.as_str()),
            timeout = ?config.audio.timeout,
            "configuration resolved"
        );

        Ok(config)
    }

    /// Pick the remote provider (env > toml > inferred from available keys)
    fn resolve_remote(
        fc: file::RemoteFileConfig,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<Option<RemoteConfig>> {
        let url = env("VOCO_TTS_URL").or(fc.url);
        let openai_key = env("OPENAI_API_KEY");
        let elevenlabs_key = env("ELEVENLABS_API_KEY");

        let provider = match env("VOCO_TTS_PROVIDER").or(fc.provider) {
            Some(name) => name.parse::<RemoteProvider>()?,
            None if url.is_some() => RemoteProvider::Universal,
            None if openai_key.is_some() => RemoteProvider::OpenAi,
            None if elevenlabs_key.is_some() => RemoteProvider::ElevenLabs,
            None => return Ok(None),
        };

        let api_key = match provider {
            RemoteProvider::Universal => fc.api_key,
            RemoteProvider::OpenAi => openai_key.or(fc.api_key),
            RemoteProvider::ElevenLabs => elevenlabs_key.or(fc.api_key),
        };

        Ok(Some(RemoteConfig {
            provider,
            url,
            api_key,
            model: fc.model,
            voice: fc.voice,
        }))
    }
}

fn parse_timeout(secs: f64) -> Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(Error::Config(format!(
            "audio timeout must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("invalid audio timeout {secs}: {e}")))
}
