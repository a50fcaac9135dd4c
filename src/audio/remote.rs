//! Remote speech synthesis

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{AudioBackend, AudioFormat, AudioHandle, ClipHandle, Segment};
use crate::config::RemoteConfig;
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_MODEL: &str = "tts-1";
const OPENAI_VOICE: &str = "alloy";

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
const ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";
const ELEVENLABS_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

/// Remote synthesis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProvider {
    /// VOCO audio service keyed by word id and language
    Universal,
    #[serde(alias = "open_ai")]
    OpenAi,
    #[serde(alias = "eleven_labs")]
    ElevenLabs,
}

impl RemoteProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Universal => "universal",
            Self::OpenAi => "openai",
            Self::ElevenLabs => "elevenlabs",
        }
    }
}

impl fmt::Display for RemoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "universal" => Ok(Self::Universal),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "elevenlabs" | "eleven_labs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Fetches or synthesizes speech over HTTP
pub struct RemoteSynthesis {
    client: reqwest::Client,
    provider: RemoteProvider,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl RemoteSynthesis {
    /// Create a client for the VOCO audio service at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty
    pub fn universal(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(Error::Config(
                "audio service URL required for universal synthesis".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider: RemoteProvider::Universal,
            base_url: trim_base(&base_url),
            api_key: String::new(),
            model: String::new(),
            voice: String::new(),
        })
    }

    /// Create a client using `OpenAI` speech synthesis
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn openai(api_key: String, voice: Option<String>, model: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider: RemoteProvider::OpenAi,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model: model.unwrap_or_else(|| OPENAI_MODEL.to_string()),
            voice: voice.unwrap_or_else(|| OPENAI_VOICE.to_string()),
        })
    }

    /// Create a client using ElevenLabs speech synthesis
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn elevenlabs(
        api_key: String,
        voice_id: Option<String>,
        model: Option<String>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider: RemoteProvider::ElevenLabs,
            base_url: ELEVENLABS_BASE_URL.to_string(),
            api_key,
            model: model.unwrap_or_else(|| ELEVENLABS_MODEL.to_string()),
            voice: voice_id.unwrap_or_else(|| ELEVENLABS_VOICE.to_string()),
        })
    }

    /// Build from the `[remote]` configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider's URL or API key is missing
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let api_key = config.api_key.clone().unwrap_or_default();
        let synth = match config.provider {
            RemoteProvider::Universal => {
                Self::universal(config.url.clone().unwrap_or_default())?
            }
            RemoteProvider::OpenAi => {
                Self::openai(api_key, config.voice.clone(), config.model.clone())?
            }
            RemoteProvider::ElevenLabs => {
                Self::elevenlabs(api_key, config.voice.clone(), config.model.clone())?
            }
        };

        // An explicit URL overrides the hosted API (proxies, compatible servers)
        Ok(match (&config.url, config.provider) {
            (Some(url), RemoteProvider::OpenAi | RemoteProvider::ElevenLabs) => {
                synth.with_base_url(url)
            }
            _ => synth,
        })
    }

    /// Point the client at a different server
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base(base_url);
        self
    }

    #[must_use]
    pub const fn provider(&self) -> RemoteProvider {
        self.provider
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch encoded audio for a segment
    ///
    /// Returns `Ok(None)` when the service has no audio for it.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service reports an error
    pub async fn fetch(&self, segment: &Segment<'_>) -> Result<Option<(Vec<u8>, AudioFormat)>> {
        let response = match self.provider {
            RemoteProvider::Universal => self.request_universal(segment).await?,
            RemoteProvider::OpenAi => self.request_openai(segment.text).await?,
            RemoteProvider::ElevenLabs => self.request_elevenlabs(segment.text).await?,
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND && self.provider == RemoteProvider::Universal {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "{} TTS error {status}: {body}",
                self.provider
            )));
        }

        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(AudioFormat::from_content_type)
            .unwrap_or(AudioFormat::Mp3);
        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Ok(None);
        }

        Ok(Some((audio.to_vec(), format)))
    }

    async fn request_universal(&self, segment: &Segment<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/api/universal-audio", self.base_url);
        let word_id = segment.word_id.to_string();

        Ok(self
            .client
            .get(&url)
            .query(&[("wordId", word_id.as_str()), ("languageCode", segment.language)])
            .send()
            .await?)
    }

    async fn request_openai(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        Ok(self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?)
    }

    async fn request_elevenlabs(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice);
        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        Ok(self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?)
    }
}

impl fmt::Debug for RemoteSynthesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSynthesis")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AudioBackend for RemoteSynthesis {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn resolve(&self, segment: &Segment<'_>) -> Result<Option<Arc<dyn AudioHandle>>> {
        let Some((bytes, format)) = self.fetch(segment).await? else {
            return Ok(None);
        };

        tracing::trace!(
            provider = %self.provider,
            bytes = bytes.len(),
            language = segment.language,
            "decoding synthesized audio"
        );
        let handle = tokio::task::spawn_blocking(move || ClipHandle::decode(&bytes, format))
            .await
            .map_err(|e| Error::Audio(format!("decode task failed: {e}")))??;

        Ok(Some(Arc::new(handle)))
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
