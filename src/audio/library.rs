//! Pre-generated audio files
//!
//! ```text
//! <audio_dir>/greetings-manifest.json
//! <audio_dir>/topic-<id>-manifest.json
//! <audio_dir>/<lang>/<file>
//! ```
//!
//! Manifests map word ids to a file per language. Words without a manifest
//! entry fall back to `<audio_dir>/<lang>/<word_id>.mp3` (or `.wav`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{AudioBackend, AudioFormat, AudioHandle, ClipHandle, Segment};
use crate::{Error, Result};

const MANIFEST_SUFFIX: &str = "-manifest.json";
const CONVENTION_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

/// Manifest describing one topic's generated audio
#[derive(Debug, Clone, Deserialize)]
pub struct AudioManifest {
    #[serde(default)]
    pub topic: Option<ManifestTopic>,
    #[serde(default)]
    pub statistics: Option<ManifestStatistics>,
    #[serde(default)]
    pub audio_config: Option<ManifestAudioConfig>,
    #[serde(default)]
    pub words: Vec<ManifestWord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestTopic {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub total_words: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestStatistics {
    #[serde(default)]
    pub successful: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub success_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestAudioConfig {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub voice: String,
}

/// One word's audio files keyed by language code
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestWord {
    pub id: u64,
    #[serde(default)]
    pub learning_order: Option<u32>,
    #[serde(default)]
    pub audio_files: HashMap<String, Option<String>>,
}

impl AudioManifest {
    /// Parse a manifest file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Directory of pre-generated clips
#[derive(Debug, Clone)]
pub struct AudioLibrary {
    dir: PathBuf,
    files: HashMap<(u64, String), PathBuf>,
}

impl AudioLibrary {
    /// Index every manifest in `dir`
    ///
    /// A missing directory gives an empty library. Unreadable manifests are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the directory exists but cannot be listed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut library = Self {
            dir,
            files: HashMap::new(),
        };

        let entries = match std::fs::read_dir(&library.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %library.dir.display(), "no pre-generated audio directory");
                return Ok(library);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let mut manifests: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
            })
            .collect();
        manifests.sort();

        for path in manifests {
            match AudioManifest::load(&path) {
                Ok(manifest) => library.index(&path, &manifest),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping audio manifest");
                }
            }
        }

        tracing::debug!(
            path = %library.dir.display(),
            files = library.files.len(),
            "pre-generated audio indexed"
        );
        Ok(library)
    }

    fn index(&mut self, path: &Path, manifest: &AudioManifest) {
        let mut added = 0usize;
        for word in &manifest.words {
            for (language, file) in &word.audio_files {
                let Some(file) = file.as_deref().filter(|f| !f.trim().is_empty()) else {
                    continue;
                };
                self.files
                    .insert((word.id, language.clone()), self.dir.join(language).join(file));
                added += 1;
            }
        }

        tracing::debug!(
            path = %path.display(),
            topic = manifest.topic.as_ref().map(|t| t.title.as_str()),
            voice = manifest.audio_config.as_ref().map(|c| c.voice.as_str()),
            success_rate = manifest.statistics.as_ref().map(|s| s.success_rate),
            files = added,
            "loaded audio manifest"
        );
    }

    /// Audio directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files listed by manifests
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Candidate paths for a word in priority order
    fn candidates(&self, word_id: u64, language: &str) -> Vec<PathBuf> {
        let base = super::base_language(language);
        let mut languages = vec![language];
        if base != language {
            languages.push(base);
        }

        let mut paths: Vec<PathBuf> = languages
            .iter()
            .filter_map(|lang| self.files.get(&(word_id, (*lang).to_string())).cloned())
            .collect();

        for lang in &languages {
            for ext in CONVENTION_EXTENSIONS {
                paths.push(self.dir.join(lang).join(format!("{word_id}.{ext}")));
            }
        }
        paths
    }

    /// First existing file for a word
    pub async fn find(&self, word_id: u64, language: &str) -> Option<PathBuf> {
        for path in self.candidates(word_id, language) {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }
}

#[async_trait]
impl AudioBackend for AudioLibrary {
    fn name(&self) -> &'static str {
        "pre-generated"
    }

    async fn resolve(&self, segment: &Segment<'_>) -> Result<Option<Arc<dyn AudioHandle>>> {
        let Some(path) = self.find(segment.word_id, segment.language).await else {
            return Ok(None);
        };

        let format = AudioFormat::from_path(&path).ok_or_else(|| {
            Error::Audio(format!("unsupported audio file {}", path.display()))
        })?;
        let bytes = tokio::fs::read(&path).await?;

        tracing::trace!(path = %path.display(), bytes = bytes.len(), "decoding pre-generated audio");
        let handle = tokio::task::spawn_blocking(move || ClipHandle::decode(&bytes, format))
            .await
            .map_err(|e| Error::Audio(format!("decode task failed: {e}")))??;

        Ok(Some(Arc::new(handle)))
    }
}
