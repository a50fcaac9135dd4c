//! Built-in speech synthesizer on `PATH`

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::{AudioBackend, AudioHandle, Segment};
use crate::playback::CancellationToken;
use crate::{Error, Result};

/// Speaking rate at 1.0x, in words per minute
const BASE_WPM: f32 = 175.0;

/// Programs tried in order when none is configured
const CANDIDATES: [&str; 3] = ["espeak-ng", "espeak", "say"];

/// Command-line flavor of a synthesizer program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthProgram {
    /// `espeak` / `espeak-ng`: `-v <lang> -s <wpm> <text>`
    Espeak,
    /// macOS `say`: `-v <voice> -r <wpm> <text>`
    Say,
}

impl SynthProgram {
    /// Flavor from a program path or name
    #[must_use]
    pub fn from_program(path: &Path) -> Self {
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.eq_ignore_ascii_case("say") {
            Self::Say
        } else {
            Self::Espeak
        }
    }

    /// Arguments for speaking `text` with `voice` at `rate`
    ///
    /// `voice` is a language code for espeak and a voice name for `say`.
    #[must_use]
    pub fn args(self, text: &str, voice: &str, rate: f32) -> Vec<String> {
        let rate_flag = match self {
            Self::Espeak => "-s",
            Self::Say => "-r",
        };
        vec![
            "-v".to_string(),
            voice.to_string(),
            rate_flag.to_string(),
            words_per_minute(rate).to_string(),
            text.to_string(),
        ]
    }
}

/// Voices installed for macOS `say`, as listed by `say -v '?'`
///
/// ```text
/// Alex                en_US    # Most people recognize me by my voice.
/// Monica              es_MX    # Hola, me llamo Mónica.
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SayVoices {
    /// (name, locale) in listing order
    voices: Vec<(String, String)>,
}

impl SayVoices {
    /// Parse the voice listing; lines that don't look like a voice are skipped
    #[must_use]
    pub fn parse(listing: &str) -> Self {
        let voices = listing
            .lines()
            .filter_map(|line| {
                let entry = line.split('#').next()?.trim_end();
                let (name, locale) = entry.rsplit_once(char::is_whitespace)?;
                let name = name.trim();
                let is_locale = locale.contains(['_', '-'])
                    && locale
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
                (!name.is_empty() && is_locale).then(|| (name.to_string(), locale.to_string()))
            })
            .collect();
        Self { voices }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Voice for a language code
    ///
    /// An exact locale match (`pt-BR` and `pt_BR`) wins over the first voice
    /// sharing the base language.
    #[must_use]
    pub fn voice_for(&self, language: &str) -> Option<&str> {
        let wanted = locale_key(language);
        let base = super::base_language(language);

        self.voices
            .iter()
            .find(|(_, locale)| locale_key(locale) == wanted)
            .or_else(|| {
                self.voices
                    .iter()
                    .find(|(_, locale)| super::base_language(locale).eq_ignore_ascii_case(base))
            })
            .map(|(name, _)| name.as_str())
    }
}

fn locale_key(code: &str) -> String {
    code.replace('-', "_").to_ascii_lowercase()
}

async fn list_say_voices(program: &Path) -> SayVoices {
    let output = Command::new(program)
        .args(["-v", "?"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let voices = SayVoices::parse(&String::from_utf8_lossy(&output.stdout));
            tracing::debug!(voices = voices.len(), "listed say voices");
            voices
        }
        Ok(output) => {
            tracing::warn!(status = %output.status, "could not list say voices");
            SayVoices::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not list say voices");
            SayVoices::default()
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn words_per_minute(rate: f32) -> u32 {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    (BASE_WPM * rate).round() as u32
}

/// Speaks through a local synthesizer program
#[derive(Debug, Clone)]
pub struct SystemSynth {
    program: Option<(SynthProgram, PathBuf)>,
    /// `say` voices, listed on first use
    voices: OnceCell<SayVoices>,
}

impl SystemSynth {
    /// Find a synthesizer, preferring `program` when given
    #[must_use]
    pub fn detect(program: Option<&str>) -> Self {
        let found = match program {
            Some(name) => which::which(name).ok(),
            None => CANDIDATES.iter().find_map(|name| which::which(name).ok()),
        };

        match &found {
            Some(path) => tracing::debug!(program = %path.display(), "system synthesizer found"),
            None => tracing::warn!(
                requested = program,
                "no system synthesizer found; last-resort speech disabled"
            ),
        }

        Self {
            program: found.map(|path| (SynthProgram::from_program(&path), path)),
            voices: OnceCell::new(),
        }
    }

    /// Use a specific program
    #[must_use]
    pub fn with_program(flavor: SynthProgram, path: impl Into<PathBuf>) -> Self {
        Self {
            program: Some((flavor, path.into())),
            voices: OnceCell::new(),
        }
    }

    /// Use a known `say` voice listing instead of asking the program
    #[must_use]
    pub fn with_voices(mut self, voices: SayVoices) -> Self {
        self.voices = OnceCell::from(voices);
        self
    }

    /// Synthesizer that never has audio
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            program: None,
            voices: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.program.is_some()
    }

    /// Program path, if one was found
    #[must_use]
    pub fn program(&self) -> Option<&Path> {
        self.program.as_ref().map(|(_, path)| path.as_path())
    }
}

#[async_trait]
impl AudioBackend for SystemSynth {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn resolve(&self, segment: &Segment<'_>) -> Result<Option<Arc<dyn AudioHandle>>> {
        let Some((flavor, program)) = &self.program else {
            return Ok(None);
        };
        if segment.text.trim().is_empty() {
            return Ok(None);
        }

        let voice = match flavor {
            SynthProgram::Espeak => segment.base_language().to_lowercase(),
            SynthProgram::Say => {
                let voices = self.voices.get_or_init(|| list_say_voices(program)).await;
                let Some(voice) = voices.voice_for(segment.language) else {
                    tracing::debug!(language = segment.language, "no say voice for language");
                    return Ok(None);
                };
                voice.to_string()
            }
        };

        Ok(Some(Arc::new(Utterance {
            flavor: *flavor,
            program: program.clone(),
            text: segment.text.to_string(),
            voice,
            stop: CancellationToken::new(),
        })))
    }
}

/// One run of the synthesizer program
struct Utterance {
    flavor: SynthProgram,
    program: PathBuf,
    text: String,
    voice: String,
    stop: CancellationToken,
}

impl fmt::Debug for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utterance")
            .field("program", &self.program)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AudioHandle for Utterance {
    async fn play(&self, rate: f32) -> Result<()> {
        if self.stop.is_cancelled() {
            return Ok(());
        }

        let args = self.flavor.args(&self.text, &self.voice, rate);
        tracing::trace!(program = %self.program.display(), ?args, "running synthesizer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Synthesis(format!("failed to run {}: {e}", self.program.display()))
            })?;

        let status = tokio::select! {
            biased;
            () = self.stop.cancelled() => None,
            status = child.wait() => Some(status?),
        };

        let Some(status) = status else {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "synthesizer already exited");
            }
            return Ok(());
        };

        if status.success() {
            Ok(())
        } else {
            Err(Error::Synthesis(format!(
                "{} exited with {status}",
                self.program.display()
            )))
        }
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}
